//! Stage input preparation.
//!
//! Small in-process steps that turn upstream artifacts into the exact inputs
//! a tool expects: host grouping, tech tags, priority hosts, URL filters and
//! output normalization.

mod filters;
mod grouping;
mod tool_output;

pub use filters::{
    filter_lines, has_query, is_js_url, resolve_wordlist, select_priority_hosts,
    PRIORITY_FALLBACK_COUNT, PRIORITY_FULL_SCAN_LIMIT, PRIORITY_HOSTS,
};
pub use grouping::{
    detect_tech_tags, group_targets, TargetGroup, TargetGroups, TARGETS_API, TARGETS_DYNAMIC,
    TARGETS_STATIC,
};
pub use tool_output::{extract_json_urls, relocate_paramspider_output};
