//! Per-stage input preparation, command construction and output finalization.

use super::spec::{StageId, MERGED_URLS};
use crate::command::{CommandInvocation, FlagSet, ProcessSpec};
use crate::context::RunContext;
use crate::core::{Artifact, SkipReason};
use crate::targets::{
    detect_tech_tags, extract_json_urls, filter_lines, group_targets, has_query, is_js_url,
    relocate_paramspider_output, resolve_wordlist, select_priority_hosts,
};
use std::io;

/// Raw feroxbuster JSON output.
pub const FEROX_RAW: &str = "ferox_raw.json";
/// JavaScript URLs fed to the token scan.
pub const JS_FILES: &str = "js_files.txt";
/// Parameterised URLs fed to dalfox.
pub const DALFOX_TARGETS: &str = "dalfox_targets.txt";

/// What a stage needs before it can spawn anything.
#[derive(Debug, Clone)]
pub enum Preparation {
    /// Inputs are in place; run this command.
    Ready(CommandInvocation),
    /// Nothing to run.
    Skip(SkipReason),
}

/// Appends the proxy/cookie modifiers, then `-o <artifact>`.
fn with_output(ctx: &RunContext, spec: ProcessSpec, out: &Artifact) -> ProcessSpec {
    ctx.modifiers.apply(spec).arg("-o").path_arg(out.path())
}

/// `<program> <list_flag> <input> <flags> [modifiers] -o <artifact>`.
fn list_scan(
    ctx: &RunContext,
    stage: StageId,
    program: &str,
    list_flag: &str,
    input: &Artifact,
    flags: &FlagSet,
) -> CommandInvocation {
    let spec = ProcessSpec::new(program)
        .arg(list_flag)
        .path_arg(input.path())
        .flags(flags);
    let out = ctx.artifact(stage.artifact());
    CommandInvocation::new(stage.name(), with_output(ctx, spec, &out))
}

/// Builds the command for `stage`, deriving helper inputs on the way.
///
/// Returns [`Preparation::Skip`] with [`SkipReason::NoInput`] when the
/// upstream artifact the stage consumes is absent or empty.
pub fn prepare(stage: StageId, ctx: &RunContext) -> io::Result<Preparation> {
    let live = ctx.artifact(StageId::Recon.artifact());
    let merged = ctx.artifact(MERGED_URLS);
    let mode = &ctx.mode;

    let needs_live = !matches!(
        stage,
        StageId::Recon | StageId::Archive | StageId::Params | StageId::Secrets
    );
    if needs_live && !live.is_usable() {
        return Ok(Preparation::Skip(SkipReason::NoInput));
    }

    let invocation = match stage {
        StageId::Recon => {
            let head = ProcessSpec::new(mode.recon_head.program.clone())
                .args(["-d", ctx.domain.as_str()])
                .flags(&mode.recon_head.args);
            let tail = with_output(ctx, mode.recon_tail.clone(), &live);
            CommandInvocation::new(stage.name(), ctx.modifiers.apply(head)).piped(tail)
        }
        StageId::Tech => list_scan(ctx, stage, "nuclei", "-l", &live, &mode.nuclei_tech),
        StageId::Ports => list_scan(ctx, stage, "naabu", "-list", &live, &mode.naabu),
        StageId::Takeover => list_scan(ctx, stage, "nuclei", "-l", &live, &mode.nuclei_takeover),
        StageId::Cloud => list_scan(ctx, stage, "nuclei", "-l", &live, &mode.nuclei_cloud),
        StageId::Dirscan => {
            let Some(wordlist) = resolve_wordlist(&ctx.wordlist_path, ctx.wordlist_fallback.as_deref())
            else {
                tracing::warn!(
                    primary = %ctx.wordlist_path.display(),
                    "No wordlist found, skipping directory scan"
                );
                return Ok(Preparation::Skip(SkipReason::NoInput));
            };
            let hosts = select_priority_hosts(&live, ctx.target_dir(), &ctx.priority_keywords)?;
            let spec = ProcessSpec::new("feroxbuster")
                .arg("--stdin")
                .flags(&mode.feroxbuster)
                .arg("-w")
                .path_arg(&wordlist);
            let raw = ctx.artifact(FEROX_RAW);
            CommandInvocation::new(stage.name(), with_output(ctx, spec, &raw))
                .with_stdin_from(hosts.path())
        }
        StageId::Archive => {
            let spec = ProcessSpec::new("gau").arg(ctx.domain.as_str()).flags(&mode.gau);
            let out = ctx.artifact(stage.artifact());
            CommandInvocation::new(stage.name(), with_output(ctx, spec, &out))
        }
        StageId::Crawl => list_scan(ctx, stage, "katana", "-list", &live, &mode.katana),
        StageId::Params => {
            let spec = ProcessSpec::new("paramspider")
                .args(["-d", ctx.domain.as_str()])
                .flags(&mode.paramspider);
            CommandInvocation::new(stage.name(), ctx.modifiers.apply(spec))
                .with_current_dir(ctx.target_dir())
        }
        StageId::JsSecrets => {
            let js = ctx.artifact(JS_FILES);
            if filter_lines(&merged, &js, is_js_url)? == 0 {
                return Ok(Preparation::Skip(SkipReason::NoInput));
            }
            list_scan(ctx, stage, "nuclei", "-l", &js, &mode.nuclei_tokens)
        }
        StageId::Vulns => list_scan(ctx, stage, "nuclei", "-l", &live, &mode.nuclei),
        StageId::ContextVulns => {
            let groups = group_targets(&live, ctx.target_dir())?;
            let technology = ctx.artifact(StageId::Tech.artifact());
            let tags = detect_tech_tags(&technology, &ctx.tech_tags)?;
            if tags.is_empty() || !groups.dynamic.is_usable() {
                return Ok(Preparation::Skip(SkipReason::NoInput));
            }
            tracing::info!(tags = %tags.join(","), "Context scan with detected tags");
            let spec = ProcessSpec::new("nuclei")
                .arg("-l")
                .path_arg(groups.dynamic.path())
                .flags(&mode.nuclei_context)
                .args(["-tags".to_string(), tags.join(",")]);
            let out = ctx.artifact(stage.artifact());
            CommandInvocation::new(stage.name(), with_output(ctx, spec, &out))
        }
        StageId::Xss => {
            let params = ctx.artifact(StageId::Params.artifact());
            let source = if params.is_usable() { &params } else { &merged };
            let targets = ctx.artifact(DALFOX_TARGETS);
            if filter_lines(source, &targets, has_query)? == 0 {
                return Ok(Preparation::Skip(SkipReason::NoInput));
            }
            let spec = ProcessSpec::new("dalfox")
                .arg("file")
                .path_arg(targets.path())
                .flags(&mode.dalfox);
            let out = ctx.artifact(stage.artifact());
            CommandInvocation::new(stage.name(), with_output(ctx, spec, &out))
        }
        StageId::Secrets => {
            let spec = ProcessSpec::new("trufflehog")
                .flags(&mode.trufflehog)
                .path_arg(ctx.target_dir());
            CommandInvocation::new(stage.name(), spec)
                .with_stdout_to(ctx.artifact(stage.artifact()).path())
        }
    };

    Ok(Preparation::Ready(invocation))
}

/// Turns raw tool output into the stage artifact after a successful run.
pub fn finalize(stage: StageId, ctx: &RunContext) -> io::Result<()> {
    match stage {
        StageId::Dirscan => {
            let found = extract_json_urls(&ctx.artifact(FEROX_RAW), &ctx.artifact(stage.artifact()))?;
            tracing::debug!(found, "Extracted feroxbuster URLs");
        }
        StageId::Params => {
            let out = ctx.artifact(stage.artifact());
            if !relocate_paramspider_output(ctx.target_dir(), &ctx.domain, &out)? {
                tracing::debug!("paramspider produced no output");
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use pretty_assertions::assert_eq;

    fn ready(stage: StageId, ctx: &RunContext) -> CommandInvocation {
        match prepare(stage, ctx).unwrap() {
            Preparation::Ready(invocation) => invocation,
            Preparation::Skip(reason) => panic!("{stage} skipped: {reason}"),
        }
    }

    fn argv(spec: &ProcessSpec) -> Vec<String> {
        spec.argv()
    }

    fn seed_live_hosts(ctx: &RunContext, hosts: &[&str]) {
        ctx.artifact("live_hosts.txt").write_lines(hosts).unwrap();
    }

    #[test]
    fn test_recon_is_piped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        let invocation = ready(StageId::Recon, &ctx);

        assert!(invocation.is_piped());
        assert_eq!(invocation.head.program, "subfinder");
        assert_eq!(&argv(&invocation.head)[..2], ["-d", "example.com"]);
        let tail = invocation.pipe_to.as_ref().unwrap();
        assert_eq!(tail.program, "httpx-toolkit");
        let tail_argv = argv(tail);
        assert_eq!(tail_argv[tail_argv.len() - 2], "-o");
        assert!(tail_argv.last().unwrap().ends_with("live_hosts.txt"));
    }

    #[test]
    fn test_stages_without_live_hosts_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        for stage in [StageId::Tech, StageId::Ports, StageId::Vulns, StageId::Crawl] {
            assert!(matches!(
                prepare(stage, &ctx).unwrap(),
                Preparation::Skip(SkipReason::NoInput)
            ));
        }
        assert!(matches!(prepare(StageId::Archive, &ctx).unwrap(), Preparation::Ready(_)));
    }

    #[test]
    fn test_nuclei_list_scan() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        seed_live_hosts(&ctx, &["https://www.example.com"]);

        let invocation = ready(StageId::Vulns, &ctx);
        let args = argv(&invocation.head);

        assert_eq!(invocation.head.program, "nuclei");
        assert_eq!(args[0], "-l");
        assert!(args[1].ends_with("live_hosts.txt"));
        assert!(args.windows(2).any(|w| w == ["-rl", "150"]));
        assert!(args.last().unwrap().ends_with("nuclei_report.txt"));
    }

    #[test]
    fn test_dirscan_uses_stdin_and_wordlist() {
        let dir = tempfile::tempdir().unwrap();
        let wordlist = dir.path().join("words.txt");
        std::fs::write(&wordlist, "admin\n").unwrap();
        let mut ctx = test_context(dir.path());
        ctx.wordlist_path = wordlist.clone();
        seed_live_hosts(&ctx, &["https://www.example.com"]);

        let invocation = ready(StageId::Dirscan, &ctx);
        let args = argv(&invocation.head);

        assert_eq!(args[0], "--stdin");
        assert!(args.windows(2).any(|w| w[0] == "-w" && w[1] == wordlist.to_string_lossy()));
        assert!(args.last().unwrap().ends_with(FEROX_RAW));
        assert_eq!(
            invocation.stdin_from.as_deref(),
            Some(ctx.artifact("live_hosts.txt").path())
        );
    }

    #[test]
    fn test_dirscan_without_wordlist_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        ctx.wordlist_path = dir.path().join("missing.txt");
        ctx.wordlist_fallback = None;
        seed_live_hosts(&ctx, &["https://www.example.com"]);

        assert!(matches!(
            prepare(StageId::Dirscan, &ctx).unwrap(),
            Preparation::Skip(SkipReason::NoInput)
        ));
    }

    #[test]
    fn test_params_runs_in_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        let invocation = ready(StageId::Params, &ctx);

        assert_eq!(invocation.current_dir.as_deref(), Some(ctx.target_dir()));
        assert_eq!(&argv(&invocation.head)[..2], ["-d", "example.com"]);
    }

    #[test]
    fn test_js_secrets_filters_merged_urls() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        seed_live_hosts(&ctx, &["https://www.example.com"]);

        assert!(matches!(
            prepare(StageId::JsSecrets, &ctx).unwrap(),
            Preparation::Skip(SkipReason::NoInput)
        ));

        ctx.artifact(MERGED_URLS)
            .write_lines(["https://www.example.com/app.js", "https://www.example.com/"])
            .unwrap();
        let invocation = ready(StageId::JsSecrets, &ctx);

        assert_eq!(
            ctx.artifact(JS_FILES).read_lines().unwrap(),
            vec!["https://www.example.com/app.js"]
        );
        assert!(argv(&invocation.head)[1].ends_with(JS_FILES));
    }

    #[test]
    fn test_context_vulns_needs_tags() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        seed_live_hosts(&ctx, &["https://shop.example.com", "https://api.example.com"]);

        assert!(matches!(
            prepare(StageId::ContextVulns, &ctx).unwrap(),
            Preparation::Skip(SkipReason::NoInput)
        ));

        ctx.artifact("technology.txt")
            .write_lines(["[tech-detect:nginx] https://shop.example.com"])
            .unwrap();
        let invocation = ready(StageId::ContextVulns, &ctx);
        let args = argv(&invocation.head);

        assert!(args[1].ends_with("targets_dynamic.txt"));
        assert!(args.windows(2).any(|w| w == ["-tags", "nginx"]));
        assert!(ctx.artifact("targets_api.txt").is_usable());
    }

    #[test]
    fn test_xss_prefers_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        seed_live_hosts(&ctx, &["https://www.example.com"]);
        ctx.artifact(MERGED_URLS)
            .write_lines(["https://www.example.com/?q=merged"])
            .unwrap();
        ctx.artifact("parameters.txt")
            .write_lines(["https://www.example.com/?id=FUZZ", "https://www.example.com/plain"])
            .unwrap();

        let invocation = ready(StageId::Xss, &ctx);

        assert_eq!(
            ctx.artifact(DALFOX_TARGETS).read_lines().unwrap(),
            vec!["https://www.example.com/?id=FUZZ"]
        );
        assert_eq!(&argv(&invocation.head)[0], "file");
    }

    #[test]
    fn test_secrets_redirects_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        let invocation = ready(StageId::Secrets, &ctx);

        assert_eq!(invocation.head.program, "trufflehog");
        assert_eq!(
            invocation.stdout_to.as_deref(),
            Some(ctx.artifact("secrets_leak.txt").path())
        );
        let target_dir = ctx.target_dir().to_string_lossy().into_owned();
        assert_eq!(argv(&invocation.head).last(), Some(&target_dir));
    }

    #[test]
    fn test_proxy_reaches_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = test_context(dir.path());
        ctx.modifiers = ctx.modifiers.clone().with_proxy("http://127.0.0.1:8080");
        seed_live_hosts(&ctx, &["https://www.example.com"]);

        let katana = argv(&ready(StageId::Crawl, &ctx).head);
        assert!(katana.windows(2).any(|w| w == ["-proxy", "http://127.0.0.1:8080"]));

        let recon = ready(StageId::Recon, &ctx);
        let httpx = argv(recon.pipe_to.as_ref().unwrap());
        assert!(httpx.windows(2).any(|w| w == ["-http-proxy", "http://127.0.0.1:8080"]));
    }

    #[test]
    fn test_finalize_dirscan() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        std::fs::create_dir_all(ctx.target_dir()).unwrap();
        std::fs::write(
            ctx.artifact(FEROX_RAW).path(),
            "{\"type\":\"response\",\"url\":\"https://www.example.com/admin\"}\n",
        )
        .unwrap();

        finalize(StageId::Dirscan, &ctx).unwrap();

        assert_eq!(
            ctx.artifact("hidden_dirs.txt").read_lines().unwrap(),
            vec!["https://www.example.com/admin"]
        );
    }
}
