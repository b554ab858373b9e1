//! Operator-facing message texts (Telegram Markdown).

/// Sent when a scan starts.
#[must_use]
pub fn started_message(domain: &str, mode: &str, hardware: &str) -> String {
    format!("🚀 *Scan Started* on `{domain}` | Mode: `{mode}` | HW: `{hardware}`")
}

/// Sent when an alert stage produced findings.
#[must_use]
pub fn alert_message(domain: &str, stage: &str, count: usize, artifact: &str) -> String {
    format!(
        "🚨 *AutoKuro Alert* 🚨\n\n🎯 Target: `{domain}`\n🛠 Stage: *{stage}*\n⚠️ Findings: `{count}`\n📄 File: `{artifact}`"
    )
}

/// Sent when a scan finishes.
#[must_use]
pub fn finished_message(domain: &str, failures: usize) -> String {
    if failures == 0 {
        format!("✅ *Scan Finished* for `{domain}`.")
    } else {
        format!("✅ *Scan Finished* for `{domain}` ({failures} stage(s) failed).")
    }
}

/// Sent when a scan aborts.
#[must_use]
pub fn failed_message(domain: &str, reason: &str) -> String {
    format!("❌ *Scan Failed* for `{domain}`: {reason}")
}
