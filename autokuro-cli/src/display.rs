use async_trait::async_trait;
use autokuro::context::RunContext;
use autokuro::core::StageStatus;
use autokuro::deps::DependencyReport;
use autokuro::events::{EventSink, PipelineEvent};
use autokuro::pipeline::RunSummary;
use console::{style, Style};

#[allow(clippy::cast_precision_loss)]
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

#[derive(Debug, Default)]
pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
    }

    pub fn print_banner(&self, ctx: &RunContext) {
        self.print_header("AutoKuro");
        println!("Target:   {}", style(&ctx.domain).bold());
        println!("Mode:     {}", ctx.mode.name);
        println!(
            "Hardware: {} (x{}, {} parallel)",
            ctx.hardware.name, ctx.hardware.multiplier, ctx.hardware.max_parallel
        );
        println!("Output:   {}", style(ctx.target_dir.display()).dim());
        if ctx.notify {
            println!("Notify:   {}", style("telegram").green());
        }
        println!();
    }

    pub fn print_dependencies(&self, report: &DependencyReport) {
        if report.is_ready() {
            println!("{}", style("System check: all dependencies ready.").green().bold());
            return;
        }
        println!("{}", style("Missing dependencies:").red().bold());
        for tool in &report.missing {
            println!("   - {}", style(tool).yellow());
        }
        println!();
        println!("{}", style("Please install them manually.").dim());
    }

    pub fn print_summary(&self, summary: &RunSummary) {
        self.print_header("Run Summary");
        for outcome in &summary.outcomes {
            let status = Self::status_style(outcome.status).apply_to(outcome.status.to_string());
            let mut line = format!("  {:<14} {status}", outcome.stage.name());
            if outcome.attempts > 1 {
                line.push_str(&format!(" after {} attempts", outcome.attempts));
            }
            if outcome.findings > 0 {
                line.push_str(&format!(
                    "  {}",
                    style(format!("{} finding(s)", outcome.findings)).red().bold()
                ));
            }
            println!("{line}");
        }
        println!();

        if let Some(ref merge) = summary.merge {
            println!(
                "Merged URLs: {} ({} duplicate, {} filtered)",
                merge.written, merge.insert.duplicates, merge.insert.filtered
            );
        }
        match summary.report {
            Some(ref path) => println!("Report:      {}", style(path.display()).bold()),
            None => println!("Report:      {}", style("not written").yellow()),
        }
        let tally = &summary.tolerance;
        println!(
            "Stages:      {} done, {} skipped, {} failed ({:.0}% ok)",
            tally.completed_stages,
            tally.skipped_stages,
            tally.failed_stages,
            tally.success_rate() * 100.0
        );
        println!("Duration:    {:.1}s", summary.duration.as_secs_f64());

        if summary.has_failures() {
            println!();
            println!("{}", style("Tolerated failures:").yellow().bold());
            for failure in summary.failures() {
                println!("  {}: {}", style(&failure.stage).bold(), failure.error);
            }
        }
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("error:").red().bold(), message);
    }

    fn status_style(status: StageStatus) -> Style {
        match status {
            StageStatus::Done => Style::new().green(),
            StageStatus::Skipped(_) => Style::new().dim(),
            StageStatus::Failed => Style::new().red(),
            StageStatus::Pending | StageStatus::Running => Style::new().yellow(),
        }
    }
}

/// Prints pipeline progress to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleEventSink;

impl ConsoleEventSink {
    pub fn new() -> Self {
        Self
    }

    pub fn render(event: &PipelineEvent) -> Option<String> {
        let line = match event {
            PipelineEvent::StageStarted { stage, .. } => {
                format!("{} {}", style("▶").cyan(), stage)
            }
            PipelineEvent::StageSkipped { stage, reason } => {
                format!("{} {} ({reason})", style("↷").dim(), style(stage).dim())
            }
            PipelineEvent::StageCompleted {
                stage, duration_ms, ..
            } => format!("{} {} in {}ms", style("✔").green(), stage, duration_ms),
            PipelineEvent::StageFailed {
                stage,
                attempts,
                error,
            } => format!(
                "{} {} after {attempts} attempt(s): {error}",
                style("✘").red(),
                style(stage).red()
            ),
            PipelineEvent::StageFindings {
                stage,
                count,
                artifact,
            } => format!(
                "{} {stage}: {count} finding(s) in {artifact}",
                style("!").red().bold()
            ),
            PipelineEvent::GroupCompleted {
                step,
                total,
                name,
                output_bytes,
                ..
            } => format!(
                "{} [{step}/{total}] {name} | output {}",
                style("■").blue(),
                format_megabytes(*output_bytes)
            ),
            PipelineEvent::RunFailed { error } => {
                format!("{} {error}", style("aborted:").red().bold())
            }
            PipelineEvent::RunStarted { .. } | PipelineEvent::RunCompleted { .. } => return None,
        };
        Some(line)
    }
}

#[async_trait]
impl EventSink for ConsoleEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        self.try_emit(event);
    }

    fn try_emit(&self, event: &PipelineEvent) {
        if let Some(line) = Self::render(event) {
            println!("{line}");
        }
    }
}
