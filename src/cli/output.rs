//! Output formatting utilities

use flowcheck::Report;

/// Output format for validation reports
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// One summary line per workflow, then its diagnostics
    #[default]
    Text,
    /// JSON array of reports
    Json,
}

pub fn print_reports(reports: &[Report], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => {
            for report in reports {
                print!("{}", report.render_text());
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
    }
    Ok(())
}

pub fn print_patches(report: &Report) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&report.patches)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("✓ {}", message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}
