use console::{Style, style};

use crate::types::{QualityLevel, Severity};

/// Styled terminal messages for CLI commands
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn quality_style(level: QualityLevel) -> Style {
        match level {
            QualityLevel::Exceptional | QualityLevel::Professional => Style::new().green(),
            QualityLevel::Good => Style::new().cyan(),
            QualityLevel::NeedsImprovement => Style::new().yellow(),
            QualityLevel::NeedsSignificantWork => Style::new().red(),
        }
    }

    pub fn severity_style(severity: Severity) -> Style {
        match severity {
            Severity::Critical => Style::new().red().bold(),
            Severity::Major => Style::new().yellow(),
            Severity::Minor => Style::new().dim(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
