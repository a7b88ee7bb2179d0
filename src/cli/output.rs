use console::{style, Emoji};
use std::fmt::Display;

static CHECK: Emoji<'_, '_> = Emoji("✓ ", "ok ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "error: ");
static WARN: Emoji<'_, '_> = Emoji("⚠ ", "warning: ");
static INFO: Emoji<'_, '_> = Emoji("ℹ ", "");
static ARROW: Emoji<'_, '_> = Emoji("→ ", "-> ");
static DOT: Emoji<'_, '_> = Emoji("• ", "* ");

/// Centralized output formatting utilities for consistent CLI presentation
pub struct Output;

impl Output {
    /// Print a success message with checkmark
    pub fn success<T: Display>(message: T) {
        println!("{}{}", style(CHECK).green(), message);
    }

    /// Print an error message with X mark
    pub fn error<T: Display>(message: T) {
        eprintln!("{}{}", style(CROSS).red(), message);
    }

    /// Print a warning message
    pub fn warning<T: Display>(message: T) {
        eprintln!("{}{}", style(WARN).yellow(), message);
    }

    /// Print an info message
    pub fn info<T: Display>(message: T) {
        println!("{}{}", style(INFO).cyan(), message);
    }

    /// Print a sub-item with arrow prefix
    pub fn sub_item<T: Display>(message: T) {
        println!("  {}{}", style(ARROW).dim(), message);
    }

    /// Print a bullet point
    pub fn bullet<T: Display>(message: T) {
        println!("  {}{}", style(DOT).dim(), message);
    }

    /// Print a section header
    pub fn section<T: Display>(title: T) {
        println!("\n{}", style(title).bold().underlined());
    }

    /// Print a tip/suggestion
    pub fn tip<T: Display>(message: T) {
        println!("{} {}", style("TIP:").cyan(), style(message).dim());
    }

    /// Print one line of a patch series
    pub fn patch_line(marker: char, name: &str, description: Option<&str>) {
        let marker = match marker {
            '>' => style(marker).green().bold(),
            '+' => style(marker).green(),
            _ => style(marker).dim(),
        };
        match description {
            Some(desc) => println!("{marker} {name:<24} # {}", style(desc).dim()),
            None => println!("{marker} {name}"),
        }
    }

    /// Report a halted transaction and the files left conflicted
    pub fn halted<T: Display>(reason: T, conflicts: &[String]) {
        Self::warning(reason);
        for path in conflicts {
            eprintln!("  {} {}", style("C").red().bold(), path);
        }
        if !conflicts.is_empty() {
            Self::tip("Resolve the conflicts, 'git add' the files and run 'pstk refresh'");
        }
    }

    /// Print next steps guidance
    pub fn next_steps(steps: &[&str]) {
        println!();
        Self::tip("Next steps:");
        for step in steps {
            Self::bullet(step);
        }
    }
}
