//! Command implementations for the `tide` binary.
//!
//! Each command is thin glue: it compiles arguments, takes the target lock,
//! wires library callbacks to user-facing warnings, and renders the results.
//! Callback-reported failures become warnings; only returned errors make
//! the process exit non-zero.

pub mod backup;
pub mod prune;
pub mod restore;

use colored::Colorize;

/// Print a success message with a green check mark.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message with a red cross to stderr.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an informational message with a blue marker.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a warning message with a yellow marker.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}
