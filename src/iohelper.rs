/**
 * Helper functions for output. Results go to standard output as JSON; diagnostics go to
 * standard error.
 */
use std::io::Write;

use colored::*;
use serde::Serialize;
use serde_json::json;

use super::common::{QuizError, Result};

#[macro_export]
macro_rules! my_println {
    ($($arg:tt)*) => (
        writeln!(std::io::stdout(), $($arg)*).map_err($crate::common::QuizError::Io)
    );
}

/// Print `value` to standard output as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    my_println!("{}", serialized)
}

/// Report `error` as a JSON payload on standard output and as a colored line on
/// standard error.
pub fn print_error(error: &QuizError) -> Result<()> {
    eprintln!("{}: {}", "Error".red(), error);
    let payload = match error.hint() {
        Some(hint) => json!({ "error": error.to_string(), "hint": hint }),
        None => json!({ "error": error.to_string() }),
    };
    print_json(&payload)
}
