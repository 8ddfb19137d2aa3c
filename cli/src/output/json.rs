//! JSON output helpers used by every `--json` code path.

use anyhow::{Context, Result};
use serde::Serialize;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{out}");
    Ok(())
}
