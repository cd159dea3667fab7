//! Output formatting utilities

use serde::Serialize;

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

/// Format an optional size, `?` when unknown
pub fn format_size(bytes: Option<u64>) -> String {
    bytes.map(format_bytes).unwrap_or_else(|| "?".to_string())
}
