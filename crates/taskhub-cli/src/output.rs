//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use serde_json::Value;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print rows as a table, or as a JSON array. `empty` is shown in table
/// mode when there is nothing to list.
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Table if items.is_empty() => println!("{empty}"),
        OutputFormat::Table => println!("{}", Table::new(items)),
        OutputFormat::Json => print_json(items),
    }
}

/// Print one value. Table mode flattens top-level object fields into
/// aligned key/value lines.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(item),
        OutputFormat::Table => match serde_json::to_value(item) {
            Ok(Value::Object(fields)) => {
                for (key, value) in &fields {
                    print_kv(key, &display_value(value));
                }
            }
            Ok(other) => println!("{}", display_value(&other)),
            Err(e) => print_warning(&format!("Cannot render value: {e}")),
        },
    }
}

pub fn print_success(msg: &str) {
    println!("✓ {}", msg);
}

pub fn print_warning(msg: &str) {
    println!("⚠ {}", msg);
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{}:", key), value);
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => print_warning(&format!("Cannot encode JSON: {e}")),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::Null), "-");
        assert_eq!(display_value(&json!("granted")), "granted");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(true)), "true");
    }
}
