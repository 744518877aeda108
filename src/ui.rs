use colored::Colorize;
use serde_json::Value;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Render a field value for display; sensitive values are masked.
pub fn field_value(value: &Value, sensitive: bool) -> String {
    if sensitive {
        return "(sensitive)".to_string();
    }
    match value {
        Value::Null => "(none)".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value() {
        assert_eq!(field_value(&json!("Engineering"), false), "Engineering");
        assert_eq!(field_value(&json!(120), false), "120");
        assert_eq!(field_value(&json!(["a", "b"]), false), r#"["a","b"]"#);
        assert_eq!(field_value(&Value::Null, false), "(none)");
    }

    #[test]
    fn test_field_value_masks_sensitive() {
        assert_eq!(field_value(&json!("00abcdef"), true), "(sensitive)");
    }
}
