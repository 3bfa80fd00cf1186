//! Output formatting

use anyhow::bail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "text" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            other => bail!("unknown output format: {other} (expected text or json)"),
        }
    }
}

/// Print a result either as aligned text lines or as one JSON object
pub fn emit(format: Format, value: &serde_json::Value) -> anyhow::Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Text => print_text(value, 0),
    }
    Ok(())
}

fn print_text(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                match val {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        println!("{pad}{key}:");
                        print_text(val, indent + 1);
                    }
                    _ => println!("{pad}{key}: {}", scalar(val)),
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        print_text(item, indent)
                    }
                    _ => println!("{pad}- {}", scalar(item)),
                }
            }
        }
        other => println!("{pad}{}", scalar(other)),
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
