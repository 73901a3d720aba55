//! Output formatting for CLI

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    /// Machine-readable formats get no progress bars or decorations
    pub fn is_structured(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Yaml)
    }
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Serialize a value in one of the structured formats
pub fn render<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_default(),
        _ => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(T::headers());
            table.add_row(item.row());
            println!("{table}");
        }
        OutputFormat::Json | OutputFormat::Yaml => println!("{}", render(item, format)),
        OutputFormat::Plain => {
            for (header, value) in T::headers().iter().zip(item.row()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Yaml => {
            println!("{}", render(items, format));
        }
        _ if items.is_empty() => println!("No items found."),
        OutputFormat::Table => {
            let mut table = table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Plain => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    println!("---");
                }
                for (header, value) in T::headers().iter().zip(item.row()) {
                    println!("{}: {}", header, value);
                }
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: String,
    }

    #[test]
    fn test_render_formats() {
        let row = Row { name: "focus".into() };
        assert_eq!(render(&row, OutputFormat::Yaml).trim(), "name: focus");
        assert!(render(&row, OutputFormat::Json).contains("\"name\": \"focus\""));
    }

    #[test]
    fn test_structured_formats() {
        assert!(OutputFormat::Json.is_structured());
        assert!(OutputFormat::Yaml.is_structured());
        assert!(!OutputFormat::Plain.is_structured());
    }
}
