//! Output formatting for CLI commands

use anyhow::Result;
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Prints structured data as a single JSON line
    pub fn data<T: Serialize>(&self, data: &T) -> Result<()> {
        println!("{}", serde_json::to_string(data)?);
        Ok(())
    }

    /// Prints a heading followed by one line per item (text only)
    pub fn list<I, S>(&self, heading: &str, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.format != OutputFormat::Text {
            return;
        }
        println!("{}", heading);
        for item in items {
            println!("{}", item.as_ref());
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}
