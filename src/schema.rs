//! Schema Formatter
//!
//! Turns the table/column catalog into the compact text handed to the
//! text-generation collaborator as context.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub column_name: String,
    pub data_type: String,
    /// `"YES"` / `"NO"` as reported by `information_schema`
    pub is_nullable: String,
    #[serde(default)]
    pub column_default: Option<String>,
}

impl ColumnInfo {
    pub fn nullable(&self) -> bool {
        !self.is_nullable.eq_ignore_ascii_case("no")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table_name: String,
    pub column_name: String,
    pub foreign_table_name: String,
    pub foreign_column_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Table name → columns in ordinal order
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
    #[serde(default)]
    pub relationships: Vec<ForeignKey>,
}

impl SchemaCatalog {
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub fn format_prompt(&self) -> String {
        let mut sections = vec!["**Available Database Tables:**\n".to_string()];

        for (table, columns) in &self.tables {
            sections.push(format!("\n**{}:**", table));
            for col in columns {
                let mut line = format!("- {} ({})", col.column_name, col.data_type);
                if !col.nullable() {
                    line.push_str(" [NOT NULL]");
                }
                if let Some(default) = col.column_default.as_deref().filter(|d| !d.is_empty()) {
                    line.push_str(&format!(" [DEFAULT: {}]", default));
                }
                sections.push(line);
            }
        }

        if !self.relationships.is_empty() {
            sections.push("\n**Key Relationships:**".to_string());
            for fk in &self.relationships {
                sections.push(format!(
                    "- {}.{} -> {}.{}",
                    fk.table_name, fk.column_name, fk.foreign_table_name, fk.foreign_column_name
                ));
            }
        }

        sections.join("\n")
    }
}
