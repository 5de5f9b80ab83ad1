use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::JTError;

// Terminal cells are roughly 8 pixels wide.
const PX_PER_CELL: u16 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnWidth {
    Auto,
    Cells(u16),
}

impl ColumnWidth {
    /// Parse `auto`, `12`, `12ch` or `96px`. Anything else is `Auto`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim().to_ascii_lowercase();
        if value == "auto" {
            return ColumnWidth::Auto;
        }
        let parsed = if let Some(px) = value.strip_suffix("px") {
            px.trim().parse::<u16>().ok().map(|px| px.div_ceil(PX_PER_CELL))
        } else {
            value.strip_suffix("ch").unwrap_or(&value).trim().parse::<u16>().ok()
        };
        match parsed {
            Some(cells) => ColumnWidth::Cells(cells),
            None => {
                warn!("Unknown column width {value:?}, using auto");
                ColumnWidth::Auto
            }
        }
    }
}

/// Fully resolved display rules for one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConfig {
    pub display_name: Option<String>,
    pub column_width: ColumnWidth,
    pub column_align: ColumnAlign,
    pub hide: bool,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            display_name: None,
            column_width: ColumnWidth::Auto,
            column_align: ColumnAlign::Left,
            hide: false,
        }
    }
}

impl ColumnConfig {
    /// Label shown in the table header, the raw header text unless overridden.
    pub fn label<'a>(&'a self, raw_header: &'a str) -> &'a str {
        self.display_name.as_deref().unwrap_or(raw_header)
    }
}

/// A partial entry of the override table. Unset fields keep the default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnOverride {
    pub display_name: Option<String>,
    pub column_width: Option<String>,
    pub column_align: Option<ColumnAlign>,
    pub hide: Option<bool>,
}

impl ColumnOverride {
    fn new(display_name: &str, column_width: &str) -> Self {
        ColumnOverride {
            display_name: Some(display_name.to_string()),
            column_width: Some(column_width.to_string()),
            ..Default::default()
        }
    }

    fn align(mut self, align: ColumnAlign) -> Self {
        self.column_align = Some(align);
        self
    }

    fn hidden(mut self) -> Self {
        self.hide = Some(true);
        self
    }

    fn merge_over(&self, default: &ColumnConfig) -> ColumnConfig {
        ColumnConfig {
            display_name: self
                .display_name
                .clone()
                .or_else(|| default.display_name.clone()),
            column_width: self
                .column_width
                .as_deref()
                .map(ColumnWidth::parse)
                .unwrap_or(default.column_width),
            column_align: self.column_align.unwrap_or(default.column_align),
            hide: self.hide.unwrap_or(default.hide),
        }
    }
}

/// Maps normalized header names to display rules.
#[derive(Debug, Clone)]
pub struct ColumnResolver {
    default: ColumnConfig,
    overrides: HashMap<String, ColumnOverride>,
}

impl Default for ColumnResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ColumnResolver {
    pub fn new(default: ColumnConfig, overrides: HashMap<String, ColumnOverride>) -> Self {
        ColumnResolver { default, overrides }
    }

    /// The override table for the columns written by the job exporter.
    pub fn builtin() -> Self {
        use ColumnAlign::*;
        let overrides = [
            ("s_no", ColumnOverride::new("#", "4").align(Center)),
            ("company", ColumnOverride::new("Company", "16")),
            ("job_title", ColumnOverride::new("Title", "40")),
            ("yoe", ColumnOverride::new("YoE", "5").align(Center)),
            (
                "match_percentage",
                ColumnOverride::new("Match %", "8").align(Right).hidden(),
            ),
            (
                "extracted_keywords_count",
                ColumnOverride::new("Keywords #", "10").align(Center).hidden(),
            ),
            ("extracted_keywords", ColumnOverride::new("Keywords", "24")),
            ("extracted_locations", ColumnOverride::new("Location", "16")),
            // Header names of the older exporter.
            (
                "matched_keywords_count",
                ColumnOverride::new("Keywords #", "10").align(Center).hidden(),
            ),
            ("matched_keywords", ColumnOverride::new("Keywords", "24")),
            ("matched_locations", ColumnOverride::new("Location", "16")),
            ("job_link", ColumnOverride::new("Link", "6").align(Center)),
        ]
        .into_iter()
        .map(|(key, entry)| (key.to_string(), entry))
        .collect();

        ColumnResolver::new(ColumnConfig::default(), overrides)
    }

    /// Layer `overrides` over the current table, replacing entries with the same key.
    pub fn with_overrides(mut self, overrides: HashMap<String, ColumnOverride>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// Read a JSON object of `{ "<key>": { "displayName": .., ... } }`.
    pub fn load_overrides(path: &Path) -> Result<HashMap<String, ColumnOverride>, JTError> {
        let content = fs::read_to_string(path)?;
        let overrides: HashMap<String, ColumnOverride> = serde_json::from_str(&content)?;
        debug!("Loaded {} column overrides from {:?}", overrides.len(), path);
        Ok(overrides)
    }

    /// Exact lookup of `key`, merged over the default entry. Never fails.
    pub fn resolve(&self, key: &str) -> ColumnConfig {
        match self.overrides.get(key) {
            Some(entry) => entry.merge_over(&self.default),
            None => self.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn unknown_header_gets_default() {
        let resolver = ColumnResolver::builtin();
        let config = resolver.resolve("salary");
        assert_eq!(config, ColumnConfig::default());
        assert_eq!(config.label("Salary"), "Salary");
    }

    #[test]
    fn resolve_is_total() {
        let resolver = ColumnResolver::builtin();
        // Unknown keys get the default entry and show their raw header.
        for key in ["", " ", "Company", "company_", "ß"] {
            let config = resolver.resolve(key);
            assert_eq!(config, ColumnConfig::default());
            assert_eq!(config.label(key), key);
        }
        let known = resolver.resolve("s_no");
        assert_eq!(known.label("S.No"), "#");
        assert_eq!(known.column_width, ColumnWidth::Cells(4));
    }

    #[test]
    fn lookup_is_exact() {
        let resolver = ColumnResolver::builtin();
        assert_eq!(resolver.resolve("company").label("company"), "Company");
        assert_eq!(resolver.resolve("Company").display_name, None);
        assert_eq!(resolver.resolve("company_name").display_name, None);
    }

    #[test]
    fn override_merges_over_default() {
        let resolver = ColumnResolver::builtin();
        let config = resolver.resolve("match_percentage");
        assert_eq!(config.display_name.as_deref(), Some("Match %"));
        assert_eq!(config.column_align, ColumnAlign::Right);
        assert!(config.hide);

        let config = resolver.resolve("company");
        assert_eq!(config.column_align, ColumnAlign::Left);
        assert!(!config.hide);
    }

    #[test]
    fn parses_widths() {
        assert_eq!(ColumnWidth::parse("auto"), ColumnWidth::Auto);
        assert_eq!(ColumnWidth::parse("12"), ColumnWidth::Cells(12));
        assert_eq!(ColumnWidth::parse("12ch"), ColumnWidth::Cells(12));
        assert_eq!(ColumnWidth::parse("50px"), ColumnWidth::Cells(7));
        assert_eq!(ColumnWidth::parse("48PX"), ColumnWidth::Cells(6));
        assert_eq!(ColumnWidth::parse("wide"), ColumnWidth::Auto);
    }

    #[test]
    fn loads_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"company": {{"hide": true}}, "salary": {{"displayName": "Pay", "columnAlign": "right", "columnWidth": "80px"}}}}"#
        )
        .unwrap();

        let overrides = ColumnResolver::load_overrides(file.path()).unwrap();
        let resolver = ColumnResolver::builtin().with_overrides(overrides);

        // File entries replace built-in entries wholesale.
        let company = resolver.resolve("company");
        assert!(company.hide);
        assert_eq!(company.display_name, None);

        let salary = resolver.resolve("salary");
        assert_eq!(salary.label("salary"), "Pay");
        assert_eq!(salary.column_align, ColumnAlign::Right);
        assert_eq!(salary.column_width, ColumnWidth::Cells(10));
    }

    #[test]
    fn broken_override_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            ColumnResolver::load_overrides(file.path()),
            Err(JTError::JsonError(_))
        ));
    }
}
