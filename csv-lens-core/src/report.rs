use crate::profile::{NumericSummary, TopValues};
use crate::schema::ColumnKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnReport {
    pub name: String,
    pub kind: ColumnKind,
    pub position: usize,
    /// empty or whitespace-only cells
    pub missing: u64,
    pub type_errors: u64,
    pub distinct_estimate: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_values: Option<TopValues>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileReport {
    pub sources: Vec<String>,
    pub rows_read: u64,
    pub rows_profiled: u64,
    pub parse_errors: u64,
    pub type_errors: u64,
    pub truncated: bool, // true if the scan stopped early
    pub columns: Vec<ColumnReport>,
}

impl ProfileReport {
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn numeric_columns(&self) -> impl Iterator<Item = &ColumnReport> {
        self.columns.iter().filter(|c| c.kind == ColumnKind::Numeric)
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &ColumnReport> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Categorical)
    }
}
