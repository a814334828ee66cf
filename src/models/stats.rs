//! Aggregation results.

use serde::{Deserialize, Serialize};

use super::CountField;

/// Outcome of an aggregation. `NoData` means the query ran and matched nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "data", rename_all = "camelCase")]
pub enum StatsOutcome<T> {
    NoData,
    Ready(T),
}

impl<T> StatsOutcome<T> {
    pub fn is_no_data(&self) -> bool {
        matches!(self, StatsOutcome::NoData)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            StatsOutcome::Ready(value) => Some(value),
            StatsOutcome::NoData => None,
        }
    }
}

/// Sum for one grouping key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupTotal {
    pub key: String,
    pub total: i64,
}

/// Result of `group_sum`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupSummary {
    pub by: String,
    pub groups: Vec<GroupTotal>,
    pub total: i64,
    pub summary: String,
}

/// One row of a pivot table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PivotRow {
    pub label: String,
    pub cells: Vec<i64>,
    pub total: i64,
    pub summary: String,
}

/// Dense two-dimensional sum with a trailing total row and column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PivotTable {
    pub row_field: CountField,
    pub col_field: CountField,
    pub columns: Vec<String>,
    pub rows: Vec<PivotRow>,
    pub totals: PivotRow,
}

impl PivotTable {
    /// Cell value by labels, for lookups in tests and summaries.
    pub fn cell(&self, row: &str, column: &str) -> Option<i64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .map(|r| r.cells[col])
    }

    pub fn grand_total(&self) -> i64 {
        self.totals.total
    }
}

/// Dimension for rolling up repair reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportField {
    Author,
    Issue,
    Date,
    Part,
}

impl ReportField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportField::Author => "author",
            ReportField::Issue => "issue",
            ReportField::Date => "date",
            ReportField::Part => "part",
        }
    }
}
