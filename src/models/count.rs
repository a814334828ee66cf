//! Per-camp fault tally model.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::OptionCategory;

/// Date format used for tally keys.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One stored tally: how many `device` units at `camp` showed `issue` on `date`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueCount {
    pub id: String,
    pub date: String,
    pub camp: String,
    pub device: String,
    pub issue: String,
    /// Name of the session that saved the row.
    pub author: String,
    pub count: i64,
}

/// One cell of the tally form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountEntry {
    pub device: String,
    pub issue: String,
    pub count: i64,
}

/// Request body for saving a camp's tallies for a day.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveCountsRequest {
    pub date: String,
    pub camp: String,
    #[serde(default)]
    pub entries: Vec<CountEntry>,
}

/// The rows replaced by a save. `author: None` replaces rows from every author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountScope {
    pub date: String,
    pub camp: String,
    pub author: Option<String>,
}

/// Conjunctive filters for reading tallies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountQuery {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub camp: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Inclusive lower bound on `date`.
    #[serde(default)]
    pub from: Option<String>,
    /// Recent window in days, counted back from today.
    #[serde(default)]
    pub days: Option<u32>,
}

impl CountQuery {
    /// Effective lower date bound, combining `from` and `days` (the later one wins).
    ///
    /// A window reaching before the earliest representable date bounds nothing.
    pub fn lower_bound(&self, today: NaiveDate) -> Option<String> {
        let window = self
            .days
            .and_then(|days| today.checked_sub_signed(Duration::days(i64::from(days))))
            .map(|start| start.format(DATE_FORMAT).to_string());
        match (self.from.clone(), window) {
            (Some(from), Some(window)) => Some(from.max(window)),
            (from, window) => from.or(window),
        }
    }
}

/// Dimension of a tally row used for grouping and pivoting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CountField {
    Date,
    Camp,
    Device,
    Issue,
    Author,
}

impl CountField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountField::Date => "date",
            CountField::Camp => "camp",
            CountField::Device => "device",
            CountField::Issue => "issue",
            CountField::Author => "author",
        }
    }

    /// Read this dimension from a row.
    pub fn value<'a>(&self, row: &'a IssueCount) -> &'a str {
        match self {
            CountField::Date => &row.date,
            CountField::Camp => &row.camp,
            CountField::Device => &row.device,
            CountField::Issue => &row.issue,
            CountField::Author => &row.author,
        }
    }

    /// Option list that defines the canonical order of this dimension, if any.
    pub fn domain(&self) -> Option<OptionCategory> {
        match self {
            CountField::Date => None,
            CountField::Camp => Some(OptionCategory::Camps),
            CountField::Device => Some(OptionCategory::Devices),
            CountField::Issue => Some(OptionCategory::CountIssues),
            CountField::Author => Some(OptionCategory::Authors),
        }
    }
}

/// Parse a `YYYY-MM-DD` tally date.
pub fn parse_count_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}
