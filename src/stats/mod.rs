//! Aggregation over tally rows and repair reports.
//!
//! Everything here is pure: callers read the rows from the store, pass the
//! configured domain lists in, and get back an explicit [`StatsOutcome`] so an
//! empty input is distinguishable from "not computed yet".

pub mod export;

use std::collections::{BTreeMap, HashMap};

use crate::models::{
    CountField, GroupSummary, GroupTotal, IssueCount, PivotRow, PivotTable, RepairReport,
    ReportField, StatsOutcome,
};

/// Label of the trailing total row and column.
pub const TOTAL_LABEL: &str = "total";

/// Sum `count` per distinct value of `by`. Keys come out sorted.
pub fn group_sum(rows: &[IssueCount], by: CountField) -> StatsOutcome<GroupSummary> {
    if rows.is_empty() {
        return StatsOutcome::NoData;
    }

    let mut sums: BTreeMap<&str, i64> = BTreeMap::new();
    for row in rows {
        *sums.entry(by.value(row)).or_insert(0) += row.count;
    }

    StatsOutcome::Ready(summarize(by.as_str(), sums))
}

/// Count repair reports per author, issue, creation date or used part.
pub fn group_reports(reports: &[RepairReport], by: ReportField) -> StatsOutcome<GroupSummary> {
    if reports.is_empty() {
        return StatsOutcome::NoData;
    }

    let mut sums: BTreeMap<String, i64> = BTreeMap::new();
    for report in reports {
        match by {
            ReportField::Author => *sums.entry(report.author.clone()).or_insert(0) += 1,
            ReportField::Issue => *sums.entry(report.issue.clone()).or_insert(0) += 1,
            ReportField::Date => {
                let day = report.created_at.date_naive().to_string();
                *sums.entry(day).or_insert(0) += 1;
            }
            ReportField::Part => {
                for part in &report.parts {
                    *sums.entry(part.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    if sums.is_empty() {
        // Only possible when grouping by part and no report used any.
        return StatsOutcome::NoData;
    }

    StatsOutcome::Ready(summarize(by.as_str(), sums))
}

fn summarize<K: AsRef<str>>(by: &str, sums: BTreeMap<K, i64>) -> GroupSummary {
    let groups: Vec<GroupTotal> = sums
        .into_iter()
        .map(|(key, total)| GroupTotal {
            key: key.as_ref().to_string(),
            total,
        })
        .collect();
    let total = groups.iter().map(|g| g.total).sum();
    let summary = text_summary(groups.iter().map(|g| (g.key.as_str(), g.total)));

    GroupSummary {
        by: by.to_string(),
        groups,
        total,
        summary,
    }
}

/// Build a dense `row_field` x `col_field` table of summed counts.
///
/// Both axes start from their domain list in canonical order, so values with
/// no rows still show up filled with zero. Values missing from the domain are
/// appended after it in sorted order.
pub fn pivot(
    rows: &[IssueCount],
    row_field: CountField,
    col_field: CountField,
    row_domain: &[String],
    col_domain: &[String],
) -> StatsOutcome<PivotTable> {
    if rows.is_empty() {
        return StatsOutcome::NoData;
    }

    let row_labels = axis(row_domain, rows.iter().map(|r| row_field.value(r)));
    let columns = axis(col_domain, rows.iter().map(|r| col_field.value(r)));

    let mut matrix = vec![vec![0i64; columns.len()]; row_labels.len()];
    {
        let row_index = positions(&row_labels);
        let col_index = positions(&columns);
        for row in rows {
            let r = row_index[row_field.value(row)];
            let c = col_index[col_field.value(row)];
            matrix[r][c] += row.count;
        }
    }

    let mut column_totals = vec![0i64; columns.len()];
    let table_rows: Vec<PivotRow> = row_labels
        .into_iter()
        .zip(matrix)
        .map(|(label, cells)| {
            for (sum, cell) in column_totals.iter_mut().zip(&cells) {
                *sum += cell;
            }
            pivot_row(label, cells, &columns)
        })
        .collect();
    let totals = pivot_row(TOTAL_LABEL.to_string(), column_totals, &columns);

    StatsOutcome::Ready(PivotTable {
        row_field,
        col_field,
        columns,
        rows: table_rows,
        totals,
    })
}

fn pivot_row(label: String, cells: Vec<i64>, columns: &[String]) -> PivotRow {
    let total = cells.iter().sum();
    let summary = text_summary(columns.iter().map(String::as_str).zip(cells.iter().copied()));
    PivotRow {
        label,
        cells,
        total,
        summary,
    }
}

fn positions(labels: &[String]) -> HashMap<&str, usize> {
    labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect()
}

/// Domain values in order, then unseen observed values sorted.
fn axis<'a>(domain: &[String], observed: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut labels: Vec<String> = Vec::with_capacity(domain.len());
    for value in domain {
        if !labels.contains(value) {
            labels.push(value.clone());
        }
    }

    let mut extra: Vec<&str> = observed
        .filter(|value| !domain.iter().any(|d| d.as_str() == *value))
        .collect();
    extra.sort_unstable();
    extra.dedup();

    labels.extend(extra.into_iter().map(str::to_string));
    labels
}

/// Render `label count` pairs separated by commas, skipping zeros.
pub fn text_summary<'a>(pairs: impl IntoIterator<Item = (&'a str, i64)>) -> String {
    pairs
        .into_iter()
        .filter(|(_, count)| *count != 0)
        .map(|(label, count)| format!("{} {}", label, count))
        .collect::<Vec<_>>()
        .join(", ")
}
