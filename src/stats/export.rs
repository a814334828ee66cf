//! CSV and XLSX serialization of tables.
//!
//! A [`Sheet`] is the common shape: a header row plus typed cells. Integers
//! stay integers all the way to the byte buffer, so they never pick up a
//! decimal point.

use rust_xlsxwriter::{Format, Workbook};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{GroupSummary, IssueCount, PivotTable, RepairReport};

use super::TOTAL_LABEL;

/// Byte-order mark prepended to CSV output so spreadsheet apps detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Export format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

/// Typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl Cell {
    fn render(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Int(value) => value.to_string(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

/// A named table ready for export.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    /// Pivot table with the row dimension first and the total column and row last.
    pub fn from_pivot(name: &str, table: &PivotTable) -> Self {
        let mut header = Vec::with_capacity(table.columns.len() + 2);
        header.push(table.row_field.as_str().to_string());
        header.extend(table.columns.iter().cloned());
        header.push(TOTAL_LABEL.to_string());

        let rows = table
            .rows
            .iter()
            .chain(std::iter::once(&table.totals))
            .map(|row| {
                let mut cells = Vec::with_capacity(row.cells.len() + 2);
                cells.push(Cell::from(row.label.as_str()));
                cells.extend(row.cells.iter().map(|&v| Cell::Int(v)));
                cells.push(Cell::Int(row.total));
                cells
            })
            .collect();

        Self {
            name: name.to_string(),
            header,
            rows,
        }
    }

    pub fn from_groups(name: &str, summary: &GroupSummary) -> Self {
        Self {
            name: name.to_string(),
            header: vec![summary.by.clone(), "count".to_string()],
            rows: summary
                .groups
                .iter()
                .map(|g| vec![Cell::from(g.key.as_str()), Cell::Int(g.total)])
                .collect(),
        }
    }

    pub fn from_counts(name: &str, counts: &[IssueCount]) -> Self {
        Self {
            name: name.to_string(),
            header: ["date", "camp", "device", "issue", "author", "count"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: counts
                .iter()
                .map(|c| {
                    vec![
                        Cell::from(c.date.as_str()),
                        Cell::from(c.camp.as_str()),
                        Cell::from(c.device.as_str()),
                        Cell::from(c.issue.as_str()),
                        Cell::from(c.author.as_str()),
                        Cell::Int(c.count),
                    ]
                })
                .collect(),
        }
    }

    pub fn from_reports(name: &str, reports: &[RepairReport]) -> Self {
        Self {
            name: name.to_string(),
            header: ["id", "author", "equipment_id", "issue", "parts", "created_at"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: reports
                .iter()
                .map(|r| {
                    vec![
                        Cell::from(r.id.as_str()),
                        Cell::from(r.author.as_str()),
                        Cell::from(r.equipment_id.as_str()),
                        Cell::from(r.issue.as_str()),
                        Cell::from(r.parts.join(", ")),
                        Cell::from(r.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                    ]
                })
                .collect(),
        }
    }
}

/// Serialize one table.
pub fn export_table(sheet: &Sheet, format: ExportFormat) -> Result<Vec<u8>, AppError> {
    match format {
        ExportFormat::Csv => to_csv(sheet),
        ExportFormat::Xlsx => to_xlsx(std::slice::from_ref(sheet)),
    }
}

/// Serialize several tables into one workbook, one worksheet each.
pub fn export_workbook(sheets: &[Sheet]) -> Result<Vec<u8>, AppError> {
    if sheets.is_empty() {
        return Err(AppError::Export("Workbook needs at least one sheet".to_string()));
    }
    to_xlsx(sheets)
}

fn to_csv(sheet: &Sheet) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());

    writer.write_record(&sheet.header)?;
    for row in &sheet.rows {
        writer.write_record(row.iter().map(Cell::render))?;
    }
    writer.flush().map_err(|e| AppError::Export(format!("Failed to flush CSV: {}", e)))?;

    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("Failed to finish CSV: {}", e)))
}

fn to_xlsx(sheets: &[Sheet]) -> Result<Vec<u8>, AppError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, title) in sheet.header.iter().enumerate() {
            worksheet.write_string_with_format(0, column_index(col)?, title, &bold)?;
        }

        for (r, row) in sheet.rows.iter().enumerate() {
            let row_num = u32::try_from(r + 1)
                .map_err(|_| AppError::Export("Too many rows for a worksheet".to_string()))?;
            for (col, cell) in row.iter().enumerate() {
                let col_num = column_index(col)?;
                match cell {
                    Cell::Text(text) => {
                        worksheet.write_string(row_num, col_num, text)?;
                    }
                    Cell::Int(value) => {
                        worksheet.write_number(row_num, col_num, *value as f64)?;
                    }
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(col: usize) -> Result<u16, AppError> {
    u16::try_from(col).map_err(|_| AppError::Export("Too many columns for a worksheet".to_string()))
}
