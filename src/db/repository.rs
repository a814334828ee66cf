//! Database repository for reports, tallies and option lists.
//!
//! Uses prepared statements and transactions for data integrity. This is also
//! the single place where loosely shaped stored values are coerced into typed
//! records.

use chrono::{DateTime, Local, SecondsFormat, SubsecRound, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CountEntry, CountQuery, CountScope, IssueCount, NewReport, OptionCategory, OptionList,
    RepairReport, UpdateReportRequest,
};

const REPORT_COLUMNS: &str = "id, author, equipment_id, issue, parts, created_at";
const COUNT_COLUMNS: &str =
    "id, date, camp, device, issue, author, CAST(count AS TEXT) AS count_text";

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== REPORT OPERATIONS ====================

    /// Store a validated report and return it with its new id.
    pub async fn create_report(&self, report: &NewReport) -> Result<RepairReport, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        // Stored with microsecond precision; return exactly what a later read yields.
        let created_at = Utc::now().trunc_subsecs(6);
        let parts_json = serde_json::to_string(&report.parts)?;

        sqlx::query(
            "INSERT INTO repair_reports (id, author, equipment_id, issue, parts, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&report.author)
        .bind(&report.equipment_id)
        .bind(&report.issue)
        .bind(&parts_json)
        .bind(timestamp(&created_at))
        .execute(&self.pool)
        .await?;

        tracing::debug!(report_id = %id, author = %report.author, "Report created");

        Ok(RepairReport {
            id,
            author: report.author.clone(),
            equipment_id: report.equipment_id.clone(),
            issue: report.issue.clone(),
            parts: report.parts.clone(),
            created_at,
        })
    }

    /// List reports newest first, optionally restricted to one author.
    pub async fn list_reports(&self, author: Option<&str>) -> Result<Vec<RepairReport>, AppError> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM repair_reports", REPORT_COLUMNS));
        if let Some(author) = author {
            qb.push(" WHERE author = ").push_bind(author.to_string());
        }
        qb.push(" ORDER BY created_at DESC, rowid DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(report_from_row).collect())
    }

    /// Get a report by ID.
    pub async fn get_report(&self, id: &str) -> Result<Option<RepairReport>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM repair_reports WHERE id = ?",
            REPORT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(report_from_row))
    }

    /// Apply a partial update. Fields must already be validated.
    pub async fn update_report(
        &self,
        id: &str,
        request: &UpdateReportRequest,
    ) -> Result<RepairReport, AppError> {
        let existing = self
            .get_report(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        let equipment_id = request
            .equipment_id
            .clone()
            .unwrap_or(existing.equipment_id);
        let issue = request.issue.clone().unwrap_or(existing.issue);
        let parts = request.parts.clone().unwrap_or(existing.parts);
        let parts_json = serde_json::to_string(&parts)?;

        let result = sqlx::query(
            "UPDATE repair_reports SET equipment_id = ?, issue = ?, parts = ? WHERE id = ?",
        )
        .bind(&equipment_id)
        .bind(&issue)
        .bind(&parts_json)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Deleted between read and write
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }

        Ok(RepairReport {
            id: id.to_string(),
            author: existing.author,
            equipment_id,
            issue,
            parts,
            created_at: existing.created_at,
        })
    }

    /// Delete a report. Returns whether a row was removed.
    pub async fn delete_report(&self, id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM repair_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== COUNT OPERATIONS ====================

    /// Replace every tally in `scope` with the positive `entries`, in one transaction.
    pub async fn replace_count_scope(
        &self,
        scope: &CountScope,
        author: &str,
        entries: &[CountEntry],
    ) -> Result<Vec<IssueCount>, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut delete: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM issue_counts WHERE date = ");
        delete
            .push_bind(scope.date.clone())
            .push(" AND camp = ")
            .push_bind(scope.camp.clone());
        if let Some(scope_author) = &scope.author {
            delete.push(" AND author = ").push_bind(scope_author.clone());
        }
        let removed = delete.build().execute(&mut *tx).await?.rows_affected();

        let mut saved = Vec::new();
        for entry in entries.iter().filter(|e| e.count > 0) {
            let row = IssueCount {
                id: uuid::Uuid::new_v4().to_string(),
                date: scope.date.clone(),
                camp: scope.camp.clone(),
                device: entry.device.clone(),
                issue: entry.issue.clone(),
                author: author.to_string(),
                count: entry.count,
            };

            sqlx::query(
                "INSERT INTO issue_counts (id, date, camp, device, issue, author, count) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&row.id)
            .bind(&row.date)
            .bind(&row.camp)
            .bind(&row.device)
            .bind(&row.issue)
            .bind(&row.author)
            .bind(row.count)
            .execute(&mut *tx)
            .await?;

            saved.push(row);
        }

        tx.commit().await?;

        tracing::info!(
            date = %scope.date,
            camp = %scope.camp,
            author = ?scope.author,
            removed,
            inserted = saved.len(),
            "Count scope replaced"
        );

        Ok(saved)
    }

    /// Read tallies matching every given filter.
    pub async fn query_counts(&self, query: &CountQuery) -> Result<Vec<IssueCount>, AppError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM issue_counts WHERE 1 = 1",
            COUNT_COLUMNS
        ));

        let filters = [
            ("date", &query.date),
            ("camp", &query.camp),
            ("device", &query.device),
            ("issue", &query.issue),
            ("author", &query.author),
        ];
        for (column, value) in filters {
            if let Some(value) = value {
                qb.push(format!(" AND {} = ", column))
                    .push_bind(value.clone());
            }
        }
        if let Some(from) = query.lower_bound(Local::now().date_naive()) {
            qb.push(" AND date >= ").push_bind(from);
        }
        qb.push(" ORDER BY date, camp, device, issue, author");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(count_from_row).collect())
    }

    // ==================== OPTION OPERATIONS ====================

    /// Get one option list. A missing record reads as an empty list.
    pub async fn get_option_list(&self, category: OptionCategory) -> Result<OptionList, AppError> {
        let row = sqlx::query("SELECT items FROM options WHERE category = ?")
            .bind(category.as_str())
            .fetch_optional(&self.pool)
            .await?;

        let items = row
            .map(|r| parse_json_array(&r.get::<String, _>("items")))
            .unwrap_or_default();
        Ok(OptionList { category, items })
    }

    /// Get every option list in category order.
    pub async fn list_option_lists(&self) -> Result<Vec<OptionList>, AppError> {
        let mut lists = Vec::with_capacity(OptionCategory::ALL.len());
        for category in OptionCategory::ALL {
            lists.push(self.get_option_list(category).await?);
        }
        Ok(lists)
    }

    /// Append a value. Duplicates are rejected.
    pub async fn add_option(
        &self,
        category: OptionCategory,
        value: &str,
    ) -> Result<OptionList, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT items FROM options WHERE category = ?")
            .bind(category.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let mut items = row
            .map(|r| parse_json_array(&r.get::<String, _>("items")))
            .unwrap_or_default();

        if items.iter().any(|item| item == value) {
            return Err(AppError::Conflict(format!(
                "'{}' already exists in {}",
                value,
                category.as_str()
            )));
        }
        items.push(value.to_string());

        sqlx::query(
            "INSERT INTO options (category, items) VALUES (?, ?) ON CONFLICT(category) DO UPDATE SET items = excluded.items",
        )
        .bind(category.as_str())
        .bind(serde_json::to_string(&items)?)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OptionList { category, items })
    }

    /// Remove a value by exact match.
    pub async fn remove_option(
        &self,
        category: OptionCategory,
        value: &str,
    ) -> Result<OptionList, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT items FROM options WHERE category = ?")
            .bind(category.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let mut items = row
            .map(|r| parse_json_array(&r.get::<String, _>("items")))
            .unwrap_or_default();

        let before = items.len();
        items.retain(|item| item != value);
        if items.len() == before {
            return Err(AppError::NotFound(format!(
                "'{}' not found in {}",
                value,
                category.as_str()
            )));
        }

        sqlx::query("UPDATE options SET items = ? WHERE category = ?")
            .bind(serde_json::to_string(&items)?)
            .bind(category.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(OptionList { category, items })
    }
}

// Helper functions for row conversion

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn report_from_row(row: &sqlx::sqlite::SqliteRow) -> RepairReport {
    let parts_str: String = row.get("parts");
    let created_str: String = row.get("created_at");
    RepairReport {
        id: row.get("id"),
        author: row.get("author"),
        equipment_id: row.get("equipment_id"),
        issue: row.get("issue"),
        parts: parse_json_array(&parts_str),
        created_at: parse_timestamp(&created_str),
    }
}

fn count_from_row(row: &sqlx::sqlite::SqliteRow) -> IssueCount {
    let count_text: Option<String> = row.get("count_text");
    IssueCount {
        id: row.get("id"),
        date: row.get("date"),
        camp: row.get("camp"),
        device: row.get("device"),
        issue: row.get("issue"),
        author: row.get("author"),
        count: coerce_count(count_text.as_deref()),
    }
}

/// Stored counts may be integers, reals or text. Anything unparsable counts as zero.
pub fn coerce_count(raw: Option<&str>) -> i64 {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0;
    };

    if let Ok(value) = text.parse::<i64>() {
        return value.max(0);
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => (value.trunc() as i64).max(0),
        _ => {
            tracing::debug!("Ignoring non-numeric count value {:?}", text);
            0
        }
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| {
            tracing::warn!("Malformed timestamp {:?}, using epoch", s);
            DateTime::<Utc>::default()
        })
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
