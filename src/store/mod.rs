// src/store/mod.rs
// C10: durable persistence for ScanJob and Finding, following this
// codebase's `ProjectStore` pattern — raw `sqlx::query` (not the `query_as!`
// macro) with explicit `.bind()` chains and manual `row.get::<Type, _>(...)`
// mapping into domain structs.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::error::{ScanError, ScanResult};
use crate::types::{Finding, LanguageTag, ReviewStats, ScanJob, ScanStatus, Severity};

#[derive(Clone)]
pub struct ScanStore {
    pool: SqlitePool,
}

impl ScanStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert of a job with a duplicate identity yields an error; all other
    /// writes are retryable.
    pub async fn create_job(&self, job: &ScanJob) -> ScanResult<()> {
        sqlx::query(
            "INSERT INTO scan_jobs (id, repo_url, status, languages, error, created_at, completed_at, expires_at, review_stats)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&job.id)
        .bind(&job.repo_url)
        .bind(job.status.as_str())
        .bind(languages_to_json(&job.languages))
        .bind(&job.error)
        .bind(job.created_at.timestamp())
        .bind(job.completed_at.map(|t| t.timestamp()))
        .bind(job.expires_at.timestamp())
        .bind(job.review_stats.as_ref().map(review_stats_to_json))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ScanError::validation(format!("job id already exists: {}", job.id))
            }
            other => ScanError::internal(format!("failed to create job: {other}")),
        })?;

        info!(job_id = %job.id, "created scan job");
        Ok(())
    }

    pub async fn get_job(&self, id: &str) -> ScanResult<Option<ScanJob>> {
        let row = sqlx::query("SELECT * FROM scan_jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ScanError::internal(format!("failed to fetch job {id}: {e}")))?;

        row.map(|r| row_to_job(&r)).transpose()
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: ScanStatus,
        error: Option<&str>,
        completed_at: Option<DateTime<Utc>>,
    ) -> ScanResult<()> {
        sqlx::query(
            "UPDATE scan_jobs SET status = ?1, error = ?2, completed_at = ?3 WHERE id = ?4",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(completed_at.map(|t| t.timestamp()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| ScanError::internal(format!("failed to update job {id} status: {e}")))?;

        Ok(())
    }

    pub async fn update_languages(&self, id: &str, languages: &[LanguageTag]) -> ScanResult<()> {
        sqlx::query("UPDATE scan_jobs SET languages = ?1 WHERE id = ?2")
            .bind(languages_to_json(languages))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ScanError::internal(format!("failed to persist languages for {id}: {e}")))?;

        Ok(())
    }

    pub async fn attach_review_stats(&self, id: &str, stats: &ReviewStats) -> ScanResult<()> {
        sqlx::query("UPDATE scan_jobs SET review_stats = ?1 WHERE id = ?2")
            .bind(review_stats_to_json(stats))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| ScanError::internal(format!("failed to attach review stats for {id}: {e}")))?;

        Ok(())
    }

    /// Atomic: either all findings for the job are visible, or none.
    pub async fn save_findings(&self, job_id: &str, findings: &[Finding]) -> ScanResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ScanError::internal(format!("failed to open transaction: {e}")))?;

        for f in findings {
            sqlx::query(
                "INSERT INTO scan_findings (id, scan_job_id, severity, tool, file_path, line_number, description, remediation, code_example, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .bind(&f.id)
            .bind(&f.scan_job_id)
            .bind(f.severity.as_str())
            .bind(&f.tool)
            .bind(&f.file_path)
            .bind(f.line_number.map(|n| n as i64))
            .bind(&f.description)
            .bind(&f.remediation)
            .bind(&f.code_example)
            .bind(f.created_at.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| ScanError::internal(format!("failed to insert finding: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| ScanError::internal(format!("failed to commit findings: {e}")))?;

        info!(job_id, count = findings.len(), "persisted findings");
        Ok(())
    }

    /// Replaces the remediation/code_example columns for findings that the
    /// AI reviewer annotated after the initial `save_findings` call.
    pub async fn update_remediation(&self, findings: &[Finding]) -> ScanResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ScanError::internal(format!("failed to open transaction: {e}")))?;

        for f in findings {
            // remediation and code_example are persisted as a pair or not at all.
            if f.remediation.is_none() || f.code_example.is_none() {
                continue;
            }
            sqlx::query("UPDATE scan_findings SET remediation = ?1, code_example = ?2 WHERE id = ?3")
                .bind(&f.remediation)
                .bind(&f.code_example)
                .bind(&f.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ScanError::internal(format!("failed to update remediation: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| ScanError::internal(format!("failed to commit remediation updates: {e}")))?;

        Ok(())
    }

    pub async fn get_findings(&self, job_id: &str) -> ScanResult<Vec<Finding>> {
        // `severity` is stored as text; a lexical ORDER BY would put
        // "critical" above "high" only by accident of the alphabet, so rank
        // it explicitly to match the canonical critical>high>medium>low>info
        // order used everywhere else findings are sorted.
        let rows = sqlx::query(
            "SELECT * FROM scan_findings WHERE scan_job_id = ?1
             ORDER BY
               CASE severity
                 WHEN 'critical' THEN 0
                 WHEN 'high' THEN 1
                 WHEN 'medium' THEN 2
                 WHEN 'low' THEN 3
                 ELSE 4
               END ASC,
               file_path ASC,
               line_number ASC,
               tool ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ScanError::internal(format!("failed to fetch findings for {job_id}: {e}")))?;

        rows.iter().map(row_to_finding).collect()
    }

    /// Retention sweep: deletes jobs whose `expires_at < now`. Findings
    /// cascade via the foreign key. Returns the number of jobs removed.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> ScanResult<u64> {
        let result = sqlx::query("DELETE FROM scan_jobs WHERE expires_at < ?1")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| ScanError::internal(format!("retention sweep failed: {e}")))?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted, "retention sweep removed expired jobs");
        }
        Ok(deleted)
    }
}

fn languages_to_json(languages: &[LanguageTag]) -> String {
    serde_json::to_string(languages).unwrap_or_else(|_| "[]".to_string())
}

fn languages_from_json(raw: &str) -> Vec<LanguageTag> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn review_stats_to_json(stats: &ReviewStats) -> String {
    serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
}

fn review_stats_from_json(raw: &str) -> Option<ReviewStats> {
    serde_json::from_str(raw).ok()
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> ScanResult<ScanJob> {
    let status_str: String = row.try_get("status").map_err(|e| ScanError::internal(e.to_string()))?;
    let status: ScanStatus = status_str
        .parse()
        .map_err(|e: String| ScanError::internal(e))?;

    let languages_raw: String = row
        .try_get("languages")
        .map_err(|e| ScanError::internal(e.to_string()))?;
    let created_at: i64 = row.try_get("created_at").map_err(|e| ScanError::internal(e.to_string()))?;
    let expires_at: i64 = row.try_get("expires_at").map_err(|e| ScanError::internal(e.to_string()))?;
    let completed_at: Option<i64> = row.try_get("completed_at").ok();
    let review_stats_raw: Option<String> = row.try_get("review_stats").ok();

    Ok(ScanJob {
        id: row.try_get("id").map_err(|e| ScanError::internal(e.to_string()))?,
        repo_url: row.try_get("repo_url").map_err(|e| ScanError::internal(e.to_string()))?,
        status,
        languages: languages_from_json(&languages_raw),
        error: row.try_get("error").ok(),
        created_at: timestamp_to_datetime(created_at),
        completed_at: completed_at.map(timestamp_to_datetime),
        expires_at: timestamp_to_datetime(expires_at),
        review_stats: review_stats_raw.as_deref().and_then(review_stats_from_json),
    })
}

fn row_to_finding(row: &sqlx::sqlite::SqliteRow) -> ScanResult<Finding> {
    let severity_str: String = row.try_get("severity").map_err(|e| ScanError::internal(e.to_string()))?;
    let created_at: i64 = row.try_get("created_at").map_err(|e| ScanError::internal(e.to_string()))?;

    Ok(Finding {
        id: row.try_get("id").map_err(|e| ScanError::internal(e.to_string()))?,
        scan_job_id: row.try_get("scan_job_id").map_err(|e| ScanError::internal(e.to_string()))?,
        severity: Severity::from_str_lenient(&severity_str),
        tool: row.try_get("tool").map_err(|e| ScanError::internal(e.to_string()))?,
        file_path: row.try_get("file_path").map_err(|e| ScanError::internal(e.to_string()))?,
        line_number: row.try_get::<Option<i64>, _>("line_number").ok().flatten().map(|n| n as u32),
        description: row.try_get("description").map_err(|e| ScanError::internal(e.to_string()))?,
        remediation: row.try_get("remediation").ok(),
        code_example: row.try_get("code_example").ok(),
        created_at: timestamp_to_datetime(created_at),
    })
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).single().unwrap_or_else(|| {
        warn!(ts, "invalid stored timestamp, falling back to epoch");
        Utc.timestamp_opt(0, 0).single().expect("epoch is always valid")
    })
}
