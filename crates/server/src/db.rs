//! Persistence layer: every table from spec §3 behind one `Database` handle
//! wrapping a `sqlx::PgPool`. Short-lived sessions are the pool's job, not
//! ours — every method here acquires and releases around a single unit of
//! work per spec §5's "short-lived sessions" resource model.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use sentinel_core::domain::{
    DuplicateEmail, JiraEntry, JobTable, MaintenanceWindow, ParentChildRelationship, RawEmail,
    SchedulerConfigRow, SegregatedEmail, Server, SummaryTable, TriggerMapping,
};

use crate::error::ServerError;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, ServerError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), ServerError> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| ServerError::Other(e.to_string()))?;
        Ok(())
    }

    /// The supervisor's database probe: issue a trivial query.
    pub async fn health_check(&self) -> Result<(), ServerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ── raw_emails ──────────────────────────────────────────────

    /// Insert a `RawEmail` if absent; on conflict leave the existing row
    /// untouched (this is the idempotence anchor for the whole pipeline —
    /// re-ingesting the same `email_id` must not touch `status`).
    pub async fn upsert_raw_email_if_absent(&self, raw: &RawEmail) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO raw_emails (email_id, sender, subject, body, email_path, received_at, inserted_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (email_id) DO NOTHING
            "#,
        )
        .bind(&raw.email_id)
        .bind(&raw.sender)
        .bind(&raw.subject)
        .bind(&raw.body)
        .bind(&raw.email_path)
        .bind(raw.received_at)
        .bind(raw.inserted_at)
        .bind(raw.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_raw_email(&self, email_id: &str) -> Result<Option<RawEmail>, ServerError> {
        let row = sqlx::query_as::<_, RawEmailRow>(
            "SELECT email_id, sender, subject, body, email_path, received_at, inserted_at, status FROM raw_emails WHERE email_id = $1",
        )
        .bind(email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn mark_raw_email_enqueued(&self, email_id: &str) -> Result<(), ServerError> {
        sqlx::query("UPDATE raw_emails SET status = true WHERE email_id = $1")
            .bind(email_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── segregated_emails ───────────────────────────────────────

    pub async fn upsert_segregated_email(&self, row: &SegregatedEmail) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO segregated_emails
                (email_id, priority, alert_type, resource_name, trigger_name, generated_summary, recommended_action, inserted_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (email_id) DO UPDATE SET
                priority = EXCLUDED.priority,
                alert_type = EXCLUDED.alert_type,
                resource_name = EXCLUDED.resource_name,
                trigger_name = EXCLUDED.trigger_name,
                generated_summary = EXCLUDED.generated_summary,
                recommended_action = EXCLUDED.recommended_action,
                status = EXCLUDED.status
            "#,
        )
        .bind(&row.email_id)
        .bind(&row.priority)
        .bind(&row.alert_type)
        .bind(&row.resource_name)
        .bind(&row.trigger_name)
        .bind(&row.generated_summary)
        .bind(&row.recommended_action)
        .bind(row.inserted_at)
        .bind(row.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_segregated_email(&self, email_id: &str) -> Result<Option<SegregatedEmail>, ServerError> {
        let row = sqlx::query_as::<_, SegregatedEmailRow>(
            r#"SELECT email_id, priority, alert_type, resource_name, trigger_name,
                      generated_summary, recommended_action, inserted_at, status
               FROM segregated_emails WHERE email_id = $1"#,
        )
        .bind(email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    /// The most recent prior `email_id` sharing `(trigger_name, resource_name)`,
    /// excluding `exclude_email_id`, ordered by the raw email's `received_at`.
    /// Used both for the optional time-window dedup path and, joined against
    /// `jira_entries`, for cross-ticket dedup.
    pub async fn find_recent_by_signature(
        &self,
        trigger_name: &str,
        resource_name: &str,
        exclude_email_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Option<String>, ServerError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT se.email_id FROM segregated_emails se
            JOIN raw_emails re ON re.email_id = se.email_id
            WHERE se.trigger_name = $1 AND se.resource_name = $2
              AND se.email_id != $3
              AND ($4::timestamptz IS NULL OR re.received_at >= $4)
            ORDER BY re.received_at DESC
            LIMIT 1
            "#,
        )
        .bind(trigger_name)
        .bind(resource_name)
        .bind(exclude_email_id)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    // ── summary_table ───────────────────────────────────────────

    pub async fn upsert_summary(&self, row: &SummaryTable) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO summary_table (email_id, summary, inserted_at, status)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email_id) DO UPDATE SET summary = EXCLUDED.summary, status = EXCLUDED.status
            "#,
        )
        .bind(&row.email_id)
        .bind(&row.summary)
        .bind(row.inserted_at)
        .bind(row.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_summary(&self, email_id: &str) -> Result<Option<SummaryTable>, ServerError> {
        let row = sqlx::query_as::<_, SummaryRow>(
            "SELECT email_id, summary, inserted_at, status FROM summary_table WHERE email_id = $1",
        )
        .bind(email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    // ── jira_entries ────────────────────────────────────────────

    /// The most recent prior `email_id` with a ticket for the same signature,
    /// excluding `exclude_email_id`. Returns `(email_id, jiraticket_id)`.
    pub async fn find_prior_ticket_by_signature(
        &self,
        trigger_name: &str,
        resource_name: &str,
        exclude_email_id: &str,
    ) -> Result<Option<(String, String)>, ServerError> {
        let row: Option<(String, String)> = sqlx::query_as(
            r#"
            SELECT je.email_id, je.jiraticket_id FROM jira_entries je
            JOIN segregated_emails se ON se.email_id = je.email_id
            JOIN raw_emails re ON re.email_id = je.email_id
            WHERE se.trigger_name = $1 AND se.resource_name = $2
              AND je.email_id != $3
            ORDER BY re.received_at DESC
            LIMIT 1
            "#,
        )
        .bind(trigger_name)
        .bind(resource_name)
        .bind(exclude_email_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_jira_entry(&self, entry: &JiraEntry) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO jira_entries (email_id, jiraticket_id, assigned_to, teams_flag, teams_channel, created_at, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&entry.email_id)
        .bind(&entry.jiraticket_id)
        .bind(&entry.assigned_to)
        .bind(&entry.teams_flag)
        .bind(&entry.teams_channel)
        .bind(entry.created_at)
        .bind(entry.inserted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── duplicate_emails ────────────────────────────────────────

    pub async fn insert_duplicate(&self, dup: &DuplicateEmail) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO duplicate_emails (email_id, duplicate_email_id, subject, body, sender, received_at, inserted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (duplicate_email_id) DO NOTHING
            "#,
        )
        .bind(&dup.email_id)
        .bind(&dup.duplicate_email_id)
        .bind(&dup.subject)
        .bind(&dup.body)
        .bind(&dup.sender)
        .bind(dup.received_at)
        .bind(dup.inserted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── trigger_mappings (bulk-reloaded reference table) ───────

    /// Atomically replace the whole reference table: truncate and re-insert
    /// inside one transaction, so a concurrent reader under `READ COMMITTED`
    /// sees either the full old set or the full new set, never a partial one.
    pub async fn reload_trigger_mappings(&self, mappings: &[TriggerMapping]) -> Result<(), ServerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE TABLE trigger_mappings").execute(&mut *tx).await?;
        for mapping in mappings {
            sqlx::query(
                "INSERT INTO trigger_mappings (trigger_name, team, priority, responsible_person, recommended_action, actionable) VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&mapping.trigger_name)
            .bind(&mapping.team)
            .bind(&mapping.priority)
            .bind(&mapping.responsible_person)
            .bind(&mapping.recommended_action)
            .bind(mapping.actionable)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn load_trigger_mappings(&self) -> Result<Vec<TriggerMapping>, ServerError> {
        let rows = sqlx::query_as::<_, TriggerMappingRow>(
            "SELECT trigger_name, team, priority, responsible_person, recommended_action, actionable FROM trigger_mappings",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ── maintenance_windows ─────────────────────────────────────

    pub async fn is_ongoing(&self, server_name: &str, now: DateTime<Utc>) -> Result<bool, ServerError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT count(*) FROM maintenance_windows WHERE server_name = $1 AND start_time <= $2 AND end_time >= $2",
        )
        .bind(server_name)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(count,)| count > 0).unwrap_or(false))
    }

    pub async fn insert_maintenance_window(&self, window: &MaintenanceWindow) -> Result<(), ServerError> {
        sqlx::query("INSERT INTO maintenance_windows (server_name, start_time, end_time) VALUES ($1, $2, $3)")
            .bind(&window.server_name)
            .bind(window.start_time)
            .bind(window.end_time)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── parent_child_relationships ──────────────────────────────

    pub async fn load_parent_child_relationships(&self) -> Result<Vec<ParentChildRelationship>, ServerError> {
        let rows = sqlx::query_as::<_, ParentChildRow>("SELECT parent_id, child_id FROM parent_child_relationships")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    // ── servers (computername -> group, may repeat) ────────────

    pub async fn groups_for_server(&self, server_name: &str) -> Result<Vec<String>, ServerError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT group_name FROM servers WHERE server_name = $1")
                .bind(server_name)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(g,)| g).collect())
    }

    pub async fn reload_servers(&self, servers: &[Server]) -> Result<(), ServerError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("TRUNCATE TABLE servers").execute(&mut *tx).await?;
        for server in servers {
            sqlx::query("INSERT INTO servers (server_name, group_name) VALUES ($1, $2)")
                .bind(&server.server_name)
                .bind(&server.group_name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ── job_table ───────────────────────────────────────────────

    pub async fn latest_job_run(&self, job_name: &str) -> Result<Option<JobTable>, ServerError> {
        let row = sqlx::query_as::<_, JobTableRow>(
            r#"SELECT job_id, job_name, job_start_time, job_end_time, last_run_time, frequency, inserted_at
               FROM job_table WHERE job_name = $1 ORDER BY inserted_at DESC LIMIT 1"#,
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn record_job_run(
        &self,
        job_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        last_run_time: DateTime<Utc>,
        frequency: &str,
    ) -> Result<(), ServerError> {
        sqlx::query(
            r#"INSERT INTO job_table (job_name, job_start_time, job_end_time, last_run_time, frequency)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(job_name)
        .bind(start)
        .bind(end)
        .bind(last_run_time)
        .bind(frequency)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ── scheduler_config (admin-refreshable override) ──────────

    pub async fn scheduler_config_for(&self, job_name: &str) -> Result<Option<SchedulerConfigRow>, ServerError> {
        let row = sqlx::query_as::<_, SchedulerConfigRowSql>(
            "SELECT job_name, interval_unit, interval_value FROM scheduler_config WHERE job_name = $1",
        )
        .bind(job_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn upsert_scheduler_config(&self, row: &SchedulerConfigRow) -> Result<(), ServerError> {
        sqlx::query(
            r#"
            INSERT INTO scheduler_config (job_name, interval_unit, interval_value)
            VALUES ($1, $2, $3)
            ON CONFLICT (job_name) DO UPDATE SET interval_unit = EXCLUDED.interval_unit, interval_value = EXCLUDED.interval_value
            "#,
        )
        .bind(&row.job_name)
        .bind(&row.interval_unit)
        .bind(row.interval_value as i32)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ── sqlx row mappings ───────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct RawEmailRow {
    email_id: String,
    sender: String,
    subject: String,
    body: String,
    email_path: Option<String>,
    received_at: DateTime<Utc>,
    inserted_at: DateTime<Utc>,
    status: bool,
}

impl From<RawEmailRow> for RawEmail {
    fn from(r: RawEmailRow) -> Self {
        RawEmail {
            email_id: r.email_id,
            sender: r.sender,
            subject: r.subject,
            body: r.body,
            email_path: r.email_path,
            received_at: r.received_at,
            inserted_at: r.inserted_at,
            status: r.status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SegregatedEmailRow {
    email_id: String,
    priority: Option<String>,
    alert_type: Option<String>,
    resource_name: Option<String>,
    trigger_name: Option<String>,
    generated_summary: Option<String>,
    recommended_action: Option<String>,
    inserted_at: DateTime<Utc>,
    status: bool,
}

impl From<SegregatedEmailRow> for SegregatedEmail {
    fn from(r: SegregatedEmailRow) -> Self {
        SegregatedEmail {
            email_id: r.email_id,
            priority: r.priority,
            alert_type: r.alert_type,
            resource_name: r.resource_name,
            trigger_name: r.trigger_name,
            generated_summary: r.generated_summary,
            recommended_action: r.recommended_action,
            inserted_at: r.inserted_at,
            status: r.status,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SummaryRow {
    email_id: String,
    summary: String,
    inserted_at: DateTime<Utc>,
    status: bool,
}

impl From<SummaryRow> for SummaryTable {
    fn from(r: SummaryRow) -> Self {
        SummaryTable { email_id: r.email_id, summary: r.summary, inserted_at: r.inserted_at, status: r.status }
    }
}

#[derive(sqlx::FromRow)]
struct TriggerMappingRow {
    trigger_name: String,
    team: String,
    priority: String,
    responsible_person: Option<String>,
    recommended_action: Option<String>,
    actionable: bool,
}

impl From<TriggerMappingRow> for TriggerMapping {
    fn from(r: TriggerMappingRow) -> Self {
        TriggerMapping {
            trigger_name: r.trigger_name,
            team: r.team,
            priority: r.priority,
            responsible_person: r.responsible_person,
            recommended_action: r.recommended_action,
            actionable: r.actionable,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ParentChildRow {
    parent_id: String,
    child_id: String,
}

impl From<ParentChildRow> for ParentChildRelationship {
    fn from(r: ParentChildRow) -> Self {
        ParentChildRelationship { parent_id: r.parent_id, child_id: r.child_id }
    }
}

#[derive(sqlx::FromRow)]
struct JobTableRow {
    job_id: i64,
    job_name: String,
    job_start_time: Option<DateTime<Utc>>,
    job_end_time: Option<DateTime<Utc>>,
    last_run_time: Option<DateTime<Utc>>,
    frequency: String,
    inserted_at: DateTime<Utc>,
}

impl From<JobTableRow> for JobTable {
    fn from(r: JobTableRow) -> Self {
        JobTable {
            job_id: r.job_id,
            job_name: r.job_name,
            job_start_time: r.job_start_time,
            job_end_time: r.job_end_time,
            last_run_time: r.last_run_time,
            frequency: r.frequency,
            inserted_at: r.inserted_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SchedulerConfigRowSql {
    job_name: String,
    interval_unit: String,
    interval_value: i32,
}

impl From<SchedulerConfigRowSql> for SchedulerConfigRow {
    fn from(r: SchedulerConfigRowSql) -> Self {
        SchedulerConfigRow { job_name: r.job_name, interval_unit: r.interval_unit, interval_value: r.interval_value as u32 }
    }
}
