//! Persistence gateway: one transaction per event across the four approval
//! tables. Every write is an upsert on the natural key, so re-delivered or
//! re-processed events converge to the same row state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::errors::IngestError;
use crate::models::instance::InstanceSnapshot;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Instance row as read back from the store (for the backfill CLI and tests).
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredInstance {
    pub instance_code: String,
    pub approval_code: Option<String>,
    pub approval_name: Option<String>,
    pub status: Option<String>,
    pub user_id: Option<String>,
    pub department_id: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Build a store without touching the database. Connections are opened
    /// on first use; handy for commands that may fail before any write.
    pub fn connect_lazy(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Write one event's snapshot: raw → instance → tasks → fields, in a
    /// single transaction. Ordering matters even if the transaction is ever
    /// split: the raw snapshot is the most authoritative record and must be
    /// the first thing made durable.
    pub async fn persist(&self, snap: &InstanceSnapshot) -> Result<(), IngestError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO lark_approval_raw (instance_code, raw_json, fetched_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (instance_code) DO UPDATE SET
                   raw_json = EXCLUDED.raw_json,
                   fetched_at = NOW()"#,
        )
        .bind(&snap.instance_code)
        .bind(&snap.raw)
        .execute(&mut *tx)
        .await?;

        // end_time only overwrites when the new value is non-null: a later
        // callback that omits it must not erase a recorded completion.
        sqlx::query(
            r#"INSERT INTO lark_approval_instance
                   (instance_code, approval_code, approval_name, status, user_id,
                    department_id, start_time, end_time, raw_json)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               ON CONFLICT (instance_code) DO UPDATE SET
                   approval_code = COALESCE(EXCLUDED.approval_code, lark_approval_instance.approval_code),
                   approval_name = COALESCE(EXCLUDED.approval_name, lark_approval_instance.approval_name),
                   status = COALESCE(EXCLUDED.status, lark_approval_instance.status),
                   user_id = COALESCE(EXCLUDED.user_id, lark_approval_instance.user_id),
                   department_id = COALESCE(EXCLUDED.department_id, lark_approval_instance.department_id),
                   start_time = COALESCE(EXCLUDED.start_time, lark_approval_instance.start_time),
                   end_time = COALESCE(EXCLUDED.end_time, lark_approval_instance.end_time),
                   raw_json = EXCLUDED.raw_json,
                   updated_at = NOW()"#,
        )
        .bind(&snap.instance.instance_code)
        .bind(&snap.instance.approval_code)
        .bind(&snap.instance.approval_name)
        .bind(snap.instance.status.as_ref().map(|s| s.as_str()))
        .bind(&snap.instance.user_id)
        .bind(&snap.instance.department_id)
        .bind(&snap.instance.start_time)
        .bind(&snap.instance.end_time)
        .bind(&snap.raw)
        .execute(&mut *tx)
        .await?;

        for task in &snap.tasks {
            sqlx::query(
                r#"INSERT INTO lark_approval_task
                       (instance_code, task_id, user_id, status, node_name, node_type,
                        start_time, end_time, raw_json)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                   ON CONFLICT (instance_code, task_id) DO UPDATE SET
                       user_id = COALESCE(EXCLUDED.user_id, lark_approval_task.user_id),
                       status = COALESCE(EXCLUDED.status, lark_approval_task.status),
                       node_name = COALESCE(EXCLUDED.node_name, lark_approval_task.node_name),
                       node_type = COALESCE(EXCLUDED.node_type, lark_approval_task.node_type),
                       start_time = COALESCE(EXCLUDED.start_time, lark_approval_task.start_time),
                       end_time = COALESCE(EXCLUDED.end_time, lark_approval_task.end_time),
                       raw_json = EXCLUDED.raw_json,
                       updated_at = NOW()"#,
            )
            .bind(&snap.instance_code)
            .bind(&task.task_id)
            .bind(&task.user_id)
            .bind(&task.status)
            .bind(&task.node_name)
            .bind(&task.node_type)
            .bind(&task.start_time)
            .bind(&task.end_time)
            .bind(&task.raw_json)
            .execute(&mut *tx)
            .await?;
        }

        // Field identity is not stable across form revisions, so the field
        // set is replaced wholesale rather than merged.
        sqlx::query("DELETE FROM lark_approval_form_field WHERE instance_code = $1")
            .bind(&snap.instance_code)
            .execute(&mut *tx)
            .await?;

        for field in &snap.fields {
            sqlx::query(
                r#"INSERT INTO lark_approval_form_field
                       (instance_code, field_id, field_name, field_type, field_value, raw_json)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (instance_code, field_id) DO UPDATE SET
                       field_name = EXCLUDED.field_name,
                       field_type = EXCLUDED.field_type,
                       field_value = EXCLUDED.field_value,
                       raw_json = EXCLUDED.raw_json"#,
            )
            .bind(&snap.instance_code)
            .bind(&field.field_id)
            .bind(&field.field_name)
            .bind(&field.field_type)
            .bind(&field.field_value)
            .bind(&field.raw)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_instance(
        &self,
        instance_code: &str,
    ) -> anyhow::Result<Option<StoredInstance>> {
        let row = sqlx::query_as::<_, StoredInstance>(
            r#"SELECT instance_code, approval_code, approval_name, status, user_id,
                      department_id, start_time, end_time, created_at, updated_at
               FROM lark_approval_instance WHERE instance_code = $1"#,
        )
        .bind(instance_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn task_count(&self, instance_code: &str) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lark_approval_task WHERE instance_code = $1",
        )
        .bind(instance_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn field_count(&self, instance_code: &str) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lark_approval_form_field WHERE instance_code = $1",
        )
        .bind(instance_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn raw_count(&self, instance_code: &str) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM lark_approval_raw WHERE instance_code = $1",
        )
        .bind(instance_code)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
