use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use rolegate_application::AccessRuleCacheRepository;
use rolegate_core::{AppError, AppResult, DeploymentId};
use rolegate_domain::{AccessRule, AccessRuleId, AccessRuleInput, AccessTarget, TargetType};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed cache of access rules and their targets.
#[derive(Clone)]
pub struct SqliteAccessRuleCache {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct AccessRuleRow {
    id: String,
    deployment_id: String,
    name: String,
    target_provider_id: String,
    target_provider_type: String,
    created_at: i64,
    updated_at: i64,
    duration_seconds: i64,
    requires_approval: Option<bool>,
}

#[derive(Debug, FromRow)]
struct AccessTargetRow {
    access_rule_id: String,
    target_type: String,
    label: String,
    description: Option<String>,
    value: String,
}

impl SqliteAccessRuleCache {
    /// Creates a repository from an already migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating when missing) the cache database file and applies
    /// migrations.
    pub async fn open(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|error| {
                AppError::Storage(format!(
                    "failed to create cache directory '{}': {error}",
                    parent.display()
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to open access rule cache '{}': {error}",
                    path.display()
                ))
            })?;

        Self::migrated(pool).await
    }

    /// Opens a private in-memory cache, mostly useful for tests and dry runs.
    pub async fn open_in_memory() -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|error| AppError::Storage(format!("invalid sqlite options: {error}")))?
            .foreign_keys(true);
        // Every in-memory connection is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|error| {
                AppError::Storage(format!("failed to open in-memory access rule cache: {error}"))
            })?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> AppResult<Self> {
        MIGRATOR.run(&pool).await.map_err(|error| {
            AppError::Storage(format!("failed to migrate access rule cache: {error}"))
        })?;

        Ok(Self::new(pool))
    }

    async fn replace_targets_in(
        transaction: &mut Transaction<'_, Sqlite>,
        rule_id: &AccessRuleId,
        targets: &[AccessTarget],
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM access_targets
            WHERE access_rule_id = ?1
            "#,
        )
        .bind(rule_id.as_str())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to clear targets of access rule '{rule_id}': {error}"
            ))
        })?;

        for target in targets {
            sqlx::query(
                r#"
                INSERT INTO access_targets (
                    access_rule_id,
                    target_type,
                    label,
                    description,
                    value
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(rule_id.as_str())
            .bind(target.target_type().as_str())
            .bind(target.label())
            .bind(target.description())
            .bind(target.value())
            .execute(&mut **transaction)
            .await
            .map_err(|error| {
                AppError::Storage(format!(
                    "failed to insert '{}' target '{}' of access rule '{rule_id}': {error}",
                    target.target_type().as_str(),
                    target.value()
                ))
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl AccessRuleCacheRepository for SqliteAccessRuleCache {
    async fn find_rule(&self, rule_id: &AccessRuleId) -> AppResult<Option<AccessRule>> {
        let row = sqlx::query_as::<_, AccessRuleRow>(
            r#"
            SELECT
                id,
                deployment_id,
                name,
                target_provider_id,
                target_provider_type,
                created_at,
                updated_at,
                duration_seconds,
                requires_approval
            FROM access_rules
            WHERE id = ?1
            "#,
        )
        .bind(rule_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to find access rule '{rule_id}': {error}"))
        })?;

        row.map(access_rule_from_row).transpose()
    }

    async fn list_rules(&self) -> AppResult<HashMap<AccessRuleId, AccessRule>> {
        let rows = sqlx::query_as::<_, AccessRuleRow>(
            r#"
            SELECT
                id,
                deployment_id,
                name,
                target_provider_id,
                target_provider_type,
                created_at,
                updated_at,
                duration_seconds,
                requires_approval
            FROM access_rules
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list access rules: {error}")))?;

        rows.into_iter()
            .map(|row| access_rule_from_row(row).map(|rule| (rule.id().clone(), rule)))
            .collect()
    }

    async fn upsert_rule(&self, rule: AccessRule) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_rules (
                id,
                deployment_id,
                name,
                target_provider_id,
                target_provider_type,
                created_at,
                updated_at,
                duration_seconds,
                requires_approval
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT (id) DO UPDATE
            SET deployment_id = excluded.deployment_id,
                name = excluded.name,
                target_provider_id = excluded.target_provider_id,
                target_provider_type = excluded.target_provider_type,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                duration_seconds = excluded.duration_seconds,
                requires_approval = excluded.requires_approval
            "#,
        )
        .bind(rule.id().as_str())
        .bind(rule.deployment_id().as_str())
        .bind(rule.name())
        .bind(rule.target_provider_id())
        .bind(rule.target_provider_type())
        .bind(rule.created_at())
        .bind(rule.updated_at())
        .bind(i64::from(rule.duration_seconds()))
        .bind(rule.requires_approval())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to upsert access rule '{}': {error}",
                rule.id()
            ))
        })?;

        Ok(())
    }

    async fn set_requires_approval(
        &self,
        rule_id: &AccessRuleId,
        requires_approval: bool,
    ) -> AppResult<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE access_rules
            SET requires_approval = ?2
            WHERE id = ?1
            "#,
        )
        .bind(rule_id.as_str())
        .bind(requires_approval)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!(
                "failed to update approval flag of access rule '{rule_id}': {error}"
            ))
        })?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "access rule '{rule_id}' is not cached"
            )));
        }

        Ok(())
    }

    async fn replace_targets(
        &self,
        rule_id: &AccessRuleId,
        targets: Vec<AccessTarget>,
    ) -> AppResult<()> {
        if let Some(foreign) = targets
            .iter()
            .find(|target| target.access_rule_id() != rule_id)
        {
            return Err(AppError::Validation(format!(
                "target of access rule '{}' cannot be stored under access rule '{rule_id}'",
                foreign.access_rule_id()
            )));
        }

        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Storage(format!("failed to begin transaction: {error}"))
            })?;

        if let Err(error) = Self::replace_targets_in(&mut transaction, rule_id, &targets).await {
            transaction.rollback().await.map_err(|rollback_error| {
                AppError::Storage(format!(
                    "failed to roll back target replacement of access rule '{rule_id}' after '{error}': {rollback_error}"
                ))
            })?;
            return Err(error);
        }

        transaction.commit().await.map_err(|error| {
            AppError::Storage(format!("failed to commit transaction: {error}"))
        })?;

        debug!(rule_id = %rule_id, target_count = targets.len(), "replaced access targets");
        Ok(())
    }

    async fn list_targets(&self) -> AppResult<Vec<AccessTarget>> {
        let rows = sqlx::query_as::<_, AccessTargetRow>(
            r#"
            SELECT
                access_rule_id,
                target_type,
                label,
                description,
                value
            FROM access_targets
            ORDER BY access_rule_id, id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to list access targets: {error}")))?;

        rows.into_iter().map(access_target_from_row).collect()
    }
}

fn access_rule_from_row(row: AccessRuleRow) -> AppResult<AccessRule> {
    let duration_seconds = u32::try_from(row.duration_seconds).map_err(|error| {
        AppError::Storage(format!(
            "access rule '{}' has an invalid cached duration {}: {error}",
            row.id, row.duration_seconds
        ))
    })?;

    AccessRule::new(AccessRuleInput {
        id: row.id,
        deployment_id: DeploymentId::from_host(row.deployment_id.as_str())?,
        name: row.name,
        target_provider_id: row.target_provider_id,
        target_provider_type: row.target_provider_type,
        created_at: row.created_at,
        updated_at: row.updated_at,
        duration_seconds,
        requires_approval: row.requires_approval,
    })
}

fn access_target_from_row(row: AccessTargetRow) -> AppResult<AccessTarget> {
    AccessTarget::new(
        AccessRuleId::new(row.access_rule_id)?,
        TargetType::from(row.target_type),
        row.label,
        row.description,
        row.value,
    )
}
