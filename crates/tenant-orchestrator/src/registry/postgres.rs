//! PostgreSQL-backed tenant registry.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{error, info};

use super::{page_offset, TenantPage, TenantRegistry};
use crate::error::RegistryError;
use crate::tenant::{normalize_company_code, ReleaseNames, TenantRecord, TenantStatus};

const SELECT_COLUMNS: &str = "company_code, name, company_logo_url, status, namespace, \
                              helm_release_names, created_at, updated_at";

#[derive(Debug, FromRow)]
struct TenantRow {
    company_code: String,
    name: String,
    company_logo_url: Option<String>,
    status: String,
    namespace: Option<String>,
    helm_release_names: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TenantRow> for TenantRecord {
    fn from(row: TenantRow) -> Self {
        Self {
            company_code: row.company_code,
            name: row.name,
            logo_url: row.company_logo_url,
            namespace: row.namespace.filter(|ns| !ns.trim().is_empty()),
            release_names: row.helm_release_names.as_ref().and_then(ReleaseNames::from_json),
            status: TenantStatus::parse(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Registry stored in the `tenants` table.
#[derive(Debug, Clone)]
pub struct PgTenantRegistry {
    pool: PgPool,
}

impl PgTenantRegistry {
    /// Connect a pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RegistryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        info!(max_connections, "Connected to tenant registry");
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Close the pool; in-flight queries finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl TenantRegistry for PgTenantRegistry {
    async fn find_by_code(
        &self,
        company_code: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM tenants WHERE company_code = $1");
        let row: Option<TenantRow> = sqlx::query_as(&sql)
            .bind(normalize_company_code(company_code))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!(company_code, error = %e, "Failed to fetch tenant");
                RegistryError::from(e)
            })?;
        Ok(row.map(Into::into))
    }

    async fn update_status(
        &self,
        company_code: &str,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        sqlx::query("UPDATE tenants SET status = $1, updated_at = $2 WHERE company_code = $3")
            .bind(status.as_str())
            .bind(at)
            .bind(normalize_company_code(company_code))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<TenantPage, RegistryError> {
        let (total,): (i64,) = sqlx::query_as("SELECT count(*) FROM tenants")
            .fetch_one(&self.pool)
            .await?;

        let offset = i64::try_from(page_offset(page, page_size)).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM tenants ORDER BY company_code ASC LIMIT $1 OFFSET $2"
        );
        let rows: Vec<TenantRow> = sqlx::query_as(&sql)
            .bind(i64::from(page_size))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(TenantPage {
            records: rows.into_iter().map(Into::into).collect(),
            total: u64::try_from(total).unwrap_or_default(),
        })
    }
}
