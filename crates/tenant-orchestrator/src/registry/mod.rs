//! Persisted tenant registry.
//!
//! The registry is the single source of truth for tenant status across
//! process restarts. Only the lifecycle orchestrator and the health
//! aggregator's reconciliation step write `status`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RegistryError;
use crate::tenant::{TenantRecord, TenantStatus};

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::InMemoryTenantRegistry;
#[cfg(feature = "postgres")]
pub use postgres::PgTenantRegistry;

/// One page of tenants, ordered by company code ascending.
#[derive(Debug, Clone, Default)]
pub struct TenantPage {
    pub records: Vec<TenantRecord>,
    pub total: u64,
}

/// Read/write contract of the tenant registry.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    /// Look up a tenant by its (upper-case) company code.
    async fn find_by_code(&self, company_code: &str) -> Result<Option<TenantRecord>, RegistryError>;

    /// Set `status` and `updated_at`. Unknown codes are a no-op.
    async fn update_status(
        &self,
        company_code: &str,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError>;

    /// Page through tenants; `page` is 1-based.
    async fn list(&self, page: u32, page_size: u32) -> Result<TenantPage, RegistryError>;
}

/// Offset of the first row of a 1-based page.
pub(crate) fn page_offset(page: u32, page_size: u32) -> u64 {
    u64::from(page.saturating_sub(1)) * u64::from(page_size)
}
