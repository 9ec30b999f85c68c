//! In-memory registry for tests and local runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{page_offset, TenantPage, TenantRegistry};
use crate::error::RegistryError;
use crate::tenant::{normalize_company_code, TenantRecord, TenantStatus};

/// Registry backed by a sorted map, so listing order matches company code order.
#[derive(Debug, Default)]
pub struct InMemoryTenantRegistry {
    tenants: RwLock<BTreeMap<String, TenantRecord>>,
}

impl InMemoryTenantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry with `records`.
    pub fn with_tenants(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        let tenants = records
            .into_iter()
            .map(|r| (r.company_code.clone(), r))
            .collect();
        Self {
            tenants: RwLock::new(tenants),
        }
    }

    /// Insert or replace a record.
    pub async fn upsert(&self, record: TenantRecord) {
        self.tenants
            .write()
            .await
            .insert(record.company_code.clone(), record);
    }

    /// Remove a record, as if it had been deleted from the store.
    pub async fn remove(&self, company_code: &str) -> Option<TenantRecord> {
        self.tenants
            .write()
            .await
            .remove(&normalize_company_code(company_code))
    }
}

#[async_trait]
impl TenantRegistry for InMemoryTenantRegistry {
    async fn find_by_code(
        &self,
        company_code: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        Ok(self
            .tenants
            .read()
            .await
            .get(&normalize_company_code(company_code))
            .cloned())
    }

    async fn update_status(
        &self,
        company_code: &str,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        if let Some(record) = self
            .tenants
            .write()
            .await
            .get_mut(&normalize_company_code(company_code))
        {
            record.status = status;
            record.updated_at = at;
        }
        Ok(())
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<TenantPage, RegistryError> {
        let tenants = self.tenants.read().await;
        let offset = usize::try_from(page_offset(page, page_size)).unwrap_or(usize::MAX);
        let records = tenants
            .values()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(TenantPage {
            records,
            total: tenants.len() as u64,
        })
    }
}
