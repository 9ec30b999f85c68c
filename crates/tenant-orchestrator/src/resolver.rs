//! Tenant configuration resolution.

use tracing::{debug, error};

use crate::error::{ConfigError, ResolveError};
use crate::registry::TenantRegistry;
use crate::tenant::{normalize_company_code, ReleaseNames, TenantRecord, TenantStatus};

/// Everything needed to operate on a tenant's cluster resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    pub company_code: String,
    pub namespace: String,
    pub releases: ReleaseNames,
    /// Persisted status at resolution time.
    pub status: TenantStatus,
}

impl TenantConfig {
    /// Validate a registry record.
    pub fn from_record(record: TenantRecord) -> Result<Self, ConfigError> {
        let Some(namespace) = record.namespace.filter(|ns| !ns.trim().is_empty()) else {
            return Err(ConfigError::Incomplete {
                company_code: record.company_code,
                detail: "namespace is not assigned".to_string(),
            });
        };
        let Some(releases) = record.release_names else {
            return Err(ConfigError::Incomplete {
                company_code: record.company_code,
                detail: "release names (postgresql, backendApi, userFrontend) missing or invalid"
                    .to_string(),
            });
        };
        Ok(Self {
            company_code: record.company_code,
            namespace,
            releases,
            status: record.status,
        })
    }
}

/// Read a tenant's namespace and release names and check they are complete.
pub async fn resolve_tenant_config(
    registry: &dyn TenantRegistry,
    company_code: &str,
) -> Result<TenantConfig, ResolveError> {
    let company_code = normalize_company_code(company_code);
    let record = registry.find_by_code(&company_code).await.map_err(|e| {
        error!(company_code = %company_code, error = %e, "Failed to fetch tenant configuration");
        e
    })?;

    let Some(record) = record else {
        return Err(ConfigError::UnknownTenant(company_code).into());
    };

    let config = TenantConfig::from_record(record)?;
    debug!(
        company_code = %config.company_code,
        namespace = %config.namespace,
        "Resolved tenant configuration"
    );
    Ok(config)
}
