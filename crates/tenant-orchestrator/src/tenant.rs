//! Tenant data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted lifecycle status of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TenantStatus {
    /// Deploy requested, nothing applied yet.
    Pending,
    /// Installing the database release.
    DeployingPg,
    /// Installing the API release.
    DeployingBe,
    /// Installing the user-facing release.
    DeployingFe,
    /// All components deployed and available.
    Ready,
    /// Deploy failed; already-applied components are left in place.
    Failed,
    Stopping,
    Stopped,
    StopFailed,
    Starting,
    StartFailed,
    Destroying,
    DeleteFailed,
    /// Nothing deployed (after delete, or never configured).
    NotReady,
    /// Stored value not recognized.
    #[serde(other)]
    Unknown,
}

impl TenantStatus {
    /// Wire/storage representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DeployingPg => "DEPLOYING_PG",
            Self::DeployingBe => "DEPLOYING_BE",
            Self::DeployingFe => "DEPLOYING_FE",
            Self::Ready => "READY",
            Self::Failed => "FAILED",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::StopFailed => "STOP_FAILED",
            Self::Starting => "STARTING",
            Self::StartFailed => "START_FAILED",
            Self::Destroying => "DESTROYING",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::NotReady => "NOT_READY",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Parse a stored value; unrecognized text maps to [`TenantStatus::Unknown`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "DEPLOYING_PG" => Self::DeployingPg,
            "DEPLOYING_BE" => Self::DeployingBe,
            "DEPLOYING_FE" => Self::DeployingFe,
            "READY" => Self::Ready,
            "FAILED" => Self::Failed,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "STOP_FAILED" => Self::StopFailed,
            "STARTING" => Self::Starting,
            "START_FAILED" => Self::StartFailed,
            "DESTROYING" => Self::Destroying,
            "DELETE_FAILED" => Self::DeleteFailed,
            "NOT_READY" => Self::NotReady,
            _ => Self::Unknown,
        }
    }

    /// Whether a workflow is (or was, before a crash) in the middle of this state.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Pending
                | Self::DeployingPg
                | Self::DeployingBe
                | Self::DeployingFe
                | Self::Stopping
                | Self::Starting
                | Self::Destroying
        )
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release identifiers of the three tenant components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNames {
    pub postgresql: String,
    pub backend_api: String,
    pub user_frontend: String,
}

impl ReleaseNames {
    /// Parse the stored JSON form, which may be partial or malformed.
    ///
    /// Returns `None` unless all three keys are present as non-empty strings.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let obj = value.as_object()?;
        let get = |key: &str| {
            obj.get(key)
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Some(Self {
            postgresql: get("postgresql")?,
            backend_api: get("backendApi")?,
            user_frontend: get("userFrontend")?,
        })
    }
}

/// A tenant as stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    /// Stable upper-case identifier.
    pub company_code: String,
    pub name: String,
    pub logo_url: Option<String>,
    pub namespace: Option<String>,
    /// `None` when absent or incomplete.
    pub release_names: Option<ReleaseNames>,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantRecord {
    /// A freshly registered tenant with no deployment configuration.
    pub fn new(company_code: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            company_code: normalize_company_code(&company_code.into()),
            name: name.into(),
            logo_url: None,
            namespace: None,
            release_names: None,
            status: TenantStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign namespace and release names.
    #[must_use]
    pub fn with_deployment(mut self, namespace: impl Into<String>, releases: ReleaseNames) -> Self {
        self.namespace = Some(namespace.into());
        self.release_names = Some(releases);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }
}

/// Company codes are compared upper-case everywhere.
#[must_use]
pub fn normalize_company_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
