//! Error types for tenant orchestration.
//!
//! Each layer has its own `thiserror` enum; [`WorkflowError`] folds all of
//! them into the single fault type a lifecycle workflow accounts for.

use thiserror::Error;

use crate::kube_error::ClusterErrorInfo;
use crate::tenant::TenantStatus;

/// Failures of an external command invocation.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started at all (binary missing, permission denied).
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited with a non-zero code.
    #[error("'{program}' exited with code {exit_code}")]
    Failed {
        program: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Reading the process output or waiting on it failed.
    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Combined captured output, empty for spawn and I/O failures.
    #[must_use]
    pub fn output(&self) -> String {
        match self {
            Self::Failed { stdout, stderr, .. } => format!("{stdout}{stderr}"),
            Self::Spawn { .. } | Self::Io { .. } => String::new(),
        }
    }

    /// Whether the captured output contains `needle` (case-insensitive).
    #[must_use]
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output()
            .to_lowercase()
            .contains(&needle.to_lowercase())
    }
}

/// A Kubernetes API failure, already normalized.
#[derive(Debug, Clone, Error)]
#[error("cluster API error {}: {} ({})", .0.status_code, .0.message, .0.reason)]
pub struct ClusterError(pub ClusterErrorInfo);

impl ClusterError {
    /// HTTP-class status code of the failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.0.status_code
    }

    /// Whether the API reported the object as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.0.status_code == 404
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        Self(ClusterErrorInfo::from_kube(&err))
    }
}

/// Failures of the persisted tenant registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing store rejected or failed the query.
    #[error("registry database error: {0}")]
    Database(String),

    /// A stored row could not be interpreted.
    #[error("corrupt registry row for {company_code}: {detail}")]
    Corrupt { company_code: String, detail: String },
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for RegistryError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// A tenant is unknown or not configured well enough to operate on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No registry record exists for the company code.
    #[error("company code {0} not found in the tenant registry")]
    UnknownTenant(String),

    /// The record exists but lacks a namespace or release names.
    #[error("tenant {company_code} is not fully configured: {detail}")]
    Incomplete { company_code: String, detail: String },
}

/// Error returned by the tenant configuration resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// 404-class: the tenant cannot be operated on.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 500-class: the registry itself failed.
    #[error("internal error fetching tenant configuration: {0}")]
    Registry(#[from] RegistryError),
}

/// Every fault a lifecycle workflow step can produce.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("{kind} with selector '{selector}' in {namespace} not ready within {timeout_secs}s")]
    ReadinessTimeout {
        kind: String,
        namespace: String,
        selector: String,
        timeout_secs: u64,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("failed to fetch chart '{chart}': {detail}")]
    ChartFetch { chart: String, detail: String },

    /// Environment variant is missing something it requires.
    #[error("deployment configuration error: {0}")]
    Deployment(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ResolveError> for WorkflowError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Config(e) => Self::Configuration(e),
            ResolveError::Registry(e) => Self::Registry(e),
        }
    }
}

/// A workflow could not be started.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Another workflow for the same tenant is still running.
    #[error("a {running} workflow is already in progress for {company_code}")]
    InProgress {
        company_code: String,
        running: String,
    },
}

/// Failure of a health check as seen by the caller.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("internal error during health check: {0}")]
    Internal(String),
}

impl From<ResolveError> for HealthError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Config(e) => Self::Config(e),
            ResolveError::Registry(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Terminal status a failed workflow falls back to.
pub(crate) fn failure_status_for(workflow: crate::lifecycle::Workflow) -> TenantStatus {
    use crate::lifecycle::Workflow;
    match workflow {
        Workflow::Deploy => TenantStatus::Failed,
        Workflow::Stop => TenantStatus::StopFailed,
        Workflow::Start => TenantStatus::StartFailed,
        Workflow::Delete => TenantStatus::DeleteFailed,
    }
}
