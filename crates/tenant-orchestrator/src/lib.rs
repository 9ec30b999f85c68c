//! Per-tenant lifecycle orchestration on Kubernetes.
//!
//! This crate provides:
//! - Lifecycle workflows (deploy, stop, start, delete) driving each tenant's
//!   persisted status through its state machine
//! - Live tenant health aggregation with background status reconciliation
//! - CLI-driven release management (helm), readiness waits and scaling (kubectl)
//! - The tenant registry contract with PostgreSQL and in-memory backends
//! - HTTP server exposing health, config, listing and lifecycle endpoints

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod charts;
pub mod cluster;
pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod helm;
pub mod kube_error;
pub mod lifecycle;
pub mod readiness;
pub mod registry;
pub mod resolver;
pub mod scaler;
pub mod server;
pub mod status;
pub mod tenant;
pub mod values;

pub use charts::{AppChart, ChartSource, FetchedChart, GitChartSource};
pub use cluster::{ClusterApi, KubeCluster, ReplicaCounts, WorkloadKind};
pub use command::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use config::Config;
pub use error::{ClusterError, CommandError, ConfigError, HealthError, SubmitError, WorkflowError};
pub use health::{HealthAggregator, HealthSnapshot, ReportedStatus};
pub use kube_error::ClusterErrorInfo;
pub use lifecycle::{Dependencies, Orchestrator, Workflow};
pub use registry::{InMemoryTenantRegistry, TenantPage, TenantRegistry};
#[cfg(feature = "postgres")]
pub use registry::PgTenantRegistry;
pub use status::{ServiceState, ServiceStatus};
pub use tenant::{ReleaseNames, TenantRecord, TenantStatus};
