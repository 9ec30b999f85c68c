//! Tenant lifecycle orchestration.
//!
//! Four workflows drive a tenant through its state machine:
//!
//! ```text
//! PENDING -> DEPLOYING_PG -> DEPLOYING_BE -> DEPLOYING_FE -> READY
//!                 \______________\_______________\________-> FAILED
//! READY   -> STOPPING -> STOPPED | STOP_FAILED
//! STOPPED -> STARTING -> READY   | START_FAILED
//! any     -> DESTROYING -> NOT_READY | DELETE_FAILED
//! ```
//!
//! Workflows run as background tasks and report progress only through
//! registry status writes. Every workflow ends with a terminal status write,
//! including when a step panics. At most one workflow runs per tenant.

mod delete;
mod deploy;
mod scale;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::charts::ChartSource;
use crate::cluster::ClusterApi;
use crate::command::CommandRunner;
use crate::config::Config;
use crate::error::{failure_status_for, SubmitError};
use crate::registry::TenantRegistry;
use crate::tenant::{normalize_company_code, TenantStatus};

/// The four lifecycle procedures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workflow {
    Deploy,
    Stop,
    Start,
    Delete,
}

impl Workflow {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deploy => "deploy",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Delete => "delete",
        }
    }

    /// Transitional status written when the workflow begins.
    #[must_use]
    pub fn initial_status(&self) -> TenantStatus {
        match self {
            Self::Deploy => TenantStatus::Pending,
            Self::Stop => TenantStatus::Stopping,
            Self::Start => TenantStatus::Starting,
            Self::Delete => TenantStatus::Destroying,
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaborators a workflow operates through.
pub struct Dependencies {
    pub registry: Arc<dyn TenantRegistry>,
    pub cluster: Arc<dyn ClusterApi>,
    pub runner: Arc<dyn CommandRunner>,
    pub charts: Arc<dyn ChartSource>,
    pub config: Arc<Config>,
}

struct Inner {
    deps: Dependencies,
    in_flight: DashMap<String, Workflow>,
}

/// Starts lifecycle workflows in the background.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// Releases a tenant's single-flight slot when dropped.
struct InFlightGuard {
    inner: Arc<Inner>,
    company_code: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.remove(&self.company_code);
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(deps: Dependencies) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                in_flight: DashMap::new(),
            }),
        }
    }

    /// Workflow currently running for a tenant, if any.
    #[must_use]
    pub fn running(&self, company_code: &str) -> Option<Workflow> {
        self.inner
            .in_flight
            .get(&normalize_company_code(company_code))
            .map(|entry| *entry.value())
    }

    /// Spawn `workflow` for a tenant.
    ///
    /// Returns as soon as the task is scheduled. The handle resolves to the
    /// terminal status; callers that only acknowledge the request may drop
    /// it. A second workflow for a tenant that already has one running is
    /// rejected.
    pub fn submit(
        &self,
        workflow: Workflow,
        company_code: &str,
    ) -> Result<JoinHandle<TenantStatus>, SubmitError> {
        let company_code = normalize_company_code(company_code);
        match self.inner.in_flight.entry(company_code.clone()) {
            Entry::Occupied(entry) => {
                let running = *entry.get();
                warn!(
                    company_code = %company_code,
                    requested = %workflow,
                    %running,
                    "Workflow rejected; another is in progress"
                );
                return Err(SubmitError::InProgress {
                    company_code,
                    running: running.to_string(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(workflow);
            }
        }

        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            company_code: company_code.clone(),
        };
        let inner = Arc::clone(&self.inner);
        info!(company_code = %company_code, %workflow, "Workflow accepted");

        Ok(tokio::spawn(async move {
            let _guard = guard;
            match AssertUnwindSafe(inner.run(workflow, &company_code)).catch_unwind().await {
                Ok(status) => status,
                Err(panic) => {
                    let detail = panic_message(panic.as_ref());
                    error!(
                        company_code = %company_code,
                        %workflow,
                        panic = %detail,
                        "Workflow panicked"
                    );
                    let status = failure_status_for(workflow);
                    inner.set_status(&company_code, status).await;
                    status
                }
            }
        }))
    }

    pub fn deploy(&self, company_code: &str) -> Result<JoinHandle<TenantStatus>, SubmitError> {
        self.submit(Workflow::Deploy, company_code)
    }

    pub fn stop(&self, company_code: &str) -> Result<JoinHandle<TenantStatus>, SubmitError> {
        self.submit(Workflow::Stop, company_code)
    }

    pub fn start(&self, company_code: &str) -> Result<JoinHandle<TenantStatus>, SubmitError> {
        self.submit(Workflow::Start, company_code)
    }

    pub fn delete(&self, company_code: &str) -> Result<JoinHandle<TenantStatus>, SubmitError> {
        self.submit(Workflow::Delete, company_code)
    }
}

impl Inner {
    async fn run(&self, workflow: Workflow, company_code: &str) -> TenantStatus {
        let status = match workflow {
            Workflow::Deploy => self.deploy(company_code).await,
            Workflow::Stop => self.stop(company_code).await,
            Workflow::Start => self.start(company_code).await,
            Workflow::Delete => self.delete(company_code).await,
        };
        info!(company_code, %workflow, %status, "Workflow finished");
        status
    }

    /// Write a status transition. Failures are logged, never raised.
    async fn set_status(&self, company_code: &str, status: TenantStatus) {
        info!(company_code, %status, "Updating tenant status");
        if let Err(e) = self
            .deps
            .registry
            .update_status(company_code, status, Utc::now())
            .await
        {
            error!(company_code, %status, error = %e, "Failed to update tenant status");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
