//! Shared fakes for integration tests.
//!
//! The fakes script external tools and the cluster so lifecycle workflows and
//! health checks can run end to end without a cluster or binaries.

#![allow(dead_code)] // Each test binary uses a subset of the fixtures

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use tenant_orchestrator::error::RegistryError;
use tenant_orchestrator::registry::TenantPage;
use tenant_orchestrator::server::AppState;
use tenant_orchestrator::{
    AppChart, ChartSource, ClusterApi, ClusterError, ClusterErrorInfo, CommandError, CommandOutput,
    CommandRunner, CommandSpec, Config, Dependencies, FetchedChart, HealthAggregator,
    InMemoryTenantRegistry, Orchestrator, ReleaseNames, ReplicaCounts, TenantRecord, TenantRegistry,
    TenantStatus, WorkflowError, WorkloadKind,
};

// ============================================================================
// Fixtures
// ============================================================================

pub fn acme_releases() -> ReleaseNames {
    ReleaseNames {
        postgresql: "acme-postgresql".to_string(),
        backend_api: "acme-backend-api".to_string(),
        user_frontend: "acme-user-frontend".to_string(),
    }
}

/// Fully configured tenant `ACME` in namespace `tenant-acme`.
pub fn acme(status: TenantStatus) -> TenantRecord {
    TenantRecord::new("ACME", "Acme Corp")
        .with_deployment("tenant-acme", acme_releases())
        .with_status(status)
}

pub fn selector(release: &str) -> String {
    format!("app.kubernetes.io/instance={release}")
}

/// Kind configuration with no environment lookups.
pub fn test_config() -> Config {
    config_with(&[])
}

pub fn config_with(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let mut config = Config::from_lookup(|key| vars.get(key).cloned());
    config.charts.workdir = std::env::temp_dir().join("tenant-orchestrator-tests");
    config
}

// ============================================================================
// Command runner
// ============================================================================

/// Scripted reply for a matched command.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(String),
    Fail { exit_code: i32, stderr: String },
    /// Succeed once the gate is opened.
    Gate(Arc<Notify>),
    Panic(&'static str),
}

impl Reply {
    pub fn fail(stderr: &str) -> Self {
        Self::Fail {
            exit_code: 1,
            stderr: stderr.to_string(),
        }
    }
}

struct Rule {
    program: String,
    needles: Vec<String>,
    reply: Reply,
}

/// Records every command and answers from a rule list; unmatched commands succeed.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `reply` to `program` invocations whose arguments contain every needle.
    /// Earlier rules win.
    pub fn on(&self, program: &str, needles: &[&str], reply: Reply) -> &Self {
        self.rules.lock().unwrap().push(Rule {
            program: program.to_string(),
            needles: needles.iter().map(|n| (*n).to_string()).collect(),
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines in invocation order.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    /// Command lines of `program` whose first argument is `subcommand`.
    pub fn invocations(&self, program: &str, subcommand: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.program == program && c.args.first().map(String::as_str) == Some(subcommand)
            })
            .map(|c| c.args)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(spec.clone());
        let reply = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| {
                rule.program == spec.program
                    && rule.needles.iter().all(|n| spec.args.iter().any(|a| a.contains(n.as_str())))
            })
            .map(|rule| rule.reply.clone());

        match reply {
            None => Ok(CommandOutput::default()),
            Some(Reply::Ok(stdout)) => Ok(CommandOutput {
                stdout,
                stderr: String::new(),
            }),
            Some(Reply::Fail { exit_code, stderr }) => Err(CommandError::Failed {
                program: spec.program.clone(),
                exit_code,
                stdout: String::new(),
                stderr,
            }),
            Some(Reply::Gate(gate)) => {
                gate.notified().await;
                Ok(CommandOutput::default())
            }
            Some(Reply::Panic(message)) => panic!("{message}"),
        }
    }
}

// ============================================================================
// Cluster
// ============================================================================

/// In-memory control plane.
pub struct FakeCluster {
    namespace: Mutex<Result<(), ClusterErrorInfo>>,
    workloads: Mutex<HashMap<String, Result<Vec<ReplicaCounts>, ClusterErrorInfo>>>,
    delete_error: Mutex<Option<ClusterErrorInfo>>,
    deleted: Mutex<Vec<String>>,
    lookups: Mutex<Vec<(String, WorkloadKind)>>,
    version: Option<String>,
}

pub fn api_error(code: u16, reason: &str, message: &str) -> ClusterErrorInfo {
    ClusterErrorInfo {
        status_code: code,
        reason: reason.to_string(),
        message: message.to_string(),
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self {
            namespace: Mutex::new(Ok(())),
            workloads: Mutex::new(HashMap::new()),
            delete_error: Mutex::new(None),
            deleted: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            version: Some("v1.31.0".to_string()),
        }
    }
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cluster where all three `ACME` components run one ready replica.
    pub fn healthy_acme() -> Self {
        let cluster = Self::new();
        let one = ReplicaCounts {
            desired: 1,
            ready: 1,
            current: 1,
        };
        let releases = acme_releases();
        for release in [releases.postgresql, releases.backend_api, releases.user_frontend] {
            cluster.set_workload(&release, one);
        }
        cluster
    }

    pub fn unreachable() -> Self {
        Self {
            version: None,
            ..Self::default()
        }
    }

    pub fn set_namespace(&self, state: Result<(), ClusterErrorInfo>) {
        *self.namespace.lock().unwrap() = state;
    }

    pub fn set_workload(&self, release: &str, counts: ReplicaCounts) {
        self.workloads
            .lock()
            .unwrap()
            .insert(selector(release), Ok(vec![counts]));
    }

    pub fn remove_workload(&self, release: &str) {
        self.workloads.lock().unwrap().remove(&selector(release));
    }

    pub fn fail_workload(&self, release: &str, error: ClusterErrorInfo) {
        self.workloads
            .lock()
            .unwrap()
            .insert(selector(release), Err(error));
    }

    pub fn fail_namespace_delete(&self, error: ClusterErrorInfo) {
        *self.delete_error.lock().unwrap() = Some(error);
    }

    pub fn deleted_namespaces(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn workload_lookups(&self) -> Vec<(String, WorkloadKind)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn read_namespace(&self, _name: &str) -> Result<(), ClusterError> {
        self.namespace.lock().unwrap().clone().map_err(ClusterError)
    }

    async fn list_workloads(
        &self,
        _namespace: &str,
        selector: &str,
        kind: WorkloadKind,
    ) -> Result<Vec<ReplicaCounts>, ClusterError> {
        self.lookups.lock().unwrap().push((selector.to_string(), kind));
        match self.workloads.lock().unwrap().get(selector) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(info)) => Err(ClusterError(info.clone())),
            None => Ok(Vec::new()),
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        if let Some(info) = self.delete_error.lock().unwrap().clone() {
            return Err(ClusterError(info));
        }
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        self.version
            .clone()
            .ok_or_else(|| ClusterError(ClusterErrorInfo::from_message("connection refused")))
    }
}

// ============================================================================
// Charts
// ============================================================================

/// Hands out fixed chart paths without touching the filesystem.
#[derive(Default)]
pub struct FakeCharts {
    fetched: Mutex<Vec<AppChart>>,
    failing: Mutex<Option<AppChart>>,
}

impl FakeCharts {
    pub fn fail_on(&self, chart: AppChart) {
        *self.failing.lock().unwrap() = Some(chart);
    }

    pub fn fetched(&self) -> Vec<AppChart> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChartSource for FakeCharts {
    async fn fetch(
        &self,
        _company_code: &str,
        chart: AppChart,
    ) -> Result<FetchedChart, WorkflowError> {
        self.fetched.lock().unwrap().push(chart);
        if *self.failing.lock().unwrap() == Some(chart) {
            return Err(WorkflowError::ChartFetch {
                chart: chart.as_str().to_string(),
                detail: "fatal: unable to access repository".to_string(),
            });
        }
        Ok(FetchedChart::at(PathBuf::from("/charts").join(chart.as_str())))
    }
}

// ============================================================================
// Registry
// ============================================================================

/// In-memory registry that remembers every status write.
#[derive(Default)]
pub struct RecordingRegistry {
    inner: InMemoryTenantRegistry,
    writes: Mutex<Vec<(String, TenantStatus)>>,
    fail_reads: Mutex<bool>,
}

impl RecordingRegistry {
    pub fn with_tenants(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self {
            inner: InMemoryTenantRegistry::with_tenants(records),
            ..Self::default()
        }
    }

    /// Status writes for `company_code`, in order.
    pub fn history(&self, company_code: &str) -> Vec<TenantStatus> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(code, _)| code == company_code)
            .map(|(_, status)| *status)
            .collect()
    }

    pub async fn status(&self, company_code: &str) -> Option<TenantStatus> {
        self.inner
            .find_by_code(company_code)
            .await
            .unwrap()
            .map(|r| r.status)
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub async fn remove(&self, company_code: &str) {
        self.inner.remove(company_code).await;
    }
}

#[async_trait]
impl TenantRegistry for RecordingRegistry {
    async fn find_by_code(
        &self,
        company_code: &str,
    ) -> Result<Option<TenantRecord>, RegistryError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(RegistryError::Database("connection reset by peer".to_string()));
        }
        self.inner.find_by_code(company_code).await
    }

    async fn update_status(
        &self,
        company_code: &str,
        status: TenantStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        self.writes
            .lock()
            .unwrap()
            .push((company_code.to_string(), status));
        self.inner.update_status(company_code, status, at).await
    }

    async fn list(&self, page: u32, page_size: u32) -> Result<TenantPage, RegistryError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(RegistryError::Database("connection reset by peer".to_string()));
        }
        self.inner.list(page, page_size).await
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Orchestrator and health aggregator wired to fakes.
pub struct Harness {
    pub config: Arc<Config>,
    pub registry: Arc<RecordingRegistry>,
    pub runner: Arc<ScriptedRunner>,
    pub cluster: Arc<FakeCluster>,
    pub charts: Arc<FakeCharts>,
    pub orchestrator: Orchestrator,
    pub health: Arc<HealthAggregator>,
}

impl Harness {
    pub fn new(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self::build(test_config(), records, FakeCluster::healthy_acme())
    }

    pub fn build(
        config: Config,
        records: impl IntoIterator<Item = TenantRecord>,
        cluster: FakeCluster,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(RecordingRegistry::with_tenants(records));
        let runner = Arc::new(ScriptedRunner::new());
        let cluster = Arc::new(cluster);
        let charts = Arc::new(FakeCharts::default());

        let orchestrator = Orchestrator::new(Dependencies {
            registry: registry.clone(),
            cluster: cluster.clone(),
            runner: runner.clone(),
            charts: charts.clone(),
            config: config.clone(),
        });
        let health = Arc::new(
            HealthAggregator::new(registry.clone(), cluster.clone())
                .with_workflows(orchestrator.clone()),
        );

        Self {
            config,
            registry,
            runner,
            cluster,
            charts,
            orchestrator,
            health,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            config: self.config.clone(),
            registry: self.registry.clone(),
            cluster: self.cluster.clone(),
            health: self.health.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }

    /// Wait until the registry holds `expected` for `company_code`.
    pub async fn wait_for_status(&self, company_code: &str, expected: TenantStatus) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.registry.status(company_code).await != Some(expected) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "{company_code} never reached {expected}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
