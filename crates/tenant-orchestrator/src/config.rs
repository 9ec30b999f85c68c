//! Configuration for the tenant orchestrator service.
//!
//! All settings come from environment variables and are fixed for the
//! lifetime of the process.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which network-exposure strategy tenant ingress uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KubernetesEnv {
    /// Local kind cluster, exposed through Traefik `IngressRoute`s.
    Kind,
    /// GKE, exposed through Kubernetes `Ingress` with externally built images.
    Gke,
}

impl KubernetesEnv {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "gke" => Self::Gke,
            _ => Self::Kind,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kind => "kind",
            Self::Gke => "gke",
        }
    }

    fn default_domain(self) -> &'static str {
        match self {
            Self::Kind => "localhost",
            Self::Gke => "jinseok9338.info",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Where application charts are fetched from.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    /// Git repository holding the application charts.
    pub repo_url: String,
    pub backend_path: String,
    pub frontend_path: String,
    /// Scratch directory for per-tenant checkouts.
    pub workdir: PathBuf,
}

/// Database chart coordinates.
#[derive(Debug, Clone)]
pub struct DatabaseChartConfig {
    /// Chart reference passed to `helm upgrade --install`.
    pub chart: String,
    pub repo_name: String,
    pub repo_url: String,
}

/// Binaries used for CLI-driven cluster operations.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub helm: String,
    pub kubectl: String,
    pub git: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port.
    pub port: u16,
    /// Registry connection string.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub log_format: LogFormat,
    pub kubernetes_env: KubernetesEnv,
    /// `repo:tag` of the API image, required on GKE.
    pub tenant_backend_image: Option<String>,
    /// `repo:tag` of the user-facing image, required on GKE.
    pub tenant_frontend_image: Option<String>,
    /// Host suffix for tenant ingress hosts.
    pub base_domain: String,
    pub charts: ChartConfig,
    pub database_chart: DatabaseChartConfig,
    /// Readiness bound for the database during provisioning.
    pub provision_timeout: Duration,
    /// Readiness bound for application deployments (deploy and start).
    pub rollout_timeout: Duration,
    pub tools: ToolPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

impl Config {
    /// Build from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let secs = |key: &str, default: u64| {
            Duration::from_secs(get(key).and_then(|s| s.parse().ok()).unwrap_or(default))
        };

        let kubernetes_env =
            get("KUBERNETES_ENV").map_or(KubernetesEnv::Kind, |v| KubernetesEnv::parse(&v));

        Self {
            port: get("PORT").and_then(|s| s.parse().ok()).unwrap_or(3001),
            database_url: get("DATABASE_URL"),
            database_max_connections: get("DATABASE_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            log_format: match get("LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            kubernetes_env,
            tenant_backend_image: get("TENANT_BACKEND_IMAGE"),
            tenant_frontend_image: get("TENANT_FRONTEND_IMAGE"),
            base_domain: get_or("TENANT_BASE_DOMAIN", kubernetes_env.default_domain()),
            charts: ChartConfig {
                repo_url: get_or(
                    "TENANT_CHART_REPO",
                    "https://github.com/jinseok9338/k8s-demo-helm.git",
                ),
                backend_path: get_or("TENANT_BACKEND_CHART_PATH", "helm/backend-api"),
                frontend_path: get_or("TENANT_FRONTEND_CHART_PATH", "helm/user-frontend"),
                workdir: get("TENANT_CHART_WORKDIR")
                    .map_or_else(|| env::temp_dir().join("tenant-charts"), PathBuf::from),
            },
            database_chart: DatabaseChartConfig {
                chart: get_or("DATABASE_CHART", "bitnami/postgresql"),
                repo_name: get_or("DATABASE_CHART_REPO_NAME", "bitnami"),
                repo_url: get_or("DATABASE_CHART_REPO_URL", "https://charts.bitnami.com/bitnami"),
            },
            provision_timeout: secs("PROVISION_TIMEOUT_SECS", 300),
            rollout_timeout: secs("ROLLOUT_TIMEOUT_SECS", 180),
            tools: ToolPaths {
                helm: get_or("HELM_BIN", "helm"),
                kubectl: get_or("KUBECTL_BIN", "kubectl"),
                git: get_or("GIT_BIN", "git"),
            },
        }
    }

    /// User-facing host of a tenant.
    #[must_use]
    pub fn frontend_host(&self, company_code: &str) -> String {
        format!("app.{}.{}", company_code.to_lowercase(), self.base_domain)
    }

    /// API host of a tenant.
    #[must_use]
    pub fn backend_host(&self, company_code: &str) -> String {
        format!("api.{}.{}", company_code.to_lowercase(), self.base_domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_target_a_local_kind_cluster() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.kubernetes_env, KubernetesEnv::Kind);
        assert_eq!(config.base_domain, "localhost");
        assert_eq!(config.provision_timeout, Duration::from_secs(300));
        assert_eq!(config.rollout_timeout, Duration::from_secs(180));
        assert_eq!(config.database_chart.chart, "bitnami/postgresql");
        assert_eq!(config.tools.kubectl, "kubectl");
        assert!(config.database_url.is_none());
        assert_eq!(config.frontend_host("ACME"), "app.acme.localhost");
    }

    #[test]
    fn gke_switches_domain_and_reads_images() {
        let config = config_from(&[
            ("KUBERNETES_ENV", "GKE"),
            ("TENANT_BACKEND_IMAGE", "gcr.io/p/backend:1.2.3"),
            ("PORT", "8080"),
            ("ROLLOUT_TIMEOUT_SECS", "60"),
        ]);
        assert_eq!(config.kubernetes_env, KubernetesEnv::Gke);
        assert_eq!(config.backend_host("ACME"), "api.acme.jinseok9338.info");
        assert_eq!(config.tenant_backend_image.as_deref(), Some("gcr.io/p/backend:1.2.3"));
        assert!(config.tenant_frontend_image.is_none());
        assert_eq!(config.port, 8080);
        assert_eq!(config.rollout_timeout, Duration::from_secs(60));
    }

    #[test]
    fn empty_and_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("TENANT_BASE_DOMAIN", "  "),
            ("LOG_FORMAT", "json"),
        ]);
        assert_eq!(config.port, 3001);
        assert_eq!(config.base_domain, "localhost");
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
