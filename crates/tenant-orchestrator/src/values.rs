//! Release value overrides per deployment environment.

use crate::config::{Config, KubernetesEnv};
use crate::error::WorkflowError;

type Values = Vec<(String, String)>;

/// Image coordinates split into repository and tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Split `repo:tag` at the last colon. A missing tag or repository is invalid.
    #[must_use]
    pub fn parse(image: &str) -> Option<Self> {
        let (repository, tag) = image.rsplit_once(':')?;
        if repository.is_empty() || tag.is_empty() {
            return None;
        }
        Some(Self {
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }
}

fn set(values: &mut Values, key: &str, value: impl Into<String>) {
    values.push((key.to_string(), value.into()));
}

fn required_image(image: Option<&str>, var: &str) -> Result<ImageRef, WorkflowError> {
    image.and_then(ImageRef::parse).ok_or_else(|| {
        WorkflowError::Deployment(format!(
            "gke environment requires {var} as repo:tag, but it is missing or invalid"
        ))
    })
}

/// Overrides for the API release.
pub fn backend_values(
    config: &Config,
    company_code: &str,
    pg_release: &str,
) -> Result<Values, WorkflowError> {
    let mut values = Values::new();
    set(&mut values, "companyCode", company_code);
    set(&mut values, "db.serviceName", pg_release);
    set(&mut values, "db.existingSecret", pg_release);
    set(&mut values, "migrationJob.enabled", "true");

    let host = config.backend_host(company_code);
    match config.kubernetes_env {
        KubernetesEnv::Gke => {
            let image =
                required_image(config.tenant_backend_image.as_deref(), "TENANT_BACKEND_IMAGE")?;
            set(&mut values, "image.repository", image.repository.as_str());
            set(&mut values, "image.tag", image.tag.as_str());
            set(&mut values, "migrationJob.image.repository", image.repository);
            set(&mut values, "migrationJob.image.tag", image.tag);
            set(&mut values, "ingress.type", "kubernetes");
            set(&mut values, "ingress.kubernetes.enabled", "true");
            set(&mut values, "ingress.kubernetes.hostname", host);
            set(&mut values, "ingress.kubernetes.path", "/");
        }
        KubernetesEnv::Kind => {
            set(&mut values, "ingress.type", "traefik");
            set(&mut values, "ingress.traefik.ingressRoute.enabled", "true");
            set(&mut values, "ingress.traefik.ingressRoute.host", host);
            set(&mut values, "ingress.traefik.middleware.stripPrefix.enabled", "false");
        }
    }
    Ok(values)
}

/// Overrides for the user-facing release.
pub fn frontend_values(config: &Config, company_code: &str) -> Result<Values, WorkflowError> {
    let mut values = Values::new();
    set(&mut values, "companyCode", company_code);

    let host = config.frontend_host(company_code);
    match config.kubernetes_env {
        KubernetesEnv::Gke => {
            let image =
                required_image(config.tenant_frontend_image.as_deref(), "TENANT_FRONTEND_IMAGE")?;
            set(&mut values, "image.repository", image.repository);
            set(&mut values, "image.tag", image.tag);
            set(&mut values, "ingress.type", "kubernetes");
            set(&mut values, "ingress.kubernetes.enabled", "true");
            set(&mut values, "ingress.kubernetes.hostname", host);
        }
        KubernetesEnv::Kind => {
            set(&mut values, "ingress.type", "traefik");
            set(&mut values, "ingressRoute.enabled", "true");
            set(&mut values, "ingressRoute.host", host);
        }
    }
    Ok(values)
}
