//! Application chart retrieval.
//!
//! Charts are fetched on demand for every deploy and discarded afterwards.
//! A [`FetchedChart`] owns its scratch directory. [`FetchedChart::discard`]
//! removes the checkout on the blocking pool; dropping the value without
//! discarding it removes the checkout in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::command::{CommandRunner, CommandSpec};
use crate::config::ChartConfig;
use crate::error::{CommandError, WorkflowError};

/// Application components deployed from the chart source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppChart {
    BackendApi,
    UserFrontend,
}

impl AppChart {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BackendApi => "backend-api",
            Self::UserFrontend => "user-frontend",
        }
    }
}

/// A chart directory ready to pass to `helm upgrade --install`.
#[derive(Debug)]
pub struct FetchedChart {
    path: PathBuf,
    scratch: Option<TempDir>,
}

impl FetchedChart {
    /// A chart in a directory this value does not own.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scratch: None,
        }
    }

    fn in_scratch(scratch: TempDir, subpath: &str) -> Self {
        Self {
            path: scratch.path().join(subpath),
            scratch: Some(scratch),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the scratch checkout, if this value owns one.
    pub async fn discard(mut self) {
        if let Some(scratch) = self.scratch.take() {
            remove_scratch(scratch).await;
        }
    }
}

async fn remove_scratch(scratch: TempDir) {
    let dir = scratch.path().to_path_buf();
    match tokio::task::spawn_blocking(move || scratch.close()).await {
        Ok(Ok(())) => debug!(dir = %dir.display(), "Chart checkout removed"),
        Ok(Err(e)) => warn!(dir = %dir.display(), error = %e, "Failed to remove chart checkout"),
        Err(e) => warn!(dir = %dir.display(), error = %e, "Chart checkout removal task failed"),
    }
}

/// Source of application charts.
#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Fetch `chart` for one tenant's deployment.
    async fn fetch(
        &self,
        company_code: &str,
        chart: AppChart,
    ) -> Result<FetchedChart, WorkflowError>;
}

/// Fetches charts with a shallow, sparse git clone.
pub struct GitChartSource {
    runner: Arc<dyn CommandRunner>,
    git: String,
    config: ChartConfig,
}

impl GitChartSource {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        git: impl Into<String>,
        config: ChartConfig,
    ) -> Self {
        Self {
            runner,
            git: git.into(),
            config,
        }
    }

    fn subpath(&self, chart: AppChart) -> &str {
        match chart {
            AppChart::BackendApi => &self.config.backend_path,
            AppChart::UserFrontend => &self.config.frontend_path,
        }
    }

    /// Create an empty scratch directory under the configured workdir.
    async fn scratch_dir(&self, company_code: &str, chart: AppChart) -> std::io::Result<TempDir> {
        let workdir = self.config.workdir.clone();
        let prefix = format!("{}-{}-", company_code.to_lowercase(), chart.as_str());
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&workdir)?;
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&workdir)
        })
        .await
        .map_err(std::io::Error::other)?
    }

    async fn checkout(&self, dir: &Path, subpath: &str) -> Result<(), CommandError> {
        let clone = CommandSpec::new(&self.git, "git-clone")
            .args([
                "clone",
                "--depth=1",
                "--filter=blob:none",
                "--sparse",
                self.config.repo_url.as_str(),
            ])
            .arg(dir.to_string_lossy());
        self.runner.run(&clone).await?;

        let sparse = CommandSpec::new(&self.git, "git-sparse")
            .args(["sparse-checkout", "set", subpath])
            .current_dir(dir);
        self.runner.run(&sparse).await?;
        Ok(())
    }
}

#[async_trait]
impl ChartSource for GitChartSource {
    async fn fetch(
        &self,
        company_code: &str,
        chart: AppChart,
    ) -> Result<FetchedChart, WorkflowError> {
        let fetch_err = |detail: String| WorkflowError::ChartFetch {
            chart: chart.as_str().to_string(),
            detail,
        };

        let scratch = self.scratch_dir(company_code, chart).await.map_err(|e| {
            fetch_err(format!(
                "cannot create scratch directory in {}: {e}",
                self.config.workdir.display()
            ))
        })?;

        let subpath = self.subpath(chart);
        debug!(
            company_code,
            chart = chart.as_str(),
            dir = %scratch.path().display(),
            "Fetching chart"
        );

        if let Err(e) = self.checkout(scratch.path(), subpath).await {
            remove_scratch(scratch).await;
            return Err(fetch_err(format!("{e}: {}", e.output().trim())));
        }

        let fetched = FetchedChart::in_scratch(scratch, subpath);
        info!(
            company_code,
            chart = chart.as_str(),
            path = %fetched.path().display(),
            "Chart fetched"
        );
        Ok(fetched)
    }
}
