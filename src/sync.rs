//! Repository Synchronization
//!
//! High-level facade wiring the loader, fetcher, engine and executor
//! into the plan/apply workflow

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::config::{RepoConfig, RepositoryRef};
use crate::error::{Error, Result};
use crate::executor::{ExecutionReport, ExecutorConfig, PlanExecutor};
use crate::github::GitHubClient;
use crate::plan::{diff, ReconciliationPlan};

/// Repository Syncer
///
/// A connected client plus the plan/apply workflow for one repository
pub struct RepoSyncer {
    client: GitHubClient,
}

impl RepoSyncer {
    /// Connect to GitHub and verify the credential
    ///
    /// # Errors
    /// Returns an error if the token is empty or rejected
    pub async fn connect(access_token: &str, repo: RepositoryRef) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(Error::config("access token is required"));
        }

        let client = GitHubClient::new(access_token, repo).await?;
        Ok(Self { client })
    }

    /// The underlying API client
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// Fetch current state and compute the reconciliation plan.
    ///
    /// Pure preview: nothing is modified. The same plan can be printed,
    /// inspected and later passed to [`RepoSyncer::apply`].
    pub async fn plan(&self, desired: &RepoConfig) -> Result<ReconciliationPlan> {
        desired.validate()?;

        let current = self
            .client
            .fetch_state(&desired.protection_patterns())
            .await?;

        Ok(diff(desired, &current))
    }

    /// Apply a previously computed plan.
    ///
    /// Never fails as a whole; per-operation problems are carried in
    /// the report.
    pub async fn apply(
        &self,
        plan: &ReconciliationPlan,
        config: ExecutorConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> ExecutionReport {
        let mut executor = PlanExecutor::new(&self.client, config);
        if let Some(flag) = cancel {
            executor = executor.with_cancel(flag);
        }
        executor.apply(plan).await
    }
}
