//! # gh-reposync
//!
//! Declarative synchronization of GitHub repository metadata built with Rust
//!
//! ## Features
//! - Labels, branch protection, Actions secrets, topics and settings
//! - Pure, deterministic plan computation for dry-run previews
//! - Field-level branch protection merging
//! - Safety-first deletion policies

pub mod config;
pub mod error;
pub mod executor;
pub mod github;
pub mod plan;
pub mod seal;
pub mod sync;

pub use config::{Policies, RepoConfig, RepositoryRef};
pub use error::{Error, Result};
pub use executor::{ExecutionReport, ExecutorConfig, Outcome, PlanExecutor};
pub use github::{CurrentState, GitHubClient};
pub use plan::{diff, Action, EntityKind, Operation, ReconciliationPlan};
pub use sync::RepoSyncer;

/// Main functionality of gh-reposync
///
/// Plans and applies a full reconciliation run for one repository.
///
/// # Examples
///
/// ```rust,no_run
/// use gh_reposync::{config::load_config, ExecutorConfig};
///
/// #[tokio::main]
/// async fn main() -> gh_reposync::Result<()> {
///     let desired = load_config(".gh-reposync.yml")?;
///     let report = gh_reposync::sync_repository(
///         "your_github_token",
///         "owner/repo",
///         &desired,
///         ExecutorConfig::default(),
///     )
///     .await?;
///
///     println!("applied {} operations", report.applied());
///     Ok(())
/// }
/// ```
pub async fn sync_repository(
    access_token: &str,
    repository: &str,
    desired: &RepoConfig,
    options: ExecutorConfig,
) -> Result<ExecutionReport> {
    let repo = RepositoryRef::parse(repository)?;
    let syncer = RepoSyncer::connect(access_token, repo).await?;
    let plan = syncer.plan(desired).await?;
    Ok(syncer.apply(&plan, options, None).await)
}
