//! gh-reposync CLI
//!
//! Command line tool for synchronizing GitHub repository metadata with
//! a declarative configuration file

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;

use gh_reposync::{
    config::{default_config, find_convention_config, load_config, RepoConfig, RepositoryRef},
    executor::{ExecutionReport, ExecutorConfig, Outcome},
    plan::{Action, ReconciliationPlan},
    sync::RepoSyncer,
};

/// gh-reposync CLI
///
/// Synchronizes a GitHub repository's labels, branch protection rules,
/// Actions secrets, topics and settings with a configuration file.
#[derive(Parser)]
#[command(
    name = "gh-reposync",
    version,
    about = "Declarative GitHub repository metadata synchronization",
    long_about = "Compares a declarative configuration file against the live state of a \
    GitHub repository and issues the minimal set of API calls to reconcile them. \
    Review changes with 'plan' before running 'apply'."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// GitHub access token (or GITHUB_TOKEN environment variable)
    #[arg(short = 't', long, global = true)]
    access_token: Option<String>,

    /// Target repository (owner/repo format)
    #[arg(short = 'r', long, global = true)]
    repository: Option<String>,

    /// Configuration file path (JSON/YAML)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print the reconciliation plan without applying it
    Plan,

    /// Compute the plan and apply it to the repository
    Apply {
        /// Overall deadline in seconds; remaining operations are skipped
        /// once it expires
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Output a starter configuration
    Init {
        /// Output format
        #[arg(long, default_value = "yaml", value_parser = ["yaml", "json"])]
        format: String,

        /// Output file path
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan => {
            let syncer = connect(&cli).await?;
            let desired = load_desired(cli.config)?;
            let plan = compute_plan(&syncer, &desired, cli.verbose).await?;
            display_plan(&plan, cli.verbose);
            Ok(())
        }

        Commands::Apply { timeout } => {
            let syncer = connect(&cli).await?;
            let desired = load_desired(cli.config)?;
            let plan = compute_plan(&syncer, &desired, cli.verbose).await?;
            display_plan(&plan, cli.verbose);

            if plan.is_noop() {
                return Ok(());
            }

            let cancel = Arc::new(AtomicBool::new(false));
            {
                let cancel = Arc::clone(&cancel);
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        eprintln!(
                            "\n{} Interrupt received; stopping after the current operation",
                            "!".yellow()
                        );
                        cancel.store(true, Ordering::SeqCst);
                    }
                });
            }

            let options = ExecutorConfig {
                timeout: timeout.map(Duration::from_secs),
                ..ExecutorConfig::default()
            };

            let report = syncer.apply(&plan, options, Some(cancel)).await;
            display_report(&report, cli.verbose);

            if cli.verbose {
                display_rate_limit(&syncer).await;
            }

            if !report.success() {
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Init { format, output } => run_init(&format, output),
    }
}

/// Build a connected syncer from the CLI arguments
async fn connect(cli: &Cli) -> anyhow::Result<RepoSyncer> {
    let token = get_access_token(cli.access_token.clone())?;
    let repo: RepositoryRef = cli
        .repository
        .as_deref()
        .context("repository is required; use -r or --repository (owner/repo)")?
        .parse()?;

    if cli.verbose {
        println!("{} Connecting to {}", "•".blue(), repo.to_string().cyan());
    }

    Ok(RepoSyncer::connect(&token, repo).await?)
}

async fn compute_plan(
    syncer: &RepoSyncer,
    desired: &RepoConfig,
    verbose: bool,
) -> anyhow::Result<ReconciliationPlan> {
    if verbose {
        display_rate_limit(syncer).await;
    }
    Ok(syncer.plan(desired).await?)
}

/// Get access token from the flag or the GITHUB_TOKEN environment variable
fn get_access_token(arg_token: Option<String>) -> anyhow::Result<String> {
    arg_token
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .context(
            "GitHub access token is required. Set via --access-token or the GITHUB_TOKEN env var",
        )
}

/// Load the desired-state configuration from the given path, or search
/// the conventional locations
fn load_desired(config_path: Option<PathBuf>) -> anyhow::Result<RepoConfig> {
    let path = match config_path {
        Some(path) => path,
        None => find_convention_config().context(
            "no configuration file found; pass -c/--config or create .gh-reposync.yml \
             (run 'gh-reposync init' for a starter)",
        )?,
    };

    load_config(&path).with_context(|| format!("failed to load {}", path.display()))
}

/// Execute init command
fn run_init(format: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let config = default_config();

    let content = match format {
        "json" => serde_json::to_string_pretty(&config)?,
        _ => serde_yaml::to_string(&config)?,
    };

    if let Some(output_path) = output {
        std::fs::write(&output_path, content)?;
        println!(
            "{} Starter configuration written to: {}",
            "✓".green(),
            output_path.display().to_string().cyan()
        );
    } else {
        println!("{content}");
    }

    Ok(())
}

/// Print the plan, one line per operation
fn display_plan(plan: &ReconciliationPlan, verbose: bool) {
    println!();
    for op in &plan.operations {
        let line = format!("{} {}", op.kind, op.target.bold());
        match op.action {
            Action::Create => println!("  {} {}", "+".green(), line),
            Action::Update => println!("  {} {}", "~".yellow(), line),
            Action::Delete => println!("  {} {}", "-".red(), line),
            Action::Skip => {
                if verbose {
                    println!("  {} {}", "=".dimmed(), line.dimmed());
                }
            }
        }
        if op.action != Action::Skip || verbose {
            for note in &op.notes {
                println!("      {}", note.dimmed());
            }
        }
    }

    let counts = plan.counts();
    if plan.is_noop() {
        println!("{} No changes required", "✓".green());
    } else {
        println!(
            "\nPlan: {} to create, {} to update, {} to delete, {} unchanged",
            counts.creates.to_string().green(),
            counts.updates.to_string().yellow(),
            counts.deletes.to_string().red(),
            counts.skips
        );
    }
}

/// Print per-operation outcomes and the final summary
fn display_report(report: &ExecutionReport, verbose: bool) {
    println!();
    for result in &report.results {
        let op = &result.operation;
        let line = format!("{} {} {}", op.action, op.kind, op.target.bold());
        match &result.outcome {
            Outcome::Applied => println!("  {} {}", "✓".green(), line),
            Outcome::Skipped(reason) => {
                if verbose || op.action != Action::Skip {
                    println!("  {} {} ({})", "-".dimmed(), line.dimmed(), reason);
                }
            }
            Outcome::Failed(reason) => {
                println!("  {} {}", "✗".red(), line);
                println!("      {}", reason.red());
            }
        }
    }

    println!(
        "\n{} applied, {} skipped, {} failed",
        report.applied().to_string().green(),
        report.skipped(),
        report.failed().to_string().red()
    );
}

async fn display_rate_limit(syncer: &RepoSyncer) {
    match syncer.client().rate_limit().await {
        Ok(rate) => println!(
            "{} {} of {} API requests remaining (resets at {})",
            "•".blue(),
            rate.remaining,
            rate.limit,
            rate.reset_at.format("%H:%M:%S")
        ),
        Err(e) => eprintln!("{} Could not read rate limit: {e}", "!".yellow()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_reposync::executor::{OperationReport, SkipReason};
    use gh_reposync::plan::{EntityKind, Operation, Payload};

    // --- get_access_token tests ---
    // Environment variable tests must run serially to avoid race conditions.
    // Combining them into a single test ensures sequential execution.

    #[test]
    fn test_get_access_token_from_arg() {
        let result = get_access_token(Some("my-token".to_string()));
        assert_eq!(result.unwrap(), "my-token");
    }

    #[test]
    fn test_get_access_token_env_variants() {
        let original = std::env::var("GITHUB_TOKEN").ok();

        std::env::set_var("GITHUB_TOKEN", "env-token");
        assert_eq!(get_access_token(None).unwrap(), "env-token");

        // Arg takes precedence over env var
        assert_eq!(
            get_access_token(Some("arg-token".to_string())).unwrap(),
            "arg-token"
        );

        std::env::remove_var("GITHUB_TOKEN");
        assert!(get_access_token(None).is_err());

        if let Some(val) = original {
            std::env::set_var("GITHUB_TOKEN", val);
        }
    }

    // --- load_desired tests ---

    #[test]
    fn test_load_desired_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reposync.yaml");
        std::fs::write(&path, "labels:\n  - name: bug\n    color: \"d73a4a\"\n").unwrap();

        let config = load_desired(Some(path)).unwrap();
        assert_eq!(config.labels.unwrap()[0].name, "bug");
    }

    #[test]
    fn test_load_desired_missing_file() {
        let result = load_desired(Some(PathBuf::from("/nonexistent/reposync.yaml")));
        assert!(result.is_err());
    }

    // --- display tests ---

    fn sample_plan() -> ReconciliationPlan {
        ReconciliationPlan {
            operations: vec![
                Operation {
                    kind: EntityKind::Label,
                    action: Action::Create,
                    target: "bug".to_string(),
                    payload: Payload::None,
                    notes: Vec::new(),
                },
                Operation {
                    kind: EntityKind::Label,
                    action: Action::Skip,
                    target: "docs".to_string(),
                    payload: Payload::None,
                    notes: vec!["up to date".to_string()],
                },
                Operation {
                    kind: EntityKind::Topics,
                    action: Action::Update,
                    target: "topics".to_string(),
                    payload: Payload::None,
                    notes: vec!["add: rust".to_string()],
                },
            ],
        }
    }

    #[test]
    fn test_display_plan_does_not_panic() {
        display_plan(&sample_plan(), false);
        display_plan(&sample_plan(), true);
        display_plan(&ReconciliationPlan::default(), false);
    }

    #[test]
    fn test_display_report_does_not_panic() {
        let plan = sample_plan();
        let report = ExecutionReport {
            results: vec![
                OperationReport {
                    operation: plan.operations[0].clone(),
                    outcome: Outcome::Applied,
                },
                OperationReport {
                    operation: plan.operations[1].clone(),
                    outcome: Outcome::Skipped(SkipReason::Planned),
                },
                OperationReport {
                    operation: plan.operations[2].clone(),
                    outcome: Outcome::Failed("rejected".to_string()),
                },
            ],
        };
        display_report(&report, false);
        display_report(&report, true);
    }

    #[test]
    fn test_run_init_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starter.yml");
        run_init("yaml", Some(path.clone())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("labels:"));

        // The generated starter must load cleanly
        let config = load_config(&path).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_run_init_json_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("starter.json");
        run_init("json", Some(path.clone())).unwrap();
        assert!(load_config(&path).is_ok());
    }
}
