//! jira-automation - rule-driven automation for Jira Cloud issues
//!
//! Main entry point for the jira-automation CLI.

use clap::{Args, Parser, Subcommand};
use jira_automation::config::{validate_config, validate_config_result, AutomationConfig};
use jira_automation::retry::{with_retry, RetryConfig};
use jira_automation::style;
use jira_automation::tracker::{InMemoryTracker, JiraClient};
use jira_automation::{
    AutomationError, ChangeContext, ExecutionReport, Result, RuleEngine, RuleId, TrackerClient,
    TrackerError,
};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// jira-automation - Apply automation rules to Jira issues
#[derive(Parser, Debug)]
#[command(name = "jira-automation")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/jira-automation/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the rules against one issue
    Run {
        /// Issue key (e.g., KAN-1)
        key: String,

        #[command(flatten)]
        rules: RuleArgs,

        /// Retries on transport errors (default: from config)
        #[arg(long)]
        retries: Option<u32>,
    },

    /// Run the rules against several issues
    Batch {
        /// Issue keys
        #[arg(required = true)]
        keys: Vec<String>,

        #[command(flatten)]
        rules: RuleArgs,

        /// Issues processed at once (default: from config)
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List the available rules
    Rules,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Only evaluate this rule (repeatable; default: all rules)
    #[arg(short, long = "rule", value_name = "NAME")]
    rules: Vec<RuleId>,

    /// Status change that triggered the run
    #[arg(long, num_args = 2, value_names = ["OLD", "NEW"], conflicts_with = "priority_change")]
    status_change: Option<Vec<String>>,

    /// Priority change that triggered the run
    #[arg(long, num_args = 2, value_names = ["OLD", "NEW"])]
    priority_change: Option<Vec<String>>,

    /// Read from Jira but apply mutations to a local copy only
    #[arg(long)]
    dry_run: bool,
}

impl RuleArgs {
    fn change(&self) -> Option<ChangeContext> {
        if let Some([old, new]) = self.status_change.as_deref() {
            return Some(ChangeContext::status(old.as_str(), new.as_str()));
        }
        if let Some([old, new]) = self.priority_change.as_deref() {
            return Some(ChangeContext::priority(old.as_str(), new.as_str()));
        }
        None
    }

    /// Requested rules in the order given, duplicates dropped
    fn selected(&self) -> Vec<RuleId> {
        if self.rules.is_empty() {
            return RuleId::ALL.to_vec();
        }
        let mut selected = Vec::new();
        for id in &self.rules {
            if !selected.contains(id) {
                selected.push(*id);
            }
        }
        selected
    }
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show,

    /// Check the configuration and credentials
    Validate,

    /// Write a new configuration file
    Init {
        /// Jira site URL (e.g., https://example.atlassian.net)
        #[arg(long)]
        url: Option<String>,

        /// Account email
        #[arg(long)]
        email: Option<String>,

        /// Default project key
        #[arg(long)]
        project: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = jira_automation::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("{} {}", style::error("Error:"), e);
            process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when any rule failed
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Rules => {
            handle_rules_command();
            Ok(true)
        }
        Commands::Config(ref cmd) => handle_config_command(cmd, cli.config.as_deref()),
        Commands::Run {
            ref key,
            ref rules,
            retries,
        } => {
            let config = AutomationConfig::resolve(cli.config.as_deref())?;
            handle_run_command(&config, key, rules, retries).await
        }
        Commands::Batch {
            ref keys,
            ref rules,
            concurrency,
        } => {
            let config = AutomationConfig::resolve(cli.config.as_deref())?;
            handle_batch_command(&config, keys, rules, concurrency).await
        }
    }
}

fn normalize_key(key: &str) -> Result<String> {
    let key = key.trim().to_uppercase();
    if key.is_empty() {
        return Err(AutomationError::Other("Issue key cannot be empty".to_string()));
    }
    Ok(key)
}

fn connect(config: &AutomationConfig) -> Result<Arc<JiraClient>> {
    validate_config_result(config)?;
    let credentials = config.credentials()?;
    tracing::debug!(url = %credentials.base_url, "Connecting to Jira");
    Ok(Arc::new(JiraClient::new(credentials, config.request_timeout())?))
}

/// Copy issues and their transitions into a local tracker
///
/// Keys that do not exist are left out so the engine reports them as not found.
async fn dry_run_tracker(jira: &JiraClient, keys: &[String]) -> Result<InMemoryTracker> {
    let memory = InMemoryTracker::new();
    for key in keys {
        match jira.fetch_issue(key).await {
            Ok(snapshot) => {
                memory.insert_issue(snapshot);
                memory.set_transitions(key, jira.list_transitions(key).await?);
            }
            Err(TrackerError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(memory)
}

async fn build_engine(
    config: &AutomationConfig,
    keys: &[String],
    args: &RuleArgs,
) -> Result<RuleEngine> {
    let jira = connect(config)?;
    let tracker: Arc<dyn TrackerClient> = if args.dry_run {
        Arc::new(dry_run_tracker(&jira, keys).await?)
    } else {
        jira
    };
    let engine = RuleEngine::with_rules(tracker, &args.selected());
    tracing::debug!(rules = ?engine.rule_ids(), dry_run = args.dry_run, "Rule engine ready");
    Ok(engine)
}

async fn handle_run_command(
    config: &AutomationConfig,
    key: &str,
    args: &RuleArgs,
    retries: Option<u32>,
) -> Result<bool> {
    let key = normalize_key(key)?;
    let change = args.change();
    let engine = build_engine(config, std::slice::from_ref(&key), args).await?;

    let retry = match retries {
        Some(max_retries) => RetryConfig {
            max_retries,
            ..config.retry.clone()
        },
        None => config.retry.clone(),
    };

    let engine = &engine;
    let key = key.as_str();
    let change = change.as_ref();
    let report = match with_retry(&retry, "rule run", || async move {
        engine.run(key, change).await.into_result()
    })
    .await
    {
        Ok(report) | Err(report) => report,
    };
    print_report(&report, args.dry_run);

    Ok(!report.has_failures())
}

async fn handle_batch_command(
    config: &AutomationConfig,
    keys: &[String],
    args: &RuleArgs,
    concurrency: Option<usize>,
) -> Result<bool> {
    let keys = keys
        .iter()
        .map(|k| normalize_key(k))
        .collect::<Result<Vec<_>>>()?;
    let change = args.change();
    let engine = build_engine(config, &keys, args).await?;
    let concurrency = concurrency.unwrap_or(config.batch_concurrency);

    let reports = engine.run_batch(&keys, change.as_ref(), concurrency).await;

    let mut ok = true;
    for report in reports {
        ok &= !report.has_failures();
        print_report(&report, args.dry_run);
        println!();
    }

    Ok(ok)
}

fn print_report(report: &ExecutionReport, dry_run: bool) {
    if dry_run {
        println!(
            "{} {}",
            style::issue_key(&report.key),
            style::warning("(dry run, nothing written)")
        );
    } else {
        println!("{}", style::issue_key(&report.key));
    }

    for entry in &report.rules {
        println!(
            "  {} {} {} {}",
            style::outcome_indicator(&entry.outcome),
            style::rule_name(&format!("{:<30}", entry.rule.name())),
            style::outcome_tag(&entry.outcome),
            style::outcome_detail(&entry.outcome)
        );
    }
    if let Some(error) = &report.fatal {
        println!("  {} {}", style::error("Could not fetch issue:"), error);
    }
    println!("  {}", style::summary(&report.summary()));
}

fn handle_rules_command() {
    println!("{}", style::header("Rules (evaluated in this order)"));
    for id in RuleId::ALL {
        println!(
            "  {} {}",
            style::rule_name(&format!("{:<30}", id.name())),
            style::dim(id.description())
        );
    }
}

fn handle_config_command(cmd: &ConfigCommands, config_path: Option<&Path>) -> Result<bool> {
    match cmd {
        ConfigCommands::Show => {
            let config = AutomationConfig::resolve(config_path)?;
            print!("{}", serde_yaml::to_string(&config)?);

            let token_var = config.token_env.trim_start_matches('$');
            let token_set = std::env::var(token_var)
                .map(|t| !t.trim().is_empty())
                .unwrap_or(false);
            let status = if token_set {
                style::success("set")
            } else {
                style::error("not set")
            };
            println!("{} {} ({})", style::dim("# api token:"), status, token_var);
            Ok(true)
        }
        ConfigCommands::Validate => {
            let config = AutomationConfig::resolve(config_path)?;
            let mut ok = true;

            if let Err(errors) = validate_config(&config) {
                ok = false;
                for error in errors {
                    println!("  {} {}", style::error("✗"), error);
                }
            }
            if let Err(e) = config.credentials() {
                ok = false;
                println!("  {} {}", style::error("✗"), e);
            }

            if ok {
                println!("{}", style::success("Configuration is valid"));
            }
            Ok(ok)
        }
        ConfigCommands::Init {
            url,
            email,
            project,
            force,
        } => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(AutomationConfig::default_path);

            if path.exists() && !force {
                return Err(AutomationError::Config(format!(
                    "Config file already exists: {} (use --force to overwrite)",
                    path.display()
                )));
            }

            let mut config = AutomationConfig::new();
            config.url = url.clone();
            config.email = email.clone();
            if let Some(project) = project {
                config.project = project.trim().to_uppercase();
            }
            config.save(&path)?;

            println!(
                "{} {}",
                style::success("Wrote"),
                style::dim(&path.display().to_string())
            );
            println!(
                "Set {} in your environment (or a .env file) before running rules.",
                config.token_env
            );
            Ok(true)
        }
    }
}
