//! custodian-worker — runs the rule-group scheduling engine.
//!
//! Wires stores, lifecycle service, event bus, scheduler, and the queue
//! drain loop, optionally seeding rule groups from a JSON file:
//! - `run` — tick the scheduler and drain the queue until ctrl-c
//! - `migrate` — rewrite rule property references to another media server
//!
//! Shutdown stops the queue (in-flight evaluation finishes) and the
//! scheduler loops.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use custodian_core::config::load_dotenv;
use custodian_core::Config;
use custodian_queue::{
    EvaluationReport, Evaluator, ExecutionQueue, KeyedLock, QueueError, QueueRunner,
};
use custodian_rules::events::EventBus;
use custodian_rules::lifecycle::RuleGroupService;
use custodian_rules::schema::{Application, RuleGroup, Settings};
use custodian_rules::scheduler::RuleGroupScheduler;
use custodian_rules::store::memory::{
    InMemoryCollectionService, InMemoryExclusionStore, InMemoryRuleGroupStore,
};
use custodian_rules::store::{CollectionService, ExclusionStore, RuleGroupStore};

// ── CLI ─────────────────────────────────────────────────────────────

/// Rule-group scheduling and maintenance worker.
#[derive(Parser, Debug)]
#[command(name = "custodian-worker", version, about)]
struct Cli {
    /// Path to a JSON file of rule groups to seed the store.
    #[arg(long, env = "RULE_GROUPS_FILE")]
    rule_groups: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler and queue worker until interrupted.
    Run,
    /// Rewrite rule property references to another media server and write
    /// the result back to the seed file.
    Migrate {
        /// Media server to migrate rule property references to.
        #[arg(long, value_enum)]
        target: TargetServer,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TargetServer {
    Plex,
    Jellyfin,
}

impl From<TargetServer> for Application {
    fn from(target: TargetServer) -> Self {
        match target {
            TargetServer::Plex => Application::Plex,
            TargetServer::Jellyfin => Application::Jellyfin,
        }
    }
}

// ── Evaluator stub ──────────────────────────────────────────────────

/// Logs each run; the real comparator lives in the media evaluation
/// service.
struct LoggingEvaluator;

#[async_trait]
impl Evaluator for LoggingEvaluator {
    async fn run(&self, rule_group_id: i64) -> Result<EvaluationReport, QueueError> {
        info!(rule_group_id, "evaluating rule group");
        Ok(EvaluationReport::default())
    }
}

// ── Wiring ──────────────────────────────────────────────────────────

fn load_seed(path: &Path) -> anyhow::Result<Vec<RuleGroup>> {
    let raw = std::fs::read_to_string(path)?;
    let groups: Vec<RuleGroup> = serde_json::from_str(&raw)?;
    info!(count = groups.len(), path = %path.display(), "loaded rule groups");
    Ok(groups)
}

struct Engine {
    groups: Arc<InMemoryRuleGroupStore>,
    bus: EventBus,
    service: Arc<RuleGroupService>,
}

fn build_engine(seed: Vec<RuleGroup>, default_cron: &str) -> Engine {
    let groups = Arc::new(InMemoryRuleGroupStore::with_groups(seed));
    let bus = EventBus::default();
    let service = Arc::new(RuleGroupService::new(
        Arc::clone(&groups) as Arc<dyn RuleGroupStore>,
        Arc::new(InMemoryExclusionStore::new()) as Arc<dyn ExclusionStore>,
        Arc::new(InMemoryCollectionService::new()) as Arc<dyn CollectionService>,
        bus.clone(),
        Settings {
            rules_handler_job_cron: default_cron.to_string(),
        },
    ));
    Engine {
        groups,
        bus,
        service,
    }
}

async fn run(engine: Engine, config: &Config) -> anyhow::Result<()> {
    let queue = Arc::new(ExecutionQueue::new());
    let locks: Arc<KeyedLock<i64>> = Arc::new(KeyedLock::new());
    let scheduler = Arc::new(RuleGroupScheduler::new(
        Arc::clone(&queue),
        Arc::clone(&engine.groups) as Arc<dyn RuleGroupStore>,
        engine.service.settings().rules_handler_job_cron,
    ));
    scheduler.bootstrap().await?;

    let mut runner_tasks = Vec::new();
    for _ in 0..config.queue.runner_count {
        let runner = QueueRunner::new(
            Arc::clone(&queue),
            Arc::clone(&locks),
            Arc::new(LoggingEvaluator) as Arc<dyn Evaluator>,
        );
        runner_tasks.push(tokio::spawn(async move { runner.run().await }));
    }

    let tick_interval = Duration::from_secs(config.scheduler.tick_interval_secs);
    let tick_scheduler = Arc::clone(&scheduler);
    let tick_task = tokio::spawn(async move { tick_scheduler.run(tick_interval).await });

    let events = engine.bus.subscribe();
    let event_scheduler = Arc::clone(&scheduler);
    let event_task = tokio::spawn(async move { event_scheduler.run_events(events).await });

    info!("custodian-worker started");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    scheduler.shutdown();
    queue.stop_processing();
    for task in runner_tasks {
        let _ = task.await;
    }
    let _ = tick_task.await;
    let _ = event_task.await;
    Ok(())
}

async fn migrate(engine: Engine, seed_path: Option<&Path>, target: Application) -> anyhow::Result<()> {
    let summary = engine.service.migrate_rule_groups(target).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if let Some(path) = seed_path {
        let groups = engine.groups.find_all().await?;
        std::fs::write(path, serde_json::to_string_pretty(&groups)?)?;
        info!(path = %path.display(), "wrote migrated rule groups");
    }
    Ok(())
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();
    let cli = Cli::parse();

    let seed = match &cli.rule_groups {
        Some(path) => load_seed(path)?,
        None => Vec::new(),
    };
    let engine = build_engine(seed, &config.scheduler.default_cron);

    match cli.command {
        Command::Run => run(engine, &config).await?,
        Command::Migrate { target } => {
            migrate(engine, cli.rule_groups.as_deref(), target.into()).await?;
        }
    }

    info!("custodian-worker exited cleanly");
    Ok(())
}
