use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            scheduler: SchedulerConfig::from_env(),
            queue: QueueConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  scheduler: default_cron={}, tick_interval={}s",
            self.scheduler.default_cron,
            self.scheduler.tick_interval_secs
        );
        tracing::info!("  queue:     runners={}", self.queue.runner_count);
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Default cron expression driving rule groups without a dedicated
    /// schedule. Stored as the `rules_handler_job_cron` setting.
    pub default_cron: String,
    /// Seconds between scheduler ticks.
    pub tick_interval_secs: u64,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            default_cron: env_or("RULES_HANDLER_JOB_CRON", "0 0 */8 * * *"),
            tick_interval_secs: env_u64("SCHEDULER_TICK_INTERVAL_SECS", 1),
        }
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of concurrent drain-loop workers.
    pub runner_count: usize,
}

impl QueueConfig {
    fn from_env() -> Self {
        Self {
            runner_count: env_usize("QUEUE_RUNNER_COUNT", 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        // Run under a key nothing else sets.
        let config = Config::from_env();
        assert_eq!(config.scheduler.tick_interval_secs, 1);
        assert!(!config.scheduler.default_cron.is_empty());
        assert_eq!(config.queue.runner_count, 1);
    }
}
