//! Configuration management for drainpool
//!
//! Settings are layered with figment: embedded defaults, user and project
//! config files (TOML, JSON or YAML), `DRAINPOOL_` environment variables and
//! finally CLI flags.

use crate::pool::ProgressMode;
use anyhow::Result;
use serde::{Deserialize, Serialize};

mod core;
mod smart_load;

pub use self::core::{DEFAULT_CONFIG, ENV_PREFIX};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrainpoolConfig {
    pub pool: PoolConfig,
    pub progress: ProgressConfig,
    pub demo: DemoConfig,
}

/// Worker pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of workers (0 = derive from CPU cores)
    pub workers: usize,

    /// Percentage of CPU cores used when `workers` is 0
    pub thread_percentage: u8,

    /// Negative = unbounded, 0 = rendezvous, positive = bounded capacity
    pub queue_capacity: i64,
}

/// Progress reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressConfig {
    pub mode: ProgressMode,

    /// Log a line every N processed items
    pub log_every: usize,
}

/// Workload generated by `drainpool run`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoConfig {
    pub items: usize,

    /// Simulated work per item, in milliseconds
    pub delay_ms: u64,

    /// Every Nth item fails (0 = never)
    pub fail_every: usize,
}

impl PoolConfig {
    /// Worker count after resolving `workers = 0` against the CPU count
    ///
    /// ```text
    /// workers > 0  → workers
    /// workers == 0 → max(1, cores * thread_percentage / 100)
    /// ```
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        let available_cores = num_cpus::get();
        std::cmp::max(1, (available_cores * self.thread_percentage as usize) / 100)
    }

    /// `None` means unbounded
    pub fn capacity(&self) -> Option<usize> {
        usize::try_from(self.queue_capacity).ok()
    }
}

impl DrainpoolConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.pool.thread_percentage == 0 || self.pool.thread_percentage > 100 {
            anyhow::bail!(
                "pool.thread_percentage must be between 1 and 100, got {}",
                self.pool.thread_percentage
            );
        }

        if self.progress.log_every == 0 {
            anyhow::bail!("progress.log_every cannot be 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Format, Toml};

    fn pool(workers: usize, thread_percentage: u8) -> PoolConfig {
        PoolConfig {
            workers,
            thread_percentage,
            queue_capacity: -1,
        }
    }

    #[test]
    fn test_effective_workers_prefers_explicit_count() {
        assert_eq!(pool(12, 75).effective_workers(), 12);
    }

    #[test]
    fn test_effective_workers_from_cores() {
        let workers = pool(0, 50).effective_workers();
        assert!(workers >= 1);
        assert!(workers <= num_cpus::get());
    }

    #[test]
    fn test_capacity() {
        let mut config = pool(1, 75);
        assert_eq!(config.capacity(), None);
        config.queue_capacity = 0;
        assert_eq!(config.capacity(), Some(0));
        config.queue_capacity = 16;
        assert_eq!(config.capacity(), Some(16));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));
        let mut config = DrainpoolConfig::from_figment(figment).unwrap();
        assert!(config.validate().is_ok());

        config.pool.thread_percentage = 0;
        assert!(config.validate().is_err());

        config.pool.thread_percentage = 75;
        config.progress.log_every = 0;
        assert!(config.validate().is_err());
    }
}
