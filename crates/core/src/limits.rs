//! Size limits for atomic commits
//!
//! Two sets of ceilings live here:
//!
//! - `StoreLimits`: what a native commit of the underlying store accepts.
//!   Exceeding them is a store-level error.
//! - `BatchLimits`: the ceilings a batched atomic operation folds against
//!   before it flushes a native commit. The defaults sit deliberately below
//!   the store limits to absorb size-estimation error.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ceilings used by the batched atomic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
    /// Maximum checks per native commit (default: 99)
    #[serde(default = "default_max_checks")]
    pub max_checks: usize,

    /// Maximum mutations per native commit (default: 999)
    #[serde(default = "default_max_mutations")]
    pub max_mutations: usize,

    /// Maximum estimated payload bytes per native commit (default: 750,000)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Maximum estimated key bytes per native commit (default: 75,000)
    #[serde(default = "default_max_key_bytes")]
    pub max_key_bytes: usize,
}

fn default_max_checks() -> usize {
    99
}

fn default_max_mutations() -> usize {
    999
}

fn default_max_bytes() -> usize {
    750_000
}

fn default_max_key_bytes() -> usize {
    75_000
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_checks: default_max_checks(),
            max_mutations: default_max_mutations(),
            max_bytes: default_max_bytes(),
            max_key_bytes: default_max_key_bytes(),
        }
    }
}

impl BatchLimits {
    /// Reject ceilings that could never admit a single operation
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("max_checks", self.max_checks),
            ("max_mutations", self.max_mutations),
            ("max_bytes", self.max_bytes),
            ("max_key_bytes", self.max_key_bytes),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(Error::Configuration(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Native per-commit limits of the reference store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Maximum checks per commit (default: 100)
    pub max_checks: usize,
    /// Maximum mutations (including enqueues) per commit (default: 1000)
    pub max_mutations: usize,
    /// Maximum total encoded mutation size per commit (default: 800 KiB)
    pub max_total_mutation_bytes: usize,
    /// Maximum total encoded key size per commit (default: 80 KiB)
    pub max_total_key_bytes: usize,
    /// Maximum encoded size of a single value (default: 64 KiB)
    pub max_value_bytes: usize,
    /// Maximum encoded size of a single key (default: 2 KiB)
    pub max_key_bytes: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        StoreLimits {
            max_checks: 100,
            max_mutations: 1000,
            max_total_mutation_bytes: 800 * 1024,
            max_total_key_bytes: 80 * 1024,
            max_value_bytes: 64 * 1024,
            max_key_bytes: 2048,
        }
    }
}

impl StoreLimits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        StoreLimits {
            max_checks: 4,
            max_mutations: 8,
            max_total_mutation_bytes: 4096,
            max_total_key_bytes: 512,
            max_value_bytes: 1024,
            max_key_bytes: 128,
        }
    }

    /// Fail with `LimitExceeded` when `actual` is above `max`
    pub fn ensure(what: &'static str, actual: usize, max: usize) -> Result<()> {
        if actual > max {
            return Err(Error::LimitExceeded { what, actual, max });
        }
        Ok(())
    }
}
