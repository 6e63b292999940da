//! Scheduler selector and kind-specific parameters.
//!
//! [`SchedulerConfig`] deserializes from the `[scheduler]` table of a run
//! configuration, tagged by `scheduler_type`. An unrecognised tag is a parse
//! error; there is no fallback policy.

use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The registered policy families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerKind {
    Random,
    RoundRobin,
    Lor,
    LorBatched,
    InputBalance,
    OutputBalance,
    CombinedBalanced,
}

impl SchedulerKind {
    pub const ALL: [SchedulerKind; 7] = [
        SchedulerKind::Random,
        SchedulerKind::RoundRobin,
        SchedulerKind::Lor,
        SchedulerKind::LorBatched,
        SchedulerKind::InputBalance,
        SchedulerKind::OutputBalance,
        SchedulerKind::CombinedBalanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Random => "random",
            SchedulerKind::RoundRobin => "round_robin",
            SchedulerKind::Lor => "lor",
            SchedulerKind::LorBatched => "lor_batched",
            SchedulerKind::InputBalance => "input_balance",
            SchedulerKind::OutputBalance => "output_balance",
            SchedulerKind::CombinedBalanced => "combined_balanced",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulerKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SchedulerKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SchedulerError::UnknownKind(s.to_string()))
    }
}

/// Default bin size used when `lor_batched` is selected by name only.
pub const DEFAULT_MAX_BIN_SIZE: u32 = 4;
/// Default binning timeout (seconds) used when `lor_batched` is selected by name only.
pub const DEFAULT_BINNING_TIMEOUT: f64 = 0.5;

/// Policy selector plus the parameters that policy needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheduler_type", rename_all = "snake_case")]
pub enum SchedulerConfig {
    Random,
    RoundRobin,
    Lor,
    LorBatched {
        /// Requests placed on one replica before re-selection.
        max_bin_size: u32,
        /// Arrival-time span (seconds) after which a bin closes.
        binning_timeout: f64,
    },
    InputBalance,
    OutputBalance,
    CombinedBalanced {
        /// Weight on input (prefill) tokens.
        alpha: f64,
        /// Weight on output (decode) tokens.
        beta: f64,
    },
}

impl SchedulerConfig {
    pub fn kind(&self) -> SchedulerKind {
        match self {
            SchedulerConfig::Random => SchedulerKind::Random,
            SchedulerConfig::RoundRobin => SchedulerKind::RoundRobin,
            SchedulerConfig::Lor => SchedulerKind::Lor,
            SchedulerConfig::LorBatched { .. } => SchedulerKind::LorBatched,
            SchedulerConfig::InputBalance => SchedulerKind::InputBalance,
            SchedulerConfig::OutputBalance => SchedulerKind::OutputBalance,
            SchedulerConfig::CombinedBalanced { .. } => SchedulerKind::CombinedBalanced,
        }
    }

    /// Configuration for `kind` with default parameters.
    pub fn with_defaults(kind: SchedulerKind) -> Self {
        match kind {
            SchedulerKind::Random => SchedulerConfig::Random,
            SchedulerKind::RoundRobin => SchedulerConfig::RoundRobin,
            SchedulerKind::Lor => SchedulerConfig::Lor,
            SchedulerKind::LorBatched => SchedulerConfig::LorBatched {
                max_bin_size: DEFAULT_MAX_BIN_SIZE,
                binning_timeout: DEFAULT_BINNING_TIMEOUT,
            },
            SchedulerKind::InputBalance => SchedulerConfig::InputBalance,
            SchedulerKind::OutputBalance => SchedulerConfig::OutputBalance,
            SchedulerKind::CombinedBalanced => SchedulerConfig::CombinedBalanced {
                alpha: 1.0,
                beta: 1.0,
            },
        }
    }

    /// Reject parameters outside their documented ranges.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match *self {
            SchedulerConfig::LorBatched {
                max_bin_size,
                binning_timeout,
            } => {
                if max_bin_size == 0 {
                    return Err(invalid("lor_batched", "max_bin_size", "must be > 0"));
                }
                if !(binning_timeout.is_finite() && binning_timeout > 0.0) {
                    return Err(invalid(
                        "lor_batched",
                        "binning_timeout",
                        format!("must be a finite value > 0, got {}", binning_timeout),
                    ));
                }
                Ok(())
            }
            SchedulerConfig::CombinedBalanced { alpha, beta } => {
                for (name, value) in [("alpha", alpha), ("beta", beta)] {
                    if !(value.is_finite() && value >= 0.0) {
                        return Err(invalid(
                            "combined_balanced",
                            name,
                            format!("must be a finite value >= 0, got {}", value),
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn invalid(scheduler: &'static str, name: &'static str, reason: impl Into<String>) -> SchedulerError {
    SchedulerError::InvalidParameter {
        scheduler,
        name,
        reason: reason.into(),
    }
}
