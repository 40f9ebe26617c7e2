use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::ladder::SizeLadder;

/// What to do with a single pack larger than the top rung's window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    #[default]
    Fail,
    Custom,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildPolicy {
    pub ladder: SizeLadder,
    /// Fraction, e.g. 0.03 for ±3% around each rung.
    pub tolerance: f64,
    /// Max packs held back while later packs are tried in the current block.
    #[serde(default = "default_window")]
    pub reorder_window: usize,
    #[serde(default)]
    pub oversize: OversizePolicy,
    /// Close the current block whenever the group label changes.
    #[serde(default)]
    pub split_at_groups: bool,
}

fn default_window() -> usize {
    5
}

impl Default for BuildPolicy {
    fn default() -> Self {
        Self {
            ladder: SizeLadder::standard(),
            tolerance: 0.03,
            reorder_window: default_window(),
            oversize: OversizePolicy::Fail,
            split_at_groups: false,
        }
    }
}

impl BuildPolicy {
    pub fn check(&self) -> Result<()> {
        if !self.tolerance.is_finite() || !(0.0..0.5).contains(&self.tolerance) {
            return Err(PlanError::Format(format!(
                "size tolerance must be within [0, 0.5), got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedundancyPolicy {
    /// `x`: parity percent per copy.
    pub percent: u32,
    /// `y`: number of media copies of each block.
    pub copies: u32,
    /// Also place `spread` shares on the other copies' media.
    #[serde(default = "default_spread")]
    pub spread: bool,
}

fn default_spread() -> bool {
    true
}

/// Upper bound on `copies`; each block carries `copies²` shares.
pub const MAX_COPIES: u32 = 64;

impl RedundancyPolicy {
    pub fn new(percent: u32, copies: u32) -> Self {
        Self {
            percent,
            copies,
            spread: true,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.percent == 0 || self.percent > 100 {
            return Err(PlanError::InvalidRedundancyConfig(format!(
                "redundancy percent must be in 1..=100, got {}",
                self.percent
            )));
        }
        if self.copies == 0 {
            return Err(PlanError::InvalidRedundancyConfig(
                "copy count must be positive".into(),
            ));
        }
        if self.copies > MAX_COPIES {
            return Err(PlanError::InvalidRedundancyConfig(format!(
                "copy count {} exceeds the limit of {MAX_COPIES}",
                self.copies
            )));
        }
        if self.spread && self.copies < 2 {
            return Err(PlanError::InvalidRedundancyConfig(format!(
                "spread placement needs at least 2 copies, got {}",
                self.copies
            )));
        }
        Ok(())
    }

    /// Total parity generated per block, in percent of the block size.
    pub fn total_percent(&self) -> u64 {
        let per_copy = if self.spread { 2 } else { 1 };
        u64::from(self.percent) * u64::from(self.copies) * per_copy
    }
}
