use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PlanError, Result};
use crate::util::size::{ByteSize, GIB, MIB};

/// Standard block sizes, each slightly under a power of two in MiB so that
/// a block plus its parity still fits the next container size up.
pub const STANDARD_RUNGS_MIB: [u64; 10] = [15, 29, 58, 116, 232, 465, 930, 1860, 3720, 7440];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RungWindow {
    pub rung: u64,
    pub lo: u64,
    pub hi: u64,
}

impl RungWindow {
    pub fn contains(&self, total: u64) -> bool {
        self.lo <= total && total <= self.hi
    }
}

/// Discrete, ascending set of target block sizes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u64>", into = "Vec<u64>")]
pub struct SizeLadder {
    rungs: Vec<u64>,
}

impl SizeLadder {
    pub fn new(mut rungs: Vec<u64>) -> Result<Self> {
        rungs.sort_unstable();
        rungs.dedup();
        if rungs.is_empty() {
            return Err(PlanError::Format("size ladder has no rungs".into()));
        }
        if rungs[0] == 0 {
            return Err(PlanError::Format("size ladder rung of 0 bytes".into()));
        }
        Ok(Self { rungs })
    }

    /// 15 MiB … 14.9 GiB.
    pub fn standard() -> Self {
        let mut rungs: Vec<u64> = STANDARD_RUNGS_MIB.iter().map(|m| m * MIB).collect();
        rungs.push((14.9 * GIB as f64) as u64);
        Self { rungs }
    }

    pub fn load(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum LadderFile {
            Wrapped { rungs: Vec<ByteSize> },
            Bare(Vec<ByteSize>),
        }
        let text = fs::read_to_string(path)?;
        let rungs = match serde_json::from_str::<LadderFile>(&text)? {
            LadderFile::Wrapped { rungs } | LadderFile::Bare(rungs) => rungs,
        };
        Self::new(rungs.into_iter().map(|r| r.0).collect())
    }

    pub fn rungs(&self) -> &[u64] {
        &self.rungs
    }

    pub fn largest(&self) -> u64 {
        self.rungs[self.rungs.len() - 1]
    }

    pub fn window(&self, rung: u64, tolerance: f64) -> RungWindow {
        let slack = (rung as f64 * tolerance).floor() as u64;
        RungWindow {
            rung,
            lo: rung.saturating_sub(slack),
            hi: rung.saturating_add(slack),
        }
    }

    pub fn windows(&self, tolerance: f64) -> impl Iterator<Item = RungWindow> + '_ {
        self.rungs.iter().map(move |&r| self.window(r, tolerance))
    }

    /// Largest rung whose window contains `total`.
    pub fn fit(&self, total: u64, tolerance: f64) -> Option<u64> {
        self.windows(tolerance)
            .filter(|w| w.contains(total))
            .map(|w| w.rung)
            .last()
    }

    /// Target for a block opened with `remaining` bytes still to place:
    /// the smallest rung that can hold all of it, else the largest rung.
    pub fn target_for(&self, remaining: u64, tolerance: f64) -> RungWindow {
        self.windows(tolerance)
            .find(|w| w.hi >= remaining)
            .unwrap_or_else(|| self.window(self.largest(), tolerance))
    }

    /// Upper bound beyond which a single pack cannot land on any rung.
    pub fn ceiling(&self, tolerance: f64) -> u64 {
        self.window(self.largest(), tolerance).hi
    }
}

impl TryFrom<Vec<u64>> for SizeLadder {
    type Error = PlanError;
    fn try_from(rungs: Vec<u64>) -> Result<Self> {
        Self::new(rungs)
    }
}

impl From<SizeLadder> for Vec<u64> {
    fn from(l: SizeLadder) -> Self {
        l.rungs
    }
}
