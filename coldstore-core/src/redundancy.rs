use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::build::block::Block;
use crate::error::Result;
use crate::policy::RedundancyPolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Stored next to the copy it protects.
    Local,
    /// Stored on another copy's medium.
    Spread,
}

/// `(block, protects_copy, host_copy)`; unique within a plan.
pub type ShareKey = (usize, u32, u32);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParityShare {
    pub block: usize,
    pub protects_copy: u32,
    pub host_copy: u32,
    pub placement: Placement,
    /// Redundancy this share carries, as percent of the block size.
    pub percent: f64,
    pub bytes: u64,
}

impl ParityShare {
    pub fn key(&self) -> ShareKey {
        (self.block, self.protects_copy, self.host_copy)
    }
}

/// Parameters handed to the external parity codec for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecParams {
    pub source_bytes: u64,
    pub recovery_percent: u64,
    pub recovery_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockParity {
    pub block: usize,
    pub block_size: u64,
    pub shares: Vec<ParityShare>,
    pub codec: CodecParams,
}

impl BlockParity {
    pub fn hosted_by(&self, copy: u32) -> impl Iterator<Item = &ParityShare> {
        self.shares.iter().filter(move |s| s.host_copy == copy)
    }

    /// Bytes one copy occupies on its medium: the block plus every share it hosts.
    /// Saturates, so a unit too large to count never fits a medium.
    pub fn unit_bytes(&self, copy: u32) -> u64 {
        self.hosted_by(copy)
            .fold(self.block_size, |acc, s| acc.saturating_add(s.bytes))
    }
}

pub struct RedundancyPlanner {
    policy: RedundancyPolicy,
}

impl RedundancyPlanner {
    pub fn new(policy: RedundancyPolicy) -> Result<Self> {
        policy.check()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &RedundancyPolicy {
        &self.policy
    }

    pub fn plan(&self, blocks: &[Block]) -> Vec<BlockParity> {
        // per-block sizing is independent; collect keeps block order
        let out: Vec<BlockParity> = blocks
            .par_iter()
            .map(|b| self.plan_block(b.index, b.size))
            .collect();
        let parity = out.iter().fold(0u64, |acc, p| acc.saturating_add(p.codec.recovery_bytes));
        let parity: u64 = out.iter().map(|p| p.codec.recovery_bytes).sum();
        info!(
            blocks = out.len(),
            parity_bytes = parity,
            percent = self.policy.percent,
            copies = self.policy.copies,
            "redundancy planned"
        );
        out
    }

    pub fn plan_block(&self, block: usize, size: u64) -> BlockParity {
        let x = self.policy.percent;
        let y = self.policy.copies;
        let local = ceil_percent(size, x);
        let mut shares = Vec::with_capacity(y as usize * y as usize);

        for i in 0..y {
            shares.push(ParityShare {
                block,
                protects_copy: i,
                host_copy: i,
                placement: Placement::Local,
                percent: x as f64,
                bytes: local,
            });
            if !self.policy.spread {
                continue;
            }
            // the copy's spread total equals its local share, split over the others
            let others = (y - 1) as u64;
            let base = local / others;
            let mut extra = local % others;
            for j in (0..y).filter(|&j| j != i) {
                let bytes = base + u64::from(extra > 0);
                extra = extra.saturating_sub(1);
                shares.push(ParityShare {
                    block,
                    protects_copy: i,
                    host_copy: j,
                    placement: Placement::Spread,
                    percent: x as f64 / others as f64,
                    bytes,
                });
            }
        }

        let recovery_bytes = shares.iter().fold(0u64, |acc, s| acc.saturating_add(s.bytes));
        BlockParity {
            block,
            block_size: size,
            shares,
            codec: CodecParams {
                source_bytes: size,
                recovery_percent: self.policy.total_percent(),
                recovery_bytes,
            },
        }
    }
}

/// `⌈size · pct / 100⌉` without overflow.
pub fn ceil_percent(size: u64, pct: u32) -> u64 {
    let num = size as u128 * pct as u128;
    num.div_ceil(100) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanError;
    use crate::testutil::{block, MIB};

    #[test]
    fn five_percent_three_copies_is_thirty_percent() {
        let planner = RedundancyPlanner::new(RedundancyPolicy::new(5, 3)).unwrap();
        let bp = planner.plan_block(0, 1000 * MIB);

        let total: u64 = bp.shares.iter().map(|s| s.bytes).sum();
        assert_eq!(total, 300 * MIB);
        assert_eq!(bp.codec.recovery_percent, 30);
        assert_eq!(bp.codec.recovery_bytes, 300 * MIB);

        let locals = bp.shares.iter().filter(|s| s.placement == Placement::Local).count();
        let spreads = bp.shares.iter().filter(|s| s.placement == Placement::Spread).count();
        assert_eq!(locals, 3);
        assert_eq!(spreads, 3 * 2);

        for copy in 0..3 {
            // 5% local + 2 x 2.5% received from the other copies
            let hosted: Vec<&ParityShare> = bp.hosted_by(copy).collect();
            assert_eq!(hosted.len(), 3);
            let bytes: u64 = hosted.iter().map(|s| s.bytes).sum();
            assert_eq!(bytes, 100 * MIB);
            assert_eq!(bp.unit_bytes(copy), 1100 * MIB);

            // each copy emits 5% local + 5% spread in total
            let emitted: u64 = bp
                .shares
                .iter()
                .filter(|s| s.protects_copy == copy)
                .map(|s| s.bytes)
                .sum();
            assert_eq!(emitted, 100 * MIB);
        }
    }

    #[test]
    fn spread_never_hosted_by_protected_copy() {
        let planner = RedundancyPlanner::new(RedundancyPolicy::new(7, 4)).unwrap();
        let bp = planner.plan_block(3, 12_345_679);
        for s in &bp.shares {
            match s.placement {
                Placement::Local => assert_eq!(s.host_copy, s.protects_copy),
                Placement::Spread => assert_ne!(s.host_copy, s.protects_copy),
            }
        }
        let mut keys: Vec<ShareKey> = bp.shares.iter().map(ParityShare::key).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), bp.shares.len());
    }

    #[test]
    fn uneven_spread_keeps_copy_total_equal_to_local() {
        // local = ceil(101 * 5 / 100) = 6, split over 4 hosts: 2,2,1,1
        let planner = RedundancyPlanner::new(RedundancyPolicy::new(5, 5)).unwrap();
        let bp = planner.plan_block(0, 101);
        let spread: Vec<u64> = bp
            .shares
            .iter()
            .filter(|s| s.protects_copy == 0 && s.placement == Placement::Spread)
            .map(|s| s.bytes)
            .collect();
        assert_eq!(spread, vec![2, 2, 1, 1]);
    }

    #[test]
    fn local_only_when_spread_disabled() {
        let policy = RedundancyPolicy {
            spread: false,
            ..RedundancyPolicy::new(10, 1)
        };
        let planner = RedundancyPlanner::new(policy).unwrap();
        let bp = planner.plan_block(0, 1000);
        assert_eq!(bp.shares.len(), 1);
        assert_eq!(bp.codec.recovery_bytes, 100);
        assert_eq!(bp.codec.recovery_percent, 10);
    }

    #[test]
    fn rejects_single_copy_spread() {
        let err = RedundancyPlanner::new(RedundancyPolicy::new(5, 1)).err().unwrap();
        assert!(matches!(err, PlanError::InvalidRedundancyConfig(_)));
    }

    #[test]
    fn plan_preserves_block_order() {
        let planner = RedundancyPlanner::new(RedundancyPolicy::new(5, 2)).unwrap();
        let blocks: Vec<_> = (0..64).map(|i| block(i, (i as u64 + 1) * 1000)).collect();
        let parity = planner.plan(&blocks);
        for (i, p) in parity.iter().enumerate() {
            assert_eq!(p.block, i);
            assert_eq!(p.block_size, (i as u64 + 1) * 1000);
        }
    }
}
