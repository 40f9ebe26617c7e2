use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use crate::build::block::Block;
use crate::domain::MediaSpec;
use crate::error::{PlanError, Result};
use crate::redundancy::BlockParity;

pub mod layout;
pub mod pool;

use layout::{MediaLayout, layout_media};

/// Pools at least this large score candidates on the rayon pool.
const PAR_SCAN_MIN_MEDIA: usize = 256;

/// Set from another thread to stop planning between block placements.
pub type AbortFlag = Arc<AtomicBool>;

/// Capacity counters for the pool. Only the placement loop writes to it;
/// candidate scans take a shared borrow.
struct MediaLedger<'a> {
    pool: &'a [MediaSpec],
    used: Vec<u64>,
    holds: Vec<BTreeSet<usize>>,
    placed: Vec<Vec<(usize, u32)>>,
}

impl<'a> MediaLedger<'a> {
    fn new(pool: &'a [MediaSpec]) -> Self {
        Self {
            pool,
            used: vec![0; pool.len()],
            holds: vec![BTreeSet::new(); pool.len()],
            placed: vec![Vec::new(); pool.len()],
        }
    }

    fn free(&self, m: usize) -> u64 {
        self.pool[m].usable().saturating_sub(self.used[m])
    }

    fn eligible(&self, m: usize, block: usize, need: u64) -> bool {
        !self.holds[m].contains(&block) && self.free(m) >= need
    }

    /// Medium with the least room left after taking `need`; ties go to pool order.
    fn best_fit(&self, block: usize, need: u64) -> Option<usize> {
        let score = |m: usize| (self.free(m) - need, m);
        if self.pool.len() >= PAR_SCAN_MIN_MEDIA {
            (0..self.pool.len())
                .into_par_iter()
                .filter(|&m| self.eligible(m, block, need))
                .min_by_key(|&m| score(m))
        } else {
            (0..self.pool.len())
                .filter(|&m| self.eligible(m, block, need))
                .min_by_key(|&m| score(m))
        }
    }

    fn largest_free_without(&self, block: usize) -> u64 {
        (0..self.pool.len())
            .filter(|&m| !self.holds[m].contains(&block))
            .map(|m| self.free(m))
            .max()
            .unwrap_or(0)
    }

    fn place(&mut self, m: usize, block: usize, copy: u32, bytes: u64) {
        self.used[m] += bytes;
        self.holds[m].insert(block);
        self.placed[m].push((block, copy));
    }
}

#[derive(Clone, Debug)]
pub struct Allocation {
    /// Per block index: the media id holding each copy, by copy index.
    pub copies: Vec<Vec<String>>,
    /// Every medium of the pool, in pool order; unused ones are empty.
    pub media: Vec<MediaLayout>,
}

pub struct MediaAllocator<'a> {
    pool: &'a [MediaSpec],
    copies: u32,
    abort: Option<AbortFlag>,
}

impl<'a> MediaAllocator<'a> {
    pub fn new(pool: &'a [MediaSpec], copies: u32) -> Self {
        Self {
            pool,
            copies,
            abort: None,
        }
    }

    pub fn with_abort(mut self, flag: AbortFlag) -> Self {
        self.abort = Some(flag);
        self
    }

    /// Best-fit decreasing over blocks. Each copy travels as one unit with
    /// the parity it hosts, so every copy lands on a distinct medium and no
    /// spread share ever shares a medium with the copy it protects.
    pub fn allocate(&self, blocks: &[Block], parity: &[BlockParity]) -> Result<Allocation> {
        pool::check_pool(self.pool)?;
        if blocks.len() != parity.len() {
            return Err(PlanError::Format(format!(
                "{} blocks but {} parity entries",
                blocks.len(),
                parity.len()
            )));
        }
        for (i, (b, p)) in blocks.iter().zip(parity).enumerate() {
            if b.index != i || p.block != i || p.block_size != b.size {
                return Err(PlanError::Format(format!(
                    "block {i} out of sequence with its parity entry"
                )));
            }
        }

        let mut order: Vec<usize> = (0..blocks.len()).collect();
        order.sort_by(|&a, &b| blocks[b].size.cmp(&blocks[a].size).then(a.cmp(&b)));

        let mut ledger = MediaLedger::new(self.pool);
        let mut copies: Vec<Vec<String>> = vec![Vec::new(); blocks.len()];

        for b in order {
            if let Some(flag) = &self.abort {
                if flag.load(Ordering::Relaxed) {
                    return Err(PlanError::Aborted);
                }
            }
            for copy in 0..self.copies {
                let need = parity[b].unit_bytes(copy);
                let Some(m) = ledger.best_fit(b, need) else {
                    return Err(PlanError::CapacityExceeded {
                        block: b,
                        copy,
                        needed: need,
                        largest_free: ledger.largest_free_without(b),
                    });
                };
                ledger.place(m, b, copy, need);
                copies[b].push(self.pool[m].media_id.clone());
                debug!(block = b, copy, media = %self.pool[m].media_id, bytes = need, "copy placed");
            }
        }

        let media: Vec<MediaLayout> = self
            .pool
            .iter()
            .zip(&ledger.placed)
            .map(|(spec, placed)| layout_media(spec, placed, parity))
            .collect();
        let used = media.iter().filter(|m| !m.is_empty()).count();
        info!(blocks = blocks.len(), media_used = used, pool = self.pool.len(), "media allocated");

        Ok(Allocation { copies, media })
    }
}
