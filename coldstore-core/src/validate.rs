use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::info;

use crate::allocate::layout::{ExtentContent, MediaLayout};
use crate::build::block::{Block, BlockRung, CustomReason};
use crate::catalog::PackCatalog;
use crate::container::manifest::Plan;
use crate::error::{PlanError, Result};
use crate::ladder::SizeLadder;
use crate::redundancy::{ParityShare, Placement, RedundancyPlanner, ShareKey};

/// First broken invariant found in a plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("block at position {position} carries index {index}")]
    BlockOutOfSequence { position: usize, index: usize },

    #[error("block {block}: recorded size {recorded}, packs sum to {actual}")]
    BlockSizeMismatch {
        block: usize,
        recorded: u64,
        actual: u64,
    },

    #[error("block {block}: pack {pack_id} recorded size {recorded}, entries sum to {actual}")]
    PackSizeMismatch {
        block: usize,
        pack_id: String,
        recorded: u64,
        actual: u64,
    },

    #[error("block {block}: sizes overflow a 64-bit total")]
    SizeOverflow { block: usize },

    #[error("block {block}: size {size} is outside the window of rung {rung}")]
    OffLadder { block: usize, size: u64, rung: u64 },

    #[error("block {block}: oversized block holds {packs} packs")]
    OversizedNotSingle { block: usize, packs: usize },

    #[error("block {block}: pack {pack_id} is not in the catalog")]
    UnknownPack { block: usize, pack_id: String },

    #[error("pack {0} is in no block")]
    PackMissing(String),

    #[error("pack {pack_id} is in blocks {first} and {second} without a split override on every entry")]
    PackRepeated {
        pack_id: String,
        first: usize,
        second: usize,
    },

    #[error("entry {entry_id} is in blocks {first} and {second} without a split override")]
    EntrySplit {
        entry_id: String,
        first: usize,
        second: usize,
    },

    #[error("block {block}: parity entry does not describe this block")]
    ParityMismatch { block: usize },

    #[error("block {block}: parity share {protects_copy}->{host_copy} missing")]
    ShareMissing {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
    },

    #[error("block {block}: unexpected parity share {protects_copy}->{host_copy}")]
    ShareUnexpected {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
    },

    #[error("block {block}: parity share {protects_copy}->{host_copy} listed {count} times")]
    ShareRepeated {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
        count: usize,
    },

    #[error("block {block}: parity share {protects_copy}->{host_copy} has the wrong size or placement")]
    ShareMismatch {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
    },

    #[error("recorded redundancy settings are invalid: {0}")]
    InvalidRedundancy(String),

    #[error("block {block}: codec parameters disagree with its shares")]
    CodecMismatch { block: usize },

    #[error("block {block}: {actual} copies assigned, {expected} required")]
    CopyCount {
        block: usize,
        expected: u32,
        actual: usize,
    },

    #[error("block {block}: two copies on media {media}")]
    CopiesShareMedia { block: usize, media: String },

    #[error("unknown media {0}")]
    UnknownMedia(String),

    #[error("media {0} listed twice")]
    DuplicateMedia(String),

    #[error("block {block} copy {copy}: laid out {count} times")]
    CopyPlacement {
        block: usize,
        copy: u32,
        count: usize,
    },

    #[error("block {block} copy {copy}: laid out on {media}, assigned to {assigned}")]
    CopyMisplaced {
        block: usize,
        copy: u32,
        media: String,
        assigned: String,
    },

    #[error("block {block}: local share of copy {copy} sits on {media}, away from its copy")]
    LocalShareDetached {
        block: usize,
        copy: u32,
        media: String,
    },

    #[error("block {block}: spread share protecting copy {copy} sits on that copy's media {media}")]
    SpreadShareColocated {
        block: usize,
        copy: u32,
        media: String,
    },

    #[error("block {block}: parity share {protects_copy}->{host_copy} laid out on {media}, host copy is on {assigned}")]
    ShareMisplaced {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
        media: String,
        assigned: String,
    },

    #[error("media {media}: extent of block {block} is {actual} bytes, expected {expected}")]
    ExtentLength {
        media: String,
        block: usize,
        expected: u64,
        actual: u64,
    },

    #[error("media {media}: {used} bytes exceed usable {usable}")]
    CapacityOverrun { media: String, used: u64, usable: u64 },

    #[error("media {media}: extent {offset}+{len} runs past usable {usable}")]
    ExtentOutOfBounds {
        media: String,
        offset: u64,
        len: u64,
        usable: u64,
    },

    #[error("media {media}: extent at {offset} overlaps the one ending at {prev_end}")]
    ExtentOverlap {
        media: String,
        offset: u64,
        prev_end: u64,
    },

    #[error("media {media}: recorded usage {recorded}, extents cover {actual}")]
    UsageMismatch {
        media: String,
        recorded: u64,
        actual: u64,
    },
}

type Checked = std::result::Result<(), Violation>;

fn checked_sum(mut sizes: impl Iterator<Item = u64>) -> Option<u64> {
    sizes.try_fold(0u64, u64::checked_add)
}

/// Closed-world checks over block plans and media plans. With a catalog
/// attached, block checks also demand that every catalog pack is placed.
#[derive(Default)]
pub struct PlanValidator<'a> {
    catalog: Option<&'a PackCatalog>,
}

impl<'a> PlanValidator<'a> {
    pub fn new() -> Self {
        Self { catalog: None }
    }

    pub fn with_catalog(catalog: &'a PackCatalog) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    pub fn validate_blocks(&self, ladder: &SizeLadder, tolerance: f64, blocks: &[Block]) -> Result<()> {
        let refs: Vec<&Block> = blocks.iter().collect();
        check_blocks(ladder, tolerance, &refs, self.catalog)?;
        Ok(())
    }

    /// Returns the plan unchanged when every invariant holds.
    pub fn validate(&self, plan: Plan) -> Result<Plan> {
        let refs: Vec<&Block> = plan.blocks.iter().map(|pb| &pb.block).collect();
        check_blocks(&plan.ladder, plan.tolerance, &refs, self.catalog)?;
        check_assignments(&plan)?;
        check_media(&plan.media)?;
        check_layout(&plan)?;
        info!(
            blocks = plan.blocks.len(),
            media = plan.media.len(),
            "plan validated"
        );
        Ok(plan)
    }
}

fn check_blocks(
    ladder: &SizeLadder,
    tolerance: f64,
    blocks: &[&Block],
    catalog: Option<&PackCatalog>,
) -> Checked {
    let mut pack_seen: HashMap<&str, usize> = HashMap::new();
    let mut entry_seen: HashMap<&str, usize> = HashMap::new();

    for (pos, b) in blocks.iter().enumerate() {
        if b.index != pos {
            return Err(Violation::BlockOutOfSequence {
                position: pos,
                index: b.index,
            });
        }
        let actual = checked_sum(b.packs.iter().map(|p| p.size))
            .ok_or(Violation::SizeOverflow { block: b.index })?;
        if actual != b.size {
            return Err(Violation::BlockSizeMismatch {
                block: b.index,
                recorded: b.size,
                actual,
            });
        }
        match b.rung {
            BlockRung::Ladder { rung } => {
                if !ladder.rungs().contains(&rung) || !ladder.window(rung, tolerance).contains(b.size) {
                    return Err(Violation::OffLadder {
                        block: b.index,
                        size: b.size,
                        rung,
                    });
                }
            }
            BlockRung::Custom {
                reason: CustomReason::Oversized,
            } if b.packs.len() != 1 => {
                return Err(Violation::OversizedNotSingle {
                    block: b.index,
                    packs: b.packs.len(),
                });
            }
            BlockRung::Custom { .. } => {}
        }

        for p in &b.packs {
            let entries = checked_sum(p.entries.iter().map(|e| e.size))
                .ok_or(Violation::SizeOverflow { block: b.index })?;
            if entries != p.size {
                return Err(Violation::PackSizeMismatch {
                    block: b.index,
                    pack_id: p.pack_id.clone(),
                    recorded: p.size,
                    actual: entries,
                });
            }
            if let Some(cat) = catalog {
                if cat.pack(&p.pack_id).is_none() {
                    return Err(Violation::UnknownPack {
                        block: b.index,
                        pack_id: p.pack_id.clone(),
                    });
                }
            }

            let split = !p.entries.is_empty() && p.entries.iter().all(|e| e.split_reason.is_some());
            match pack_seen.get(p.pack_id.as_str()) {
                Some(&first) if !split => {
                    return Err(Violation::PackRepeated {
                        pack_id: p.pack_id.clone(),
                        first,
                        second: b.index,
                    });
                }
                Some(_) => {}
                None => {
                    pack_seen.insert(p.pack_id.as_str(), b.index);
                }
            }

            for e in &p.entries {
                match entry_seen.get(e.id.as_str()) {
                    Some(&first) if e.split_reason.is_none() => {
                        return Err(Violation::EntrySplit {
                            entry_id: e.id.clone(),
                            first,
                            second: b.index,
                        });
                    }
                    Some(_) => {}
                    None => {
                        entry_seen.insert(e.id.as_str(), b.index);
                    }
                }
            }
        }
    }

    if let Some(cat) = catalog {
        if let Some(p) = cat.packs().iter().find(|p| !pack_seen.contains_key(p.id.as_str())) {
            return Err(Violation::PackMissing(p.id.clone()));
        }
    }
    Ok(())
}

/// Parity share sets and copy-to-media assignments, block by block.
fn check_assignments(plan: &Plan) -> Result<()> {
    let planner = RedundancyPlanner::new(plan.redundancy).map_err(|e| match e {
        PlanError::InvalidRedundancyConfig(msg) => Violation::InvalidRedundancy(msg),
        other => Violation::InvalidRedundancy(other.to_string()),
    })?;
    let copies = plan.redundancy.copies;

    let mut known: HashMap<&str, usize> = HashMap::new();
    for (i, m) in plan.media.iter().enumerate() {
        if known.insert(m.media.media_id.as_str(), i).is_some() {
            return Err(Violation::DuplicateMedia(m.media.media_id.clone()).into());
        }
    }

    for (i, pb) in plan.blocks.iter().enumerate() {
        if pb.parity.block != i || pb.parity.block_size != pb.block.size {
            return Err(Violation::ParityMismatch { block: i }.into());
        }
        let expected = planner.plan_block(i, pb.block.size);

        let mut listed: BTreeMap<ShareKey, Vec<&ParityShare>> = BTreeMap::new();
        for s in &pb.parity.shares {
            listed.entry(s.key()).or_default().push(s);
        }
        for want in &expected.shares {
            let (_, protects_copy, host_copy) = want.key();
            match listed.remove(&want.key()) {
                None => {
                    return Err(Violation::ShareMissing {
                        block: i,
                        protects_copy,
                        host_copy,
                    }
                    .into());
                }
                Some(got) if got.len() > 1 => {
                    return Err(Violation::ShareRepeated {
                        block: i,
                        protects_copy,
                        host_copy,
                        count: got.len(),
                    }
                    .into());
                }
                Some(got) => {
                    if got[0].bytes != want.bytes || got[0].placement != want.placement {
                        return Err(Violation::ShareMismatch {
                            block: i,
                            protects_copy,
                            host_copy,
                        }
                        .into());
                    }
                }
            }
        }
        if let Some(((block, protects_copy, host_copy), _)) = listed.into_iter().next() {
            return Err(Violation::ShareUnexpected {
                block,
                protects_copy,
                host_copy,
            }
            .into());
        }
        if pb.parity.codec != expected.codec {
            return Err(Violation::CodecMismatch { block: i }.into());
        }

        if pb.media.len() != copies as usize {
            return Err(Violation::CopyCount {
                block: i,
                expected: copies,
                actual: pb.media.len(),
            }
            .into());
        }
        for (c, id) in pb.media.iter().enumerate() {
            if !known.contains_key(id.as_str()) {
                return Err(Violation::UnknownMedia(id.clone()).into());
            }
            if pb.media[..c].contains(id) {
                return Err(Violation::CopiesShareMedia {
                    block: i,
                    media: id.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Per-medium capacity and extent geometry. Media are independent, so the
/// sums run in parallel; the first violation in pool order is reported.
fn check_media(media: &[MediaLayout]) -> Checked {
    let results: Vec<Checked> = media.par_iter().map(check_one_medium).collect();
    results.into_iter().collect()
}

fn check_one_medium(m: &MediaLayout) -> Checked {
    let id = &m.media.media_id;
    let usable = m.media.usable();
    // saturated coverage always exceeds usable, so overflow reports as an overrun
    let covered = m.extents.iter().fold(0u64, |acc, e| acc.saturating_add(e.len));
    if covered > usable || m.used > usable {
        return Err(Violation::CapacityOverrun {
            media: id.clone(),
            used: covered.max(m.used),
            usable,
        });
    }
    if covered != m.used {
        return Err(Violation::UsageMismatch {
            media: id.clone(),
            recorded: m.used,
            actual: covered,
        });
    }

    let mut spans: Vec<(u64, u64)> = m.extents.iter().map(|e| (e.offset, e.len)).collect();
    spans.sort_unstable();
    let mut prev_end = 0u64;
    for (offset, len) in spans {
        let end = offset.checked_add(len).filter(|&end| end <= usable);
        let Some(end) = end else {
            return Err(Violation::ExtentOutOfBounds {
                media: id.clone(),
                offset,
                len,
                usable,
            });
        };
        if offset < prev_end {
            return Err(Violation::ExtentOverlap {
                media: id.clone(),
                offset,
                prev_end,
            });
        }
        prev_end = end;
    }
    Ok(())
}

/// Every copy and every share laid out exactly once, where the assignment
/// says it lives.
fn check_layout(plan: &Plan) -> Checked {
    let mut copies_at: BTreeMap<(usize, u32), Vec<(usize, u64)>> = BTreeMap::new();
    let mut shares_at: BTreeMap<ShareKey, Vec<(usize, u64, Placement)>> = BTreeMap::new();
    for (mi, m) in plan.media.iter().enumerate() {
        for e in &m.extents {
            match e.content {
                ExtentContent::Block { block, copy } => {
                    copies_at.entry((block, copy)).or_default().push((mi, e.len));
                }
                ExtentContent::Parity {
                    block,
                    protects_copy,
                    host_copy,
                    placement,
                } => {
                    shares_at
                        .entry((block, protects_copy, host_copy))
                        .or_default()
                        .push((mi, e.len, placement));
                }
            }
        }
    }
    let media_id = |mi: usize| plan.media[mi].media.media_id.clone();

    for (i, pb) in plan.blocks.iter().enumerate() {
        for (c, assigned) in pb.media.iter().enumerate() {
            let copy = c as u32;
            let at = copies_at.remove(&(i, copy)).unwrap_or_default();
            let [(mi, len)] = at[..] else {
                return Err(Violation::CopyPlacement {
                    block: i,
                    copy,
                    count: at.len(),
                });
            };
            if plan.media[mi].media.media_id != *assigned {
                return Err(Violation::CopyMisplaced {
                    block: i,
                    copy,
                    media: media_id(mi),
                    assigned: assigned.clone(),
                });
            }
            if len != pb.block.size {
                return Err(Violation::ExtentLength {
                    media: media_id(mi),
                    block: i,
                    expected: pb.block.size,
                    actual: len,
                });
            }
        }

        for s in &pb.parity.shares {
            let at = shares_at.remove(&s.key()).unwrap_or_default();
            let [(mi, len, placement)] = at[..] else {
                return Err(if at.is_empty() {
                    Violation::ShareMissing {
                        block: i,
                        protects_copy: s.protects_copy,
                        host_copy: s.host_copy,
                    }
                } else {
                    Violation::ShareRepeated {
                        block: i,
                        protects_copy: s.protects_copy,
                        host_copy: s.host_copy,
                        count: at.len(),
                    }
                });
            };
            let on = plan.media[mi].media.media_id.as_str();
            let protected = pb.media[s.protects_copy as usize].as_str();
            let host = pb.media[s.host_copy as usize].as_str();
            if placement != s.placement {
                return Err(Violation::ShareMismatch {
                    block: i,
                    protects_copy: s.protects_copy,
                    host_copy: s.host_copy,
                });
            }
            match placement {
                Placement::Local if on != protected => {
                    return Err(Violation::LocalShareDetached {
                        block: i,
                        copy: s.protects_copy,
                        media: on.to_string(),
                    });
                }
                Placement::Spread if on == protected => {
                    return Err(Violation::SpreadShareColocated {
                        block: i,
                        copy: s.protects_copy,
                        media: on.to_string(),
                    });
                }
                _ => {}
            }
            if on != host {
                return Err(Violation::ShareMisplaced {
                    block: i,
                    protects_copy: s.protects_copy,
                    host_copy: s.host_copy,
                    media: on.to_string(),
                    assigned: host.to_string(),
                });
            }
            if len != s.bytes {
                return Err(Violation::ExtentLength {
                    media: on.to_string(),
                    block: i,
                    expected: s.bytes,
                    actual: len,
                });
            }
        }
    }

    if let Some(((block, copy), at)) = copies_at.into_iter().next() {
        return Err(Violation::CopyPlacement {
            block,
            copy,
            count: at.len(),
        });
    }
    if let Some(((block, protects_copy, host_copy), _)) = shares_at.into_iter().next() {
        return Err(Violation::ShareUnexpected {
            block,
            protects_copy,
            host_copy,
        });
    }
    Ok(())
}
