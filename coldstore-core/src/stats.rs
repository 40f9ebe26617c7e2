use serde::{Deserialize, Serialize};

use crate::allocate::layout::MediaLayout;
use crate::build::block::Block;
use crate::redundancy::BlockParity;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFill {
    pub media_id: String,
    pub used: u64,
    pub usable: u64,
    pub fill_ratio: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanStats {
    pub blocks: u64,
    pub custom_blocks: u64,
    pub packs: u64,
    pub payload_bytes: u64,
    pub parity_bytes: u64,
    /// Bytes written across all media: every copy plus all parity.
    pub stored_bytes: u64,
    pub media_used: u64,
    pub media_fill: Vec<MediaFill>,
}

impl PlanStats {
    pub fn for_blocks(blocks: &[Block]) -> Self {
        Self {
            blocks: blocks.len() as u64,
            custom_blocks: blocks.iter().filter(|b| b.rung.is_custom()).count() as u64,
            packs: blocks.iter().map(|b| b.packs.len() as u64).sum(),
            payload_bytes: saturating_sum(blocks.iter().map(|b| b.size)),
            ..Default::default()
        }
    }

    pub fn for_plan(blocks: &[Block], parity: &[BlockParity], media: &[MediaLayout]) -> Self {
        let mut s = Self::for_blocks(blocks);
        s.parity_bytes = saturating_sum(parity.iter().map(|p| p.codec.recovery_bytes));
        s.stored_bytes = saturating_sum(media.iter().map(|m| m.used));
        s.media_fill = media
            .iter()
            .filter(|m| !m.is_empty())
            .map(|m| MediaFill {
                media_id: m.media.media_id.clone(),
                used: m.used,
                usable: m.media.usable(),
                fill_ratio: m.fill_ratio(),
            })
            .collect();
        s.media_used = s.media_fill.len() as u64;
        s
    }
}

fn saturating_sum(it: impl Iterator<Item = u64>) -> u64 {
    it.fold(0, u64::saturating_add)
}
