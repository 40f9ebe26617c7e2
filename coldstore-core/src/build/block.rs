use serde::{Deserialize, Serialize};

use crate::domain::{Entry, Pack};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomReason {
    /// A single pack above the top rung's window.
    Oversized,
    /// The block total landed in no ladder window.
    Remainder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockRung {
    Ladder { rung: u64 },
    Custom { reason: CustomReason },
}

impl BlockRung {
    pub fn is_custom(&self) -> bool {
        matches!(self, BlockRung::Custom { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRef {
    pub id: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_reason: Option<String>,
}

impl From<&Entry> for EntryRef {
    fn from(e: &Entry) -> Self {
        Self {
            id: e.id.clone(),
            size: e.size,
            split_reason: if e.may_split() {
                e.split_reason.clone()
            } else {
                None
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRef {
    pub pack_id: String,
    pub group: String,
    pub size: u64,
    pub entries: Vec<EntryRef>,
}

impl From<&Pack> for PackRef {
    fn from(p: &Pack) -> Self {
        Self {
            pack_id: p.id.clone(),
            group: p.group.clone(),
            size: p.size,
            entries: p.entries.iter().map(EntryRef::from).collect(),
        }
    }
}

/// Virtual grouping of packs; no data moves when a block is formed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: usize,
    pub packs: Vec<PackRef>,
    pub size: u64,
    /// Rung the builder aimed for when the block was opened.
    pub target: u64,
    pub rung: BlockRung,
}

impl Block {
    pub fn pack_ids(&self) -> impl Iterator<Item = &str> {
        self.packs.iter().map(|p| p.pack_id.as_str())
    }
}
