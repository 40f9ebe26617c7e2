// coldstore_core/src/domain.rs
use serde::{Deserialize, Serialize};

use crate::util::size::ByteSize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub size: u64,
    pub group: String,
    /// Fixed-location entries pin their pack to its catalog position.
    pub fixed: bool,
    /// Split override. Only ever true together with `split_reason`.
    pub splittable: bool,
    pub split_reason: Option<String>,
}

impl Entry {
    pub fn may_split(&self) -> bool {
        self.splittable && self.split_reason.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pack {
    pub id: String,
    pub group: String,
    /// Position in the declared catalog order.
    pub ordinal: usize,
    pub size: u64,
    pub entries: Vec<Entry>,
}

impl Pack {
    pub fn is_fixed(&self) -> bool {
        self.entries.iter().any(|e| e.fixed)
    }

    pub fn all_entries_may_split(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(Entry::may_split)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Disk,
    Optical,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSpec {
    pub media_id: String,
    #[serde(alias = "capacity_bytes")]
    pub capacity: ByteSize,
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_years: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_bytes: Option<ByteSize>,
}

impl MediaSpec {
    pub fn new(media_id: impl Into<String>, capacity: u64, kind: MediaKind) -> Self {
        Self {
            media_id: media_id.into(),
            capacity: ByteSize(capacity),
            kind,
            age_years: None,
            reserve_bytes: None,
        }
    }

    /// Bytes the allocator may hand out on this medium.
    pub fn usable(&self) -> u64 {
        let reserve = self.reserve_bytes.map(|r| r.0).unwrap_or(0);
        self.capacity.0.saturating_sub(reserve)
    }
}
