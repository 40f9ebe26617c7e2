use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::domain::{Entry, Pack};
use crate::error::{PlanError, Result};
use crate::util::size::ByteSize;

pub mod factory;
pub mod source;
pub mod source_fs;

/// One line of the index: an entry and the pack it was packed into.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(alias = "entryId")]
    pub entry_id: String,
    pub size: ByteSize,
    pub group: String,
    #[serde(default)]
    pub splittable: bool,
    #[serde(default, alias = "splitReason", skip_serializing_if = "Option::is_none")]
    pub split_reason: Option<String>,
    #[serde(alias = "packId")]
    pub pack_id: String,
    #[serde(default)]
    pub fixed: bool,
}

/// Normalized, read-only view of the packs in declared order.
#[derive(Clone, Debug, Default)]
pub struct PackCatalog {
    packs: Vec<Pack>,
    by_id: HashMap<String, usize>,
    total: u64,
}

impl PackCatalog {
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = CatalogRecord>,
    {
        let mut packs: Vec<Pack> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut seen_entries: HashSet<String> = HashSet::new();
        let mut total: u64 = 0;

        for rec in records {
            if rec.splittable && rec.split_reason.as_deref().is_none_or(str::is_empty) {
                return Err(PlanError::Format(format!(
                    "entry {} is marked splittable without a split reason",
                    rec.entry_id
                )));
            }
            if !seen_entries.insert(rec.entry_id.clone()) {
                return Err(PlanError::Format(format!(
                    "duplicate entry id {}",
                    rec.entry_id
                )));
            }

            let entry = Entry {
                id: rec.entry_id,
                size: rec.size.0,
                group: rec.group,
                fixed: rec.fixed,
                splittable: rec.splittable,
                split_reason: rec.split_reason,
            };
            // pack sizes are bounded by this, so later sums over packs stay in range
            total = total.checked_add(entry.size).ok_or_else(|| {
                PlanError::Format(format!("catalog size overflows at entry {}", entry.id))
            })?;

            match by_id.get(&rec.pack_id) {
                Some(&idx) => {
                    // entries of a pack must be contiguous in the declared order
                    if idx + 1 != packs.len() {
                        return Err(PlanError::Format(format!(
                            "pack {} is interleaved with other packs (entry {})",
                            rec.pack_id, entry.id
                        )));
                    }
                    let pack = &mut packs[idx];
                    if pack.group != entry.group {
                        return Err(PlanError::Format(format!(
                            "entry {} has group {:?} but pack {} has group {:?}",
                            entry.id, entry.group, pack.id, pack.group
                        )));
                    }
                    pack.size = pack.size.checked_add(entry.size).ok_or_else(|| {
                        PlanError::Format(format!("pack {} size overflows", pack.id))
                    })?;
                    pack.entries.push(entry);
                }
                None => {
                    let ordinal = packs.len();
                    by_id.insert(rec.pack_id.clone(), ordinal);
                    packs.push(Pack {
                        id: rec.pack_id,
                        group: entry.group.clone(),
                        ordinal,
                        size: entry.size,
                        entries: vec![entry],
                    });
                }
            }
        }

        if let Some(p) = packs.iter().find(|p| p.size == 0) {
            return Err(PlanError::Format(format!("pack {} has zero size", p.id)));
        }
        tracing::debug!(packs = packs.len(), entries = seen_entries.len(), "catalog loaded");
        Ok(Self {
            packs,
            by_id,
            total,
        })
    }

    pub fn packs(&self) -> &[Pack] {
        &self.packs
    }

    pub fn pack(&self, id: &str) -> Option<&Pack> {
        self.by_id.get(id).map(|&i| &self.packs[i])
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total
    }
}
