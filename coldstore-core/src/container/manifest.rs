use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use time::OffsetDateTime;

use crate::allocate::layout::MediaLayout;
use crate::build::block::Block;
use crate::error::{PlanError, Result};
use crate::ladder::SizeLadder;
use crate::policy::{BuildPolicy, RedundancyPolicy};
use crate::redundancy::BlockParity;
use crate::stats::PlanStats;
use crate::util::hash_forward::DigestForward;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Meta {
    /// Unix seconds; 0 in deterministic mode.
    pub created: i64,
    pub tool: String,
}

/// Output of `binpack`, input of `manage-disk`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlockPlan {
    pub policy: BuildPolicy,
    pub blocks: Vec<Block>,
    pub stats: PlanStats,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlannedBlock {
    pub block: Block,
    pub parity: BlockParity,
    /// Media id per copy index.
    pub media: Vec<String>,
}

/// The full assignment handed to `create-iso`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Plan {
    pub ladder: SizeLadder,
    pub tolerance: f64,
    pub redundancy: RedundancyPolicy,
    pub blocks: Vec<PlannedBlock>,
    pub media: Vec<MediaLayout>,
    /// Group label → media holding any of its packs.
    pub distribution: BTreeMap<String, Vec<String>>,
    pub stats: PlanStats,
}

/// A plan body sealed with its blake3 digest. The digest covers the body
/// only, so reruns at different times agree on it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope<T> {
    pub meta: Meta,
    pub digest: String,
    pub body: T,
}

pub type BlockManifest = Envelope<BlockPlan>;
pub type PlanManifest = Envelope<Plan>;

impl<T: Serialize> Envelope<T> {
    pub fn seal(body: T, tool: &str, deterministic: bool) -> Result<Self> {
        let created = if deterministic {
            0
        } else {
            OffsetDateTime::now_utc().unix_timestamp()
        };
        let digest = digest_of(&body)?;
        Ok(Self {
            meta: Meta {
                created,
                tool: tool.to_string(),
            },
            digest,
            body,
        })
    }

    pub fn verify(&self) -> Result<()> {
        let actual = digest_of(&self.body)?;
        if actual != self.digest {
            return Err(PlanError::Format(format!(
                "digest mismatch: recorded {} computed {}",
                self.digest, actual
            )));
        }
        Ok(())
    }
}

/// blake3 over the canonical JSON encoding.
pub fn digest_of<T: Serialize>(body: &T) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut fw = DigestForward::new(io::sink(), &mut hasher);
    serde_json::to_writer(&mut fw, body)?;
    tracing::debug!(bytes = fw.counted, "plan body digested");
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Group label → media ids holding it, in pool order.
pub fn distribution(blocks: &[PlannedBlock], media: &[MediaLayout]) -> BTreeMap<String, Vec<String>> {
    let rank = |id: &str| media.iter().position(|m| m.media.media_id == id);
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for pb in blocks {
        for p in &pb.block.packs {
            let ids = out.entry(p.group.clone()).or_default();
            for m in &pb.media {
                if !ids.contains(m) {
                    ids.push(m.clone());
                }
            }
        }
    }
    for ids in out.values_mut() {
        ids.sort_by_key(|id| rank(id.as_str()));
    }
    out
}
