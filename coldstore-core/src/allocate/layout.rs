use serde::{Deserialize, Serialize};

use crate::domain::MediaSpec;
use crate::redundancy::{BlockParity, Placement};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtentContent {
    Block {
        block: usize,
        copy: u32,
    },
    Parity {
        block: usize,
        protects_copy: u32,
        host_copy: u32,
        placement: Placement,
    },
}

/// Byte range on a medium, as `create-iso` lays it out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub offset: u64,
    pub len: u64,
    #[serde(flatten)]
    pub content: ExtentContent,
}

impl Extent {
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLayout {
    pub media: MediaSpec,
    pub used: u64,
    pub extents: Vec<Extent>,
}

impl MediaLayout {
    pub fn fill_ratio(&self) -> f64 {
        let usable = self.media.usable();
        if usable == 0 {
            return 0.0;
        }
        self.used as f64 / usable as f64
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

/// Lays out the copies placed on one medium. Copies are ordered by
/// `(block, copy)`; each is followed by its local share, then by the spread
/// shares it hosts ordered by the copy they protect.
pub fn layout_media(media: &MediaSpec, placed: &[(usize, u32)], parity: &[BlockParity]) -> MediaLayout {
    let mut placed = placed.to_vec();
    placed.sort_unstable();

    let mut extents = Vec::new();
    let mut offset = 0u64;
    for (block, copy) in placed {
        let bp = &parity[block];
        extents.push(Extent {
            offset,
            len: bp.block_size,
            content: ExtentContent::Block { block, copy },
        });
        offset += bp.block_size;

        let mut hosted: Vec<_> = bp.hosted_by(copy).collect();
        // local first, then spread by protected copy
        hosted.sort_by_key(|s| (s.placement, s.protects_copy));
        for s in hosted {
            extents.push(Extent {
                offset,
                len: s.bytes,
                content: ExtentContent::Parity {
                    block,
                    protects_copy: s.protects_copy,
                    host_copy: s.host_copy,
                    placement: s.placement,
                },
            });
            offset += s.bytes;
        }
    }

    MediaLayout {
        media: media.clone(),
        used: offset,
        extents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MediaKind;
    use crate::policy::RedundancyPolicy;
    use crate::redundancy::RedundancyPlanner;

    #[test]
    fn extents_are_contiguous_and_ordered() {
        let planner = RedundancyPlanner::new(RedundancyPolicy::new(10, 3)).unwrap();
        let parity = vec![planner.plan_block(0, 1000), planner.plan_block(1, 500)];
        let m = MediaSpec::new("m0", 10_000, MediaKind::Disk);
        let lay = layout_media(&m, &[(1, 2), (0, 1)], &parity);

        assert_eq!(
            lay.extents[0].content,
            ExtentContent::Block { block: 0, copy: 1 }
        );
        assert!(matches!(
            lay.extents[1].content,
            ExtentContent::Parity {
                placement: Placement::Local,
                protects_copy: 1,
                ..
            }
        ));
        // two received spread shares, protected copies 0 and 2
        assert!(matches!(
            lay.extents[2].content,
            ExtentContent::Parity { placement: Placement::Spread, protects_copy: 0, .. }
        ));
        assert!(matches!(
            lay.extents[3].content,
            ExtentContent::Parity { placement: Placement::Spread, protects_copy: 2, .. }
        ));
        for w in lay.extents.windows(2) {
            assert_eq!(w[0].end(), w[1].offset);
        }
        assert_eq!(lay.used, parity[0].unit_bytes(1) + parity[1].unit_bytes(2));
        assert_eq!(lay.extents.last().unwrap().end(), lay.used);
    }
}
