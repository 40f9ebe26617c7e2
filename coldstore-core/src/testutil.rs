//! Builders shared by the unit tests.
use crate::build::block::{Block, BlockRung, PackRef};
use crate::domain::{Entry, Pack};

pub use crate::util::size::{GIB, MIB, TIB};

pub fn pack_in(id: &str, group: &str, size: u64) -> Pack {
    Pack {
        id: id.into(),
        group: group.into(),
        ordinal: 0,
        size,
        entries: vec![Entry {
            id: format!("{id}/e0"),
            size,
            group: group.into(),
            fixed: false,
            splittable: false,
            split_reason: None,
        }],
    }
}

pub fn pack(id: &str, size: u64) -> Pack {
    pack_in(id, "g", size)
}

/// Ladder-fitting block holding a single pack of `size` bytes.
pub fn block(index: usize, size: u64) -> Block {
    let p = pack(&format!("p{index}"), size);
    Block {
        index,
        packs: vec![PackRef::from(&p)],
        size,
        target: size,
        rung: BlockRung::Ladder { rung: size },
    }
}
