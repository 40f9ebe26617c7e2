#![forbid(unsafe_code)]

pub mod domain;
pub mod error;
pub mod ladder;
pub mod policy;
pub mod stats;

pub mod util {
    pub mod hash_forward;
    pub mod size;
}

pub mod catalog;

pub mod build {
    pub mod block;
    pub mod builder;
}

pub mod redundancy;

pub mod allocate;

pub mod validate;

pub mod container {
    pub mod manifest;
}

pub mod codec;

pub mod pipeline;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports: stable API surface
pub use allocate::AbortFlag;
pub use catalog::PackCatalog;
pub use container::manifest::{BlockManifest, BlockPlan, Envelope, Plan, PlanManifest};
pub use error::{PlanError, Result};
pub use pipeline::{MediaOptions, load_catalog, plan_blocks, plan_media};
pub use policy::{BuildPolicy, OversizePolicy, RedundancyPolicy};
