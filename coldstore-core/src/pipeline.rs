use std::path::Path;
use tracing::info;

use crate::allocate::{AbortFlag, Allocation, MediaAllocator};
use crate::build::block::Block;
use crate::build::builder::BlockBuilder;
use crate::catalog::PackCatalog;
use crate::catalog::factory::{CatalogFormat, open_catalog};
use crate::catalog::source::OpenParams;
use crate::container::manifest::{BlockPlan, Plan, PlannedBlock, distribution};
use crate::domain::MediaSpec;
use crate::error::{PlanError, Result};
use crate::policy::{BuildPolicy, RedundancyPolicy};
use crate::redundancy::{BlockParity, RedundancyPlanner};
use crate::stats::PlanStats;
use crate::validate::PlanValidator;

#[derive(Clone, Default)]
pub struct MediaOptions {
    /// Checked between block placements; set it to stop planning.
    pub abort: Option<AbortFlag>,
}

/// Opens a catalog, picking the format from the extension unless given.
pub fn load_catalog(path: &Path, format: Option<CatalogFormat>) -> Result<PackCatalog> {
    let format = format.unwrap_or_else(|| CatalogFormat::from_path(path));
    let source = open_catalog(
        format,
        OpenParams {
            catalog_path: path.to_path_buf(),
        },
    )?;
    let catalog = source.load()?;
    info!(
        path = %path.display(),
        packs = catalog.len(),
        bytes = catalog.total_bytes(),
        "catalog loaded"
    );
    Ok(catalog)
}

/// `binpack`: packs → validated blocks.
pub fn plan_blocks(catalog: &PackCatalog, policy: &BuildPolicy) -> Result<BlockPlan> {
    let blocks = BlockBuilder::new(policy).build(catalog.packs())?;
    PlanValidator::with_catalog(catalog).validate_blocks(&policy.ladder, policy.tolerance, &blocks)?;
    let stats = PlanStats::for_blocks(&blocks);
    info!(
        blocks = stats.blocks,
        custom = stats.custom_blocks,
        bytes = stats.payload_bytes,
        "blocks planned"
    );
    Ok(BlockPlan {
        policy: policy.clone(),
        blocks,
        stats,
    })
}

/// `manage-disk`: blocks → parity → media, validated end to end.
pub fn plan_media(
    block_plan: &BlockPlan,
    pool: &[MediaSpec],
    redundancy: RedundancyPolicy,
    opts: &MediaOptions,
) -> Result<Plan> {
    let policy = &block_plan.policy;
    // block plans travel through files; recheck before building on them
    PlanValidator::new().validate_blocks(&policy.ladder, policy.tolerance, &block_plan.blocks)?;

    let planner = RedundancyPlanner::new(redundancy)?;
    if redundancy.copies as usize > pool.len() {
        return Err(PlanError::InvalidRedundancyConfig(format!(
            "{} copies need as many media, the pool has {}",
            redundancy.copies,
            pool.len()
        )));
    }
    let parity = planner.plan(&block_plan.blocks);
    let mut allocator = MediaAllocator::new(pool, redundancy.copies);
    if let Some(flag) = &opts.abort {
        allocator = allocator.with_abort(flag.clone());
    }
    let allocation = allocator.allocate(&block_plan.blocks, &parity)?;

    let plan = assemble(policy, redundancy, block_plan.blocks.clone(), parity, allocation);
    PlanValidator::new().validate(plan)
}

/// Joins the stage outputs into one plan. Inputs are index-aligned by block.
pub fn assemble(
    policy: &BuildPolicy,
    redundancy: RedundancyPolicy,
    blocks: Vec<Block>,
    parity: Vec<BlockParity>,
    allocation: Allocation,
) -> Plan {
    let stats = PlanStats::for_plan(&blocks, &parity, &allocation.media);
    let planned: Vec<PlannedBlock> = blocks
        .into_iter()
        .zip(parity)
        .zip(allocation.copies)
        .map(|((block, parity), media)| PlannedBlock {
            block,
            parity,
            media,
        })
        .collect();
    let distribution = distribution(&planned, &allocation.media);
    Plan {
        ladder: policy.ladder.clone(),
        tolerance: policy.tolerance,
        redundancy,
        blocks: planned,
        media: allocation.media,
        distribution,
        stats,
    }
}
