use std::path::Path;
use tracing::info;

use coldstore_core::allocate::pool::load_media_pool;
use coldstore_core::codec::{self, ManifestFormat};
use coldstore_core::error::Result;
use coldstore_core::ladder::SizeLadder;
use coldstore_core::stats::PlanStats;
use coldstore_core::{
    BlockManifest, BuildPolicy, Envelope, MediaOptions, RedundancyPolicy, load_catalog, plan_blocks,
    plan_media,
};

use crate::presentation::cli::{BinpackArgs, FormatArg, ManageDiskArgs};

const BINPACK_TOOL: &str = concat!("binpack/", env!("CARGO_PKG_VERSION"));
const MANAGE_DISK_TOOL: &str = concat!("manage-disk/", env!("CARGO_PKG_VERSION"));

fn output_format(flag: Option<FormatArg>, out: &Path) -> ManifestFormat {
    flag.map(Into::into)
        .unwrap_or_else(|| ManifestFormat::from_path(out))
}

fn log_stats(stats: &PlanStats) {
    info!(
        blocks = stats.blocks,
        custom_blocks = stats.custom_blocks,
        packs = stats.packs,
        payload_bytes = stats.payload_bytes,
        parity_bytes = stats.parity_bytes,
        stored_bytes = stats.stored_bytes,
        media_used = stats.media_used,
        "plan statistics"
    );
    for m in &stats.media_fill {
        info!(
            media = %m.media_id,
            used = m.used,
            usable = m.usable,
            fill_pct = m.fill_ratio * 100.0,
            "media fill"
        );
    }
}

pub fn handle_binpack(args: BinpackArgs) -> Result<()> {
    let ladder = match &args.ladder {
        Some(p) => SizeLadder::load(p)?,
        None => SizeLadder::standard(),
    };
    let policy = BuildPolicy {
        ladder,
        tolerance: args.tolerance / 100.0,
        reorder_window: args.window,
        oversize: args.oversize.into(),
        split_at_groups: args.split_at_groups,
    };
    policy.check()?;

    let catalog = load_catalog(&args.catalog, args.catalog_format.map(Into::into))?;
    let plan = plan_blocks(&catalog, &policy)?;
    log_stats(&plan.stats);

    let manifest = Envelope::seal(plan, BINPACK_TOOL, args.deterministic)?;
    codec::write_file(output_format(args.format, &args.out), &manifest, &args.out)?;
    info!(out = %args.out.display(), digest = %manifest.digest, "block plan written");
    Ok(())
}

pub fn handle_manage_disk(args: ManageDiskArgs) -> Result<()> {
    let redundancy = RedundancyPolicy {
        percent: args.redundancy,
        copies: args.copies,
        spread: !args.no_spread,
    };
    redundancy.check()?;

    let blocks: BlockManifest = codec::read_file(&args.plan)?;
    blocks.verify()?;
    let pool = load_media_pool(&args.media)?;
    info!(
        blocks = blocks.body.blocks.len(),
        media = pool.len(),
        percent = redundancy.percent,
        copies = redundancy.copies,
        spread = redundancy.spread,
        "planning media"
    );

    let plan = plan_media(&blocks.body, &pool, redundancy, &MediaOptions::default())?;
    log_stats(&plan.stats);

    let manifest = Envelope::seal(plan, MANAGE_DISK_TOOL, args.deterministic)?;
    codec::write_file(output_format(args.format, &args.out), &manifest, &args.out)?;
    info!(out = %args.out.display(), digest = %manifest.digest, "media plan written");
    Ok(())
}
