use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use coldstore_core::OversizePolicy;
use coldstore_core::catalog::factory::CatalogFormat;
use coldstore_core::codec::ManifestFormat;

#[derive(Parser, Debug)]
#[command(author, version, about = "Group indexed packs into ladder-sized blocks", long_about = None)]
pub struct BinpackArgs {
    /// Pack catalog written by index-data (JSON or JSON Lines)
    #[arg(long)]
    pub catalog: PathBuf,

    /// Size ladder file; the standard 15 MiB .. 14.9 GiB ladder when omitted
    #[arg(long)]
    pub ladder: Option<PathBuf>,

    /// Size tolerance around each rung, in percent
    #[arg(long, default_value_t = 3.0)]
    pub tolerance: f64,

    /// Block plan output path
    #[arg(long)]
    pub out: PathBuf,

    /// Packs that may be held back while later packs fill a block
    #[arg(long, default_value_t = 5)]
    pub window: usize,

    #[arg(long, value_enum, default_value_t = OversizeArg::Fail)]
    pub oversize: OversizeArg,

    /// Close a block at every group change
    #[arg(long)]
    pub split_at_groups: bool,

    /// Catalog format; guessed from the extension when omitted
    #[arg(long, value_enum)]
    pub catalog_format: Option<CatalogFormatArg>,

    /// Output encoding; guessed from the extension when omitted
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Zero the manifest timestamp
    #[arg(long)]
    pub deterministic: bool,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Assign blocks and parity to storage media", long_about = None)]
pub struct ManageDiskArgs {
    /// Block plan written by binpack
    #[arg(long)]
    pub plan: PathBuf,

    /// Media pool file
    #[arg(long)]
    pub media: PathBuf,

    /// Parity percent per copy (x)
    #[arg(long)]
    pub redundancy: u32,

    /// Media copies per block (y)
    #[arg(long)]
    pub copies: u32,

    /// Media plan output path
    #[arg(long)]
    pub out: PathBuf,

    /// Keep parity next to its own copy only
    #[arg(long)]
    pub no_spread: bool,

    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    #[arg(long)]
    pub deterministic: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OversizeArg {
    /// Refuse packs above the top rung
    Fail,
    /// Give them a block of their own
    Custom,
}

impl From<OversizeArg> for OversizePolicy {
    fn from(a: OversizeArg) -> Self {
        match a {
            OversizeArg::Fail => OversizePolicy::Fail,
            OversizeArg::Custom => OversizePolicy::Custom,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CatalogFormatArg {
    Json,
    Jsonl,
}

impl From<CatalogFormatArg> for CatalogFormat {
    fn from(a: CatalogFormatArg) -> Self {
        match a {
            CatalogFormatArg::Json => CatalogFormat::Json,
            CatalogFormatArg::Jsonl => CatalogFormat::JsonLines,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Json,
    Cbor,
}

impl From<FormatArg> for ManifestFormat {
    fn from(a: FormatArg) -> Self {
        match a {
            FormatArg::Json => ManifestFormat::Json,
            FormatArg::Cbor => ManifestFormat::Cbor,
        }
    }
}
