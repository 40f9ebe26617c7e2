use std::path::Path;

use crate::catalog::source::{CatalogSource, OpenParams};
use crate::catalog::source_fs::{JsonCatalog, JsonLinesCatalog};
use crate::error::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogFormat {
    Json,
    JsonLines,
}

impl CatalogFormat {
    /// `.jsonl` / `.ndjson` are line-delimited, everything else is one document.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => CatalogFormat::JsonLines,
            _ => CatalogFormat::Json,
        }
    }
}

pub fn open_catalog(format: CatalogFormat, p: OpenParams) -> Result<Box<dyn CatalogSource>> {
    match format {
        CatalogFormat::Json => Ok(Box::new(JsonCatalog::new(p)?)),
        CatalogFormat::JsonLines => Ok(Box::new(JsonLinesCatalog::new(p)?)),
    }
}
