use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::catalog::CatalogRecord;
use crate::catalog::source::{CatalogSource, OpenParams};
use crate::error::{PlanError, Result};

/// A single JSON document: `{"records": [...]}` or a bare array.
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new(params: OpenParams) -> Result<Self> {
        if !params.catalog_path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("catalog not found: {}", params.catalog_path.display()),
            )
            .into());
        }
        Ok(Self {
            path: params.catalog_path,
        })
    }
}

impl CatalogSource for JsonCatalog {
    fn records(&self) -> Result<Box<dyn Iterator<Item = Result<CatalogRecord>> + '_>> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Doc {
            Wrapped { records: Vec<CatalogRecord> },
            Bare(Vec<CatalogRecord>),
        }
        let f = BufReader::new(File::open(&self.path)?);
        let recs = match serde_json::from_reader::<_, Doc>(f)? {
            Doc::Wrapped { records } | Doc::Bare(records) => records,
        };
        Ok(Box::new(recs.into_iter().map(Ok)))
    }
}

/// One record per line; blank lines and `#` comments are skipped.
pub struct JsonLinesCatalog {
    path: PathBuf,
}

impl JsonLinesCatalog {
    pub fn new(params: OpenParams) -> Result<Self> {
        if !params.catalog_path.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("catalog not found: {}", params.catalog_path.display()),
            )
            .into());
        }
        Ok(Self {
            path: params.catalog_path,
        })
    }
}

impl CatalogSource for JsonLinesCatalog {
    fn records(&self) -> Result<Box<dyn Iterator<Item = Result<CatalogRecord>> + '_>> {
        let f = BufReader::new(File::open(&self.path)?);
        let it = f
            .lines()
            .enumerate()
            .filter_map(|(i, line)| match line {
                Err(e) => Some(Err(PlanError::from(e))),
                Ok(l) => {
                    let t = l.trim();
                    if t.is_empty() || t.starts_with('#') {
                        return None;
                    }
                    Some(serde_json::from_str::<CatalogRecord>(t).map_err(|e| {
                        PlanError::Format(format!("catalog line {}: {e}", i + 1))
                    }))
                }
            });
        Ok(Box::new(it))
    }
}
