// coldstore_core/src/catalog/source.rs
use crate::catalog::{CatalogRecord, PackCatalog};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct OpenParams {
    pub catalog_path: std::path::PathBuf,
}

/// Anything that can yield index records in their declared order.
pub trait CatalogSource: Send + Sync {
    fn records(&self) -> Result<Box<dyn Iterator<Item = Result<CatalogRecord>> + '_>>;

    fn load(&self) -> Result<PackCatalog> {
        let records = self.records()?.collect::<Result<Vec<_>>>()?;
        PackCatalog::from_records(records)
    }
}
