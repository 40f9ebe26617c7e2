use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::MediaSpec;
use crate::error::{PlanError, Result};

/// Loads a media pool: `{"media": [...]}` or a bare array, in pool order.
pub fn load_media_pool(path: &Path) -> Result<Vec<MediaSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PoolFile {
        Wrapped { media: Vec<MediaSpec> },
        Bare(Vec<MediaSpec>),
    }
    let text = fs::read_to_string(path)?;
    let pool = match serde_json::from_str::<PoolFile>(&text)? {
        PoolFile::Wrapped { media } | PoolFile::Bare(media) => media,
    };
    check_pool(&pool)?;
    Ok(pool)
}

pub fn check_pool(pool: &[MediaSpec]) -> Result<()> {
    let mut ids = HashSet::new();
    for m in pool {
        if !ids.insert(m.media_id.as_str()) {
            return Err(PlanError::Format(format!("duplicate media id {}", m.media_id)));
        }
        if m.usable() == 0 {
            return Err(PlanError::Format(format!(
                "media {} has no usable capacity",
                m.media_id
            )));
        }
    }
    Ok(())
}
