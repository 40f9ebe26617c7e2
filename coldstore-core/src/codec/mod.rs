use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{PlanError, Result};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ManifestFormat {
    Json,
    Cbor,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("cbor") => ManifestFormat::Cbor,
            _ => ManifestFormat::Json,
        }
    }

    /// JSON documents here always open with `{` (after whitespace); CBOR maps never do.
    pub fn sniff(head: &[u8]) -> Self {
        match head.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => ManifestFormat::Json,
            _ => ManifestFormat::Cbor,
        }
    }
}

pub fn encode<T: Serialize, W: Write>(format: ManifestFormat, value: &T, w: W) -> Result<()> {
    match format {
        ManifestFormat::Json => serde_json::to_writer_pretty(w, value)?,
        ManifestFormat::Cbor => ciborium::ser::into_writer(value, w)
            .map_err(|e| PlanError::Format(format!("cbor encode: {e}")))?,
    }
    Ok(())
}

pub fn decode<T: DeserializeOwned, R: Read>(format: ManifestFormat, r: R) -> Result<T> {
    match format {
        ManifestFormat::Json => Ok(serde_json::from_reader(r)?),
        ManifestFormat::Cbor => ciborium::de::from_reader(r)
            .map_err(|e| PlanError::Format(format!("cbor decode: {e}"))),
    }
}

/// Writes through a temp file in the target directory and renames it into
/// place, so a failed run never leaves a partial manifest behind.
pub fn write_file<T: Serialize>(format: ManifestFormat, value: &T, out: &Path) -> Result<()> {
    let dir = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        encode(format, value, &mut w)?;
        w.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(out).map_err(|e| PlanError::Io(e.error))?;
    Ok(())
}

pub fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut r = BufReader::new(File::open(path)?);
    let mut head = [0u8; 64];
    let n = r.read(&mut head)?;
    let format = ManifestFormat::sniff(&head[..n]);
    decode(format, (&head[..n]).chain(r))
}
