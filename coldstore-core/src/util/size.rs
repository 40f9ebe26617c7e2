use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{PlanError, Result};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;
pub const TIB: u64 = 1024 * GIB;

/// Byte count that deserializes from either an integer or a size string
/// such as `"1860MiB"`, `"14.9 GiB"` or `"25GB"`. Serializes as an integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn parse(s: &str) -> Result<Self> {
        let t = s.trim();
        let split = t
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(t.len());
        let (num, unit) = t.split_at(split);
        if num.is_empty() {
            return Err(PlanError::Format(format!("size without a number: {s:?}")));
        }
        let mult: u64 = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kib" => KIB,
            "m" | "mib" => MIB,
            "g" | "gib" => GIB,
            "t" | "tib" => TIB,
            "kb" => 1_000,
            "mb" => 1_000_000,
            "gb" => 1_000_000_000,
            "tb" => 1_000_000_000_000,
            other => {
                return Err(PlanError::Format(format!("unknown size unit {other:?} in {s:?}")));
            }
        };
        if let Ok(n) = num.parse::<u64>() {
            return n
                .checked_mul(mult)
                .map(ByteSize)
                .ok_or_else(|| PlanError::Format(format!("size overflows u64: {s:?}")));
        }
        let f: f64 = num
            .parse()
            .map_err(|_| PlanError::Format(format!("bad size number in {s:?}")))?;
        let bytes = (f * mult as f64).floor();
        if !bytes.is_finite() || bytes < 0.0 || bytes > u64::MAX as f64 {
            return Err(PlanError::Format(format!("size out of range: {s:?}")));
        }
        Ok(ByteSize(bytes as u64))
    }
}

impl From<u64> for ByteSize {
    fn from(v: u64) -> Self {
        ByteSize(v)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        let (div, unit) = if b >= TIB {
            (TIB, "TiB")
        } else if b >= GIB {
            (GIB, "GiB")
        } else if b >= MIB {
            (MIB, "MiB")
        } else if b >= KIB {
            (KIB, "KiB")
        } else {
            return write!(f, "{b} B");
        };
        write!(f, "{:.2} {unit}", b as f64 / div as f64)
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }
        match Raw::deserialize(d)? {
            Raw::Int(n) => Ok(ByteSize(n)),
            Raw::Text(s) => ByteSize::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}
