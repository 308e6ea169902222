use crate::db::schema::{Bounds, SchemaError};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

///
/// Compression
/// Codec name applied uniformly to coordinate and attribute filter lists.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum Compression {
    #[display("NONE")]
    None,
    #[display("GZIP")]
    Gzip,
    #[display("ZSTD")]
    Zstd,
    #[display("LZ4")]
    Lz4,
    #[display("RLE")]
    Rle,
    #[display("BZIP2")]
    Bzip2,
    #[display("DOUBLE-DELTA")]
    DoubleDelta,
    #[display("DICTIONARY")]
    Dictionary,
}

impl Compression {
    const ALL: [Self; 8] = [
        Self::None,
        Self::Gzip,
        Self::Zstd,
        Self::Lz4,
        Self::Rle,
        Self::Bzip2,
        Self::DoubleDelta,
        Self::Dictionary,
    ];
}

impl FromStr for Compression {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.to_string().eq_ignore_ascii_case(text))
            .ok_or_else(|| SchemaError::UnknownCompression(text.to_string()))
    }
}

///
/// LayerOptions
///
/// Layer creation options. `fid` and `geometry_name` distinguish "not
/// given" (`None`, use the default name) from "given empty" (`Some("")`,
/// disable the column).
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerOptions {
    pub bounds: Option<Bounds>,
    pub add_z_dim: Option<bool>,
    pub fid: Option<String>,
    pub geometry_name: Option<String>,
    pub compression: Option<Compression>,
    pub batch_size: Option<usize>,
}

impl LayerOptions {
    /// Parse `KEY=VALUE` pairs. Keys are case-insensitive; unknown keys are
    /// ignored with a warning.
    pub fn parse<I, S>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for pair in pairs {
            let (key, value) = split_pair(pair.as_ref())?;
            match key.to_ascii_uppercase().as_str() {
                "BOUNDS" => options.bounds = Some(value.parse()?),
                "ADD_Z_DIM" => options.add_z_dim = Some(parse_flag(&key, value)?),
                "FID" => options.fid = Some(value.to_string()),
                "GEOMETRY_NAME" => options.geometry_name = Some(value.to_string()),
                "COMPRESSION" => options.compression = Some(value.parse()?),
                "BATCH_SIZE" => options.batch_size = Some(parse_batch_size(&key, value)?),
                // dataset-level, read by DatasetOptions
                "CREATE_GROUP" => {}
                _ => warn!(option = %key, "ignoring unknown layer creation option"),
            }
        }

        Ok(options)
    }

    #[must_use]
    pub const fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    #[must_use]
    pub fn with_fid(mut self, name: impl Into<String>) -> Self {
        self.fid = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_geometry_name(mut self, name: impl Into<String>) -> Self {
        self.geometry_name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

pub(crate) fn split_pair(pair: &str) -> Result<(String, &str), SchemaError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| SchemaError::InvalidOption {
            key: pair.to_string(),
            value: String::new(),
        })?;

    Ok((key.trim().to_string(), value.trim()))
}

/// `YES`/`NO` style flags.
pub(crate) fn parse_flag(key: &str, value: &str) -> Result<bool, SchemaError> {
    match value.to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" | "1" => Ok(true),
        "NO" | "FALSE" | "OFF" | "0" => Ok(false),
        _ => Err(SchemaError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_batch_size(key: &str, value: &str) -> Result<usize, SchemaError> {
    value
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| SchemaError::InvalidOption {
            key: key.to_string(),
            value: value.to_string(),
        })
}
