use crate::model::geometry::Geometry;
use std::{
    fmt::Debug,
    panic::{AssertUnwindSafe, catch_unwind},
};
use thiserror::Error as ThisError;

/// Upper bound on one stored geometry payload.
pub const MAX_GEOMETRY_BYTES: usize = 64 * 1024 * 1024;

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("geometry encode failed: {0}")]
    Encode(String),

    #[error("geometry decode failed: {0}")]
    Decode(String),

    #[error("geometry payload of {len} bytes exceeds the {max_bytes} byte limit")]
    TooLarge { len: usize, max_bytes: usize },
}

///
/// GeometryCodec
///
/// Byte format of the geometry attribute. Implementations must round-trip
/// kind, dimensionality and every coordinate exactly.
///

pub trait GeometryCodec: Debug + Send + Sync {
    fn encode(&self, geometry: &Geometry) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Geometry, CodecError>;
}

///
/// CborGeometryCodec
/// Default codec: the serde model of `Geometry` written as CBOR.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CborGeometryCodec;

impl GeometryCodec for CborGeometryCodec {
    fn encode(&self, geometry: &Geometry) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_cbor::to_vec(geometry).map_err(|e| CodecError::Encode(e.to_string()))?;
        if bytes.len() > MAX_GEOMETRY_BYTES {
            return Err(CodecError::TooLarge {
                len: bytes.len(),
                max_bytes: MAX_GEOMETRY_BYTES,
            });
        }

        Ok(bytes)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Geometry, CodecError> {
        if bytes.len() > MAX_GEOMETRY_BYTES {
            return Err(CodecError::TooLarge {
                len: bytes.len(),
                max_bytes: MAX_GEOMETRY_BYTES,
            });
        }

        // stored bytes may come from another writer; a decoder panic must
        // not unwind through the read path
        match catch_unwind(AssertUnwindSafe(|| serde_cbor::from_slice(bytes))) {
            Ok(Ok(geometry)) => Ok(geometry),
            Ok(Err(err)) => Err(CodecError::Decode(err.to_string())),
            Err(_) => Err(CodecError::Decode("panic during CBOR decode".into())),
        }
    }
}
