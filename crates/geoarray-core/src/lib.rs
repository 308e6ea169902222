//! Core runtime for geoarray: vector layers stored in a sparse array engine.
//!
//! - `model`: fields, geometries, features, and spatial reference seams.
//! - `value`: the closed field value type and temporal literal handling.
//! - `db`: schema mapping, filter pushdown, write/read consistency, catalog,
//!   and the array engine capability trait.
//! - `obs`: metrics sink boundary and process-local counters.
#![warn(unreachable_pub)]

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod obs;
pub mod value;

///
/// CONSTANTS
///

/// Default name of the feature-id dimension.
pub const DEFAULT_FID_NAME: &str = "FID";

/// Default name of the attribute holding encoded geometries.
pub const DEFAULT_GEOMETRY_NAME: &str = "wkb_geometry";

/// Spatial dimension names, in X, Y, Z order.
pub const DIM_X: &str = "_X";
pub const DIM_Y: &str = "_Y";
pub const DIM_Z: &str = "_Z";

/// Default number of features buffered before a fragment is committed.
pub const DEFAULT_BATCH_SIZE: usize = 500_000;

///
/// Prelude
///
/// Domain vocabulary only; errors and engine internals stay in their modules.
///

pub mod prelude {
    pub use crate::{
        db::{
            Dataset, DatasetOptions, Layer, OpenOptions,
            filter::{Expr, Translation},
            schema::{Bounds, LayerOptions, LayerSchema},
        },
        model::{
            feature::Feature,
            field::{FieldKind, FieldSpec, FieldSubtype, ScalarKind},
            geometry::{Coord, Geometry, GeometryKind, GeometryType},
        },
        value::{FieldSlot, Value},
    };
}
