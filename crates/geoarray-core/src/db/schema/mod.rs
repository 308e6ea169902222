//! Module: schema
//! Responsibility: map a vector layer definition onto an array schema.
//! Does not own: feature buffering, filter lowering, or catalog placement.
//! Boundary: layers consult `LayerSchema` for every field and axis binding.

pub mod metadata;
mod options;
mod storage;

#[cfg(test)]
mod tests;

use crate::{
    DEFAULT_FID_NAME, DEFAULT_GEOMETRY_NAME, DIM_X, DIM_Y, DIM_Z,
    db::engine::{
        ArraySchema, AttributeSpec, CellValNum, Datatype, DimensionSpec, Domain, MetadataValue,
    },
    model::{
        feature::FeatureDefn,
        field::{FieldKind, FieldSpec, FieldSubtype},
        geometry::{Envelope, GeometryKind, GeometryType},
        srs::{OpaqueSrs, SpatialReference},
    },
};
use std::{collections::BTreeMap, fmt, str::FromStr, sync::Arc};
use thiserror::Error as ThisError;
use tracing::debug;

// re-exports
pub use options::{Compression, LayerOptions};
pub use storage::datatype_for;

pub(crate) use options::{parse_flag, split_pair};
pub(crate) use storage::{decode, default_cell, encode};

/// Number of representable cells per spatial axis used to derive the grid step.
const GRID_CELLS: f64 = 4_294_967_296.0;

/// Z domain used when a dimension-only Point Z layer declares no Z bounds.
pub const DEFAULT_Z_DOMAIN: (f64, f64) = (-1.0e9, 1.0e9);

///
/// SchemaError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("spatial bounds are required (BOUNDS or a CRS area of use)")]
    MissingBounds,

    #[error("malformed bounds '{0}': expected minx,miny,maxx,maxy[,minz,maxz]")]
    MalformedBounds(String),

    #[error("Z dimension and Z bounds disagree: {0}")]
    ZBoundsMismatch(&'static str),

    #[error("geometry type None is not supported for vector layers")]
    NoGeometry,

    #[error("field name '{0}' is reserved")]
    ReservedName(String),

    #[error("field '{0}' already exists")]
    DuplicateField(String),

    #[error("subtype {subtype} cannot refine {kind} field '{field}'")]
    IllegalSubtype {
        field: String,
        subtype: FieldSubtype,
        kind: FieldKind,
    },

    #[error("cannot add field '{field}': schema is frozen after the first feature")]
    Frozen { field: String },

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("invalid option {key}='{value}'")]
    InvalidOption { key: String, value: String },

    #[error("unknown compression '{0}'")]
    UnknownCompression(String),

    #[error("{0} geometries need a geometry attribute (GEOMETRY_NAME cannot be empty)")]
    GeometryNameRequired(GeometryType),

    #[error("stored array is not a vector layer: {0}")]
    InvalidStoredSchema(String),
}

///
/// Bounds
/// Spatial domain of a layer; `z` only when a Z dimension exists.
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub z: Option<(f64, f64)>,
}

impl Bounds {
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            z: None,
        }
    }

    #[must_use]
    pub const fn with_z(mut self, min_z: f64, max_z: f64) -> Self {
        self.z = Some((min_z, max_z));
        self
    }

    fn is_ordered(&self) -> bool {
        self.min_x <= self.max_x
            && self.min_y <= self.max_y
            && self.z.is_none_or(|(lo, hi)| lo <= hi)
    }
}

impl FromStr for Bounds {
    type Err = SchemaError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let malformed = || SchemaError::MalformedBounds(text.to_string());
        let values = text
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed())?;

        let bounds = match values.as_slice() {
            [min_x, min_y, max_x, max_y] => Self::new(*min_x, *min_y, *max_x, *max_y),
            [min_x, min_y, max_x, max_y, min_z, max_z] => {
                Self::new(*min_x, *min_y, *max_x, *max_y).with_z(*min_z, *max_z)
            }
            _ => return Err(malformed()),
        };
        if !bounds.is_ordered() || values.iter().any(|v| !v.is_finite()) {
            return Err(malformed());
        }

        Ok(bounds)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.min_x, self.min_y, self.max_x, self.max_y)?;
        if let Some((lo, hi)) = self.z {
            write!(f, ",{lo},{hi}")?;
        }
        Ok(())
    }
}

///
/// Padding
///
/// Per-axis widening applied to spatial range queries: at least half a grid
/// step, and at least the largest half envelope extent written so far.
///

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Padding {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn grid_half_step(lower: f64, upper: f64) -> f64 {
    (upper - lower) / GRID_CELLS / 2.0
}

///
/// SchemaState
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SchemaState {
    Open,
    Frozen,
}

///
/// BindingTarget
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BindingTarget {
    Attribute { index: usize, name: String },
    FidDimension { name: String },
}

impl BindingTarget {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Attribute { name, .. } | Self::FidDimension { name } => name,
        }
    }
}

///
/// FieldBinding
/// Where a filterable name lives and how it is typed.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldBinding {
    pub target: BindingTarget,
    pub kind: FieldKind,
    pub subtype: FieldSubtype,
    pub nullable: bool,
    pub datatype: Datatype,
}

///
/// LayerSchema
///

#[derive(Clone, Debug)]
pub struct LayerSchema {
    name: String,
    fields: Vec<FieldSpec>,
    geometry_type: GeometryType,
    srs: Option<Arc<dyn SpatialReference>>,
    bounds: Bounds,
    padding: Padding,
    fid_name: Option<String>,
    geometry_name: Option<String>,
    compression: Option<Compression>,
    state: SchemaState,
}

impl LayerSchema {
    /// Build the schema of a new layer.
    pub fn build(
        name: &str,
        fields: Vec<FieldSpec>,
        geometry_type: GeometryType,
        srs: Option<Arc<dyn SpatialReference>>,
        options: &LayerOptions,
    ) -> Result<Self, SchemaError> {
        if geometry_type.kind == GeometryKind::None {
            return Err(SchemaError::NoGeometry);
        }

        let fid_name = column_name(options.fid.as_deref(), DEFAULT_FID_NAME);
        let geometry_name = column_name(options.geometry_name.as_deref(), DEFAULT_GEOMETRY_NAME);
        if geometry_name.is_none() && !geometry_type.is_point() {
            return Err(SchemaError::GeometryNameRequired(geometry_type));
        }

        let mut bounds = match (options.bounds, srs.as_ref().and_then(|s| s.area_of_use())) {
            (Some(bounds), _) => bounds,
            (None, Some(area)) => Bounds::new(area.min_x, area.min_y, area.max_x, area.max_y),
            (None, None) => return Err(SchemaError::MissingBounds),
        };

        bounds.z = match (options.add_z_dim, bounds.z) {
            (Some(true), None) => {
                return Err(SchemaError::ZBoundsMismatch(
                    "ADD_Z_DIM=YES requires six BOUNDS values",
                ));
            }
            (Some(false), Some(_)) => {
                return Err(SchemaError::ZBoundsMismatch(
                    "six BOUNDS values imply a Z dimension",
                ));
            }
            (_, Some(z)) => Some(z),
            (_, None) if geometry_name.is_none() && geometry_type.has_z => Some(DEFAULT_Z_DOMAIN),
            (_, None) => None,
        };

        let padding = Padding {
            x: grid_half_step(bounds.min_x, bounds.max_x),
            y: grid_half_step(bounds.min_y, bounds.max_y),
            z: bounds.z.map_or(0.0, |(lo, hi)| grid_half_step(lo, hi)),
        };

        let mut schema = Self {
            name: name.to_string(),
            fields: Vec::with_capacity(fields.len()),
            geometry_type,
            srs,
            bounds,
            padding,
            fid_name,
            geometry_name,
            compression: options.compression,
            state: SchemaState::Open,
        };
        for field in fields {
            schema.create_field(field)?;
        }

        Ok(schema)
    }

    /// Restore the schema of a stored layer. Stored layers are frozen.
    pub fn from_stored(
        name: &str,
        array: &ArraySchema,
        metadata: &BTreeMap<String, MetadataValue>,
    ) -> Result<Self, SchemaError> {
        let invalid = |msg: &str| SchemaError::InvalidStoredSchema(format!("{name}: {msg}"));
        let float_domain = |dim: &str| {
            array
                .dimensions
                .iter()
                .find(|d| d.name == dim)
                .and_then(|d| match d.domain {
                    Domain::Float64 { lower, upper } => Some((lower, upper)),
                    Domain::Int64 { .. } => None,
                })
        };
        let meta_str = |key: &str| metadata.get(key).and_then(MetadataValue::as_str);
        let meta_f64 = |key: &str| metadata.get(key).and_then(MetadataValue::as_f64);

        let (min_x, max_x) = float_domain(DIM_X).ok_or_else(|| invalid("missing X dimension"))?;
        let (min_y, max_y) = float_domain(DIM_Y).ok_or_else(|| invalid("missing Y dimension"))?;
        let bounds = Bounds {
            min_x,
            min_y,
            max_x,
            max_y,
            z: float_domain(DIM_Z),
        };

        let fid_name = meta_str(metadata::FID_ATTRIBUTE_NAME)
            .filter(|n| array.dimension_index(n).is_some())
            .map(str::to_string)
            .or_else(|| {
                array
                    .dimensions
                    .iter()
                    .find(|d| matches!(d.domain, Domain::Int64 { .. }))
                    .map(|d| d.name.clone())
            });
        let geometry_name = meta_str(metadata::GEOMETRY_ATTRIBUTE_NAME)
            .or(Some(DEFAULT_GEOMETRY_NAME))
            .filter(|n| array.attribute_index(n).is_some())
            .map(str::to_string);

        let geometry_type = match (meta_str(metadata::GEOMETRY_TYPE), &geometry_name) {
            (Some(text), _) => text.parse().map_err(|_| invalid("bad GeometryType"))?,
            (None, Some(_)) => GeometryType::UNKNOWN,
            (None, None) if bounds.z.is_some() => GeometryType::POINT_Z,
            (None, None) => GeometryType::POINT,
        };

        let fields = match meta_str(metadata::FIELDS) {
            Some(json) => serde_json::from_str::<Vec<FieldSpec>>(json)
                .map_err(|e| invalid(&format!("bad FIELDS entry: {e}")))?,
            None => array
                .attributes
                .iter()
                .filter(|a| Some(&a.name) != geometry_name.as_ref())
                .map(storage::infer_field)
                .collect(),
        };

        let padding = Padding {
            x: meta_f64(metadata::PAD_X).unwrap_or_else(|| grid_half_step(min_x, max_x)),
            y: meta_f64(metadata::PAD_Y).unwrap_or_else(|| grid_half_step(min_y, max_y)),
            z: meta_f64(metadata::PAD_Z)
                .or_else(|| bounds.z.map(|(lo, hi)| grid_half_step(lo, hi)))
                .unwrap_or(0.0),
        };

        let compression = array
            .coords_filters
            .first()
            .and_then(|f| f.parse::<Compression>().ok());
        let srs = meta_str(metadata::CRS)
            .map(|def| Arc::new(OpaqueSrs::new(def)) as Arc<dyn SpatialReference>);

        Ok(Self {
            name: name.to_string(),
            fields,
            geometry_type,
            srs,
            bounds,
            padding,
            fid_name,
            geometry_name,
            compression,
            state: SchemaState::Frozen,
        })
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    #[must_use]
    pub const fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    #[must_use]
    pub fn srs(&self) -> Option<&dyn SpatialReference> {
        self.srs.as_deref()
    }

    #[must_use]
    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    #[must_use]
    pub const fn padding(&self) -> &Padding {
        &self.padding
    }

    #[must_use]
    pub fn fid_name(&self) -> Option<&str> {
        self.fid_name.as_deref()
    }

    #[must_use]
    pub fn geometry_name(&self) -> Option<&str> {
        self.geometry_name.as_deref()
    }

    #[must_use]
    pub const fn compression(&self) -> Option<Compression> {
        self.compression
    }

    #[must_use]
    pub const fn state(&self) -> SchemaState {
        self.state
    }

    #[must_use]
    pub const fn has_z_dimension(&self) -> bool {
        self.bounds.z.is_some()
    }

    /// Filter list applied to coordinates and every attribute.
    #[must_use]
    pub fn filter_list(&self) -> Vec<String> {
        self.compression.map(|c| vec![c.to_string()]).unwrap_or_default()
    }

    #[must_use]
    pub fn feature_defn(&self) -> FeatureDefn {
        FeatureDefn {
            fields: self.fields.clone(),
            geometry_type: self.geometry_type,
        }
    }

    ///
    /// OPERATIONS
    ///

    /// Append a field. Fails once the schema is frozen.
    pub fn create_field(&mut self, field: FieldSpec) -> Result<(), SchemaError> {
        if self.state == SchemaState::Frozen {
            return Err(SchemaError::Frozen { field: field.name });
        }
        if self.is_reserved(&field.name) {
            return Err(SchemaError::ReservedName(field.name));
        }
        if self.fields.iter().any(|f| f.name == field.name) {
            return Err(SchemaError::DuplicateField(field.name));
        }
        if !field.subtype.applies_to(field.kind.scalar()) {
            return Err(SchemaError::IllegalSubtype {
                field: field.name,
                subtype: field.subtype,
                kind: field.kind,
            });
        }

        self.fields.push(field);

        Ok(())
    }

    /// Resolve a filterable name to its storage slot.
    pub fn bind_field(&self, name: &str) -> Result<FieldBinding, SchemaError> {
        if let Some(fid) = self.fid_name.as_deref()
            && fid.eq_ignore_ascii_case(name)
        {
            return Ok(FieldBinding {
                target: BindingTarget::FidDimension {
                    name: fid.to_string(),
                },
                kind: FieldKind::INTEGER64,
                subtype: FieldSubtype::None,
                nullable: false,
                datatype: Datatype::Int64,
            });
        }

        let index = self
            .fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| SchemaError::UnknownField(name.to_string()))?;
        let field = &self.fields[index];

        Ok(FieldBinding {
            target: BindingTarget::Attribute {
                index,
                name: field.name.clone(),
            },
            kind: field.kind,
            subtype: field.subtype,
            nullable: field.nullable,
            datatype: datatype_for(field.kind.scalar(), field.subtype),
        })
    }

    /// Freeze the field list. Returns `true` on the transition only.
    pub fn finalize_on_first_write(&mut self) -> bool {
        if self.state == SchemaState::Frozen {
            return false;
        }

        self.state = SchemaState::Frozen;
        debug!(layer = %self.name, fields = self.fields.len(), "schema frozen");

        true
    }

    /// Widen padding to cover a written envelope. Returns `true` if it grew.
    pub fn observe_envelope(&mut self, env: &Envelope) -> bool {
        let (hx, hy, hz) = env.half_extents();
        let before = self.padding;

        self.padding.x = self.padding.x.max(hx);
        self.padding.y = self.padding.y.max(hy);
        if self.has_z_dimension() {
            self.padding.z = self.padding.z.max(hz);
        }

        self.padding != before
    }

    #[must_use]
    pub fn to_array_schema(&self) -> ArraySchema {
        let filters = self.filter_list();
        let spatial = |name: &str, (lower, upper): (f64, f64)| DimensionSpec {
            name: name.to_string(),
            domain: Domain::Float64 { lower, upper },
        };

        let mut dimensions = vec![
            spatial(DIM_X, (self.bounds.min_x, self.bounds.max_x)),
            spatial(DIM_Y, (self.bounds.min_y, self.bounds.max_y)),
        ];
        if let Some(z) = self.bounds.z {
            dimensions.push(spatial(DIM_Z, z));
        }
        if let Some(fid) = &self.fid_name {
            dimensions.push(DimensionSpec {
                name: fid.clone(),
                domain: Domain::Int64 {
                    lower: 0,
                    upper: i64::MAX,
                },
            });
        }

        let mut attributes: Vec<AttributeSpec> = self
            .fields
            .iter()
            .map(|f| storage::attribute_spec(f, &filters))
            .collect();
        if let Some(geometry) = &self.geometry_name {
            attributes.push(AttributeSpec {
                name: geometry.clone(),
                datatype: Datatype::Blob,
                cell_val_num: CellValNum::Var,
                nullable: false,
                filters: filters.clone(),
            });
        }

        ArraySchema {
            dimensions,
            attributes,
            coords_filters: filters,
        }
    }

    fn is_reserved(&self, name: &str) -> bool {
        [Some(DIM_X), Some(DIM_Y), Some(DIM_Z), self.fid_name(), self.geometry_name()]
            .into_iter()
            .flatten()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
    }
}

/// `None` option -> default name; empty option -> column disabled.
fn column_name(option: Option<&str>, default: &str) -> Option<String> {
    match option {
        None => Some(default.to_string()),
        Some("") => None,
        Some(name) => Some(name.to_string()),
    }
}

/// Build a layer schema; see [`LayerSchema::build`].
pub fn build_schema(
    name: &str,
    fields: Vec<FieldSpec>,
    geometry_type: GeometryType,
    srs: Option<Arc<dyn SpatialReference>>,
    options: &LayerOptions,
) -> Result<LayerSchema, SchemaError> {
    LayerSchema::build(name, fields, geometry_type, srs, options)
}
