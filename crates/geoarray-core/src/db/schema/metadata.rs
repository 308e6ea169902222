//! Array metadata keys persisted alongside every layer.

use crate::{
    db::{engine::MetadataValue, schema::LayerSchema},
    model::geometry::Envelope,
};

pub const FEATURE_COUNT: &str = "FEATURE_COUNT";
pub const FID_ATTRIBUTE_NAME: &str = "FID_ATTRIBUTE_NAME";
pub const GEOMETRY_ATTRIBUTE_NAME: &str = "GEOMETRY_ATTRIBUTE_NAME";
pub const GEOMETRY_TYPE: &str = "GeometryType";
pub const LAYER_EXTENT_MINX: &str = "LAYER_EXTENT_MINX";
pub const LAYER_EXTENT_MINY: &str = "LAYER_EXTENT_MINY";
pub const LAYER_EXTENT_MAXX: &str = "LAYER_EXTENT_MAXX";
pub const LAYER_EXTENT_MAXY: &str = "LAYER_EXTENT_MAXY";
pub const PAD_X: &str = "PAD_X";
pub const PAD_Y: &str = "PAD_Y";
pub const PAD_Z: &str = "PAD_Z";
pub const CRS: &str = "CRS";
pub const LAYER_NAME: &str = "LAYER_NAME";
pub const FIELDS: &str = "FIELDS";

/// Creation position of a layer inside its group dataset.
pub const LAYER_ORDER: &str = "LAYER_ORDER";

/// Entries describing the schema itself; rewritten whenever padding grows.
pub(crate) fn schema_entries(schema: &LayerSchema) -> Vec<(&'static str, MetadataValue)> {
    let mut entries = vec![
        (
            GEOMETRY_TYPE,
            MetadataValue::Ascii(schema.geometry_type().to_string()),
        ),
        (LAYER_NAME, MetadataValue::Utf8(schema.name().to_string())),
        (PAD_X, MetadataValue::Float64(schema.padding().x)),
        (PAD_Y, MetadataValue::Float64(schema.padding().y)),
    ];

    if schema.has_z_dimension() {
        entries.push((PAD_Z, MetadataValue::Float64(schema.padding().z)));
    }
    if let Some(fid) = schema.fid_name() {
        entries.push((FID_ATTRIBUTE_NAME, MetadataValue::Ascii(fid.to_string())));
    }
    if let Some(geometry) = schema.geometry_name() {
        entries.push((
            GEOMETRY_ATTRIBUTE_NAME,
            MetadataValue::Ascii(geometry.to_string()),
        ));
    }
    if let Some(srs) = schema.srs() {
        entries.push((CRS, MetadataValue::Utf8(srs.definition().to_string())));
    }
    if let Ok(fields) = serde_json::to_string(schema.fields()) {
        entries.push((FIELDS, MetadataValue::Utf8(fields)));
    }

    entries
}

/// Entries tracking committed contents.
#[expect(clippy::cast_possible_wrap)]
pub(crate) fn state_entries(
    feature_count: u64,
    extent: Option<&Envelope>,
) -> Vec<(&'static str, MetadataValue)> {
    let mut entries = vec![(FEATURE_COUNT, MetadataValue::Int64(feature_count as i64))];

    if let Some(env) = extent {
        entries.extend([
            (LAYER_EXTENT_MINX, MetadataValue::Float64(env.min_x)),
            (LAYER_EXTENT_MINY, MetadataValue::Float64(env.min_y)),
            (LAYER_EXTENT_MAXX, MetadataValue::Float64(env.max_x)),
            (LAYER_EXTENT_MAXY, MetadataValue::Float64(env.max_y)),
        ]);
    }

    entries
}
