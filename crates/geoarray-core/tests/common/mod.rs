#![allow(dead_code)]

use geoarray_core::{
    db::{
        Dataset, DatasetOptions, Layer,
        engine::MemoryEngine,
        schema::{Bounds, LayerOptions},
    },
    model::{feature::Feature, field::FieldSpec, geometry::GeometryType},
};
use std::sync::Arc;

pub const URI: &str = "mem://it";

pub fn engine() -> Arc<MemoryEngine> {
    Arc::new(MemoryEngine::new())
}

pub fn bounded() -> LayerOptions {
    LayerOptions::default().with_bounds(Bounds::new(-100.0, -100.0, 100.0, 100.0))
}

pub fn create(engine: &Arc<MemoryEngine>, options: DatasetOptions) -> Dataset {
    Dataset::create(engine.clone(), URI, options).expect("create dataset")
}

pub fn single_layer<'a>(
    ds: &'a mut Dataset,
    geometry_type: GeometryType,
    fields: Vec<FieldSpec>,
    options: &LayerOptions,
) -> &'a mut Layer {
    ds.create_layer("test", geometry_type, None, fields, options)
        .expect("create layer")
}

pub fn fids(layer: &mut Layer) -> Vec<i64> {
    layer
        .features()
        .map(|f| f.expect("feature").fid().expect("fid"))
        .collect()
}

pub fn write(layer: &mut Layer, mut feature: Feature) -> i64 {
    layer.create_feature(&mut feature).expect("create feature")
}
