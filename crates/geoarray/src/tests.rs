use crate::prelude::*;
use crate::{ErrorOrigin, connection_config_from_toml};
use geoarray_core::{
    config::NotNullPolicy,
    db::engine::{ArrayEngine, OrPushdown},
};
use std::sync::Arc;

const URI: &str = "mem://facade";

#[test]
fn toml_settings_reach_the_connection() {
    let config = connection_config_from_toml(
        r#"
        [engine]
        or_pushdown = "unsupported"
        [write]
        batch_size = 2
        not_null_policy = "reject"
        "#,
    )
    .expect("config");

    assert_eq!(config.or_pushdown, OrPushdown::Unsupported);
    assert_eq!(config.write_batch_size, 2);
    assert_eq!(config.not_null_policy, NotNullPolicy::Reject);
    assert_eq!(
        config.read_batch_size,
        ConnectionConfig::default().read_batch_size
    );
}

#[test]
fn configured_batch_size_drives_fragment_commits() {
    let engine = Arc::new(MemoryEngine::new());
    let config = connection_config_from_toml("[write]\nbatch_size = 2").expect("config");

    let mut ds = Dataset::create(
        engine.clone(),
        URI,
        DatasetOptions::default().with_config(config),
    )
    .expect("dataset");
    let layer = ds
        .create_layer(
            "pts",
            GeometryType::POINT,
            None,
            vec![],
            &LayerOptions::default().with_bounds(Bounds::new(0.0, 0.0, 10.0, 10.0)),
        )
        .expect("layer");

    for i in 0..3 {
        let mut f = Feature::new(layer.feature_defn());
        f.set_geometry(Some(Geometry::point(f64::from(i), 1.0)));
        layer.create_feature(&mut f).expect("write");
    }
    assert_eq!(engine.fragment_count(URI).expect("fragments"), 1);

    ds.close().expect("close");
    assert_eq!(engine.fragment_count(URI).expect("fragments"), 2);
}

#[test]
fn config_errors_convert_with_config_origin() {
    let err = connection_config_from_toml("[write]\nbatch_size = 0").expect_err("invalid");
    assert_eq!(err.kind, ErrorKind::Config);
    assert_eq!(err.origin, ErrorOrigin::Config);
    assert!(err.message.contains("batch_size"));
}

#[test]
fn core_errors_keep_their_class_and_serialize() {
    let engine = Arc::new(MemoryEngine::new());
    let core = Dataset::open(engine, "mem://missing", OpenOptions::default())
        .err()
        .expect("missing");
    let message = core.to_string();

    let err = Error::from(core);
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.origin, ErrorOrigin::Catalog);
    assert_eq!(err.message, message);

    let json = serde_json::to_value(&err).expect("json");
    assert_eq!(json["kind"], "not_found");
    assert_eq!(json["origin"], "catalog");

    let back: Error = serde_json::from_value(json).expect("round trip");
    assert_eq!(back, err);
}
