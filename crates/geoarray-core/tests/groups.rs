mod common;

use common::{URI, bounded, create, engine, fids, write};
use geoarray_core::{
    db::{CatalogError, Dataset, DatasetCapability, DatasetOptions, Layer, OpenOptions},
    error::{Error, ErrorClass},
    model::{
        feature::Feature,
        field::{FieldKind, FieldSpec},
        geometry::{Geometry, GeometryType},
    },
};

fn add(ds: &mut Dataset, name: &str, points: &[(f64, f64)]) {
    let layer = ds
        .create_layer(
            name,
            GeometryType::POINT,
            None,
            vec![FieldSpec::new("label", FieldKind::STRING)],
            &bounded(),
        )
        .expect(name);

    for &(x, y) in points {
        let mut f = Feature::new(layer.feature_defn());
        f.set("label", name).expect("label");
        f.set_geometry(Some(Geometry::point(x, y)));
        write(layer, f);
    }
}

fn names(ds: &Dataset) -> Vec<&str> {
    ds.layers().iter().map(Layer::name).collect()
}

#[test]
fn nested_layers_are_enumerated_independently() {
    let engine = engine();
    {
        let mut ds = create(&engine, DatasetOptions::default().with_group(true));
        add(&mut ds, "a", &[(1.0, 1.0)]);
        add(&mut ds, "a/b", &[(2.0, 2.0), (3.0, 3.0)]);
        assert_eq!(names(&ds), vec!["a", "a/b"]);
    }

    let mut ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert!(ds.is_group());
    assert_eq!(names(&ds), vec!["a", "a/b"]);

    let a = ds.layer_by_name("a").expect("a");
    assert_eq!(fids(a), vec![1]);

    let b = ds.layer_by_name("a/b").expect("a/b");
    assert_eq!(fids(b), vec![1, 2]);
    let labels: Vec<_> = b
        .features()
        .map(|f| f.expect("feature").value("label").cloned())
        .collect();
    assert!(labels.iter().all(|l| l == &Some("a/b".into())));
}

#[test]
fn a_layer_added_under_an_existing_one_reopens_after_it() {
    let engine = engine();
    {
        let mut ds = create(&engine, DatasetOptions::default().with_group(true));
        add(&mut ds, "test", &[(0.0, 0.0)]);
        add(&mut ds, "test2", &[]);
    }
    {
        let mut ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
        add(&mut ds, "test/3", &[(5.0, 5.0)]);
    }

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("reopen");
    assert_eq!(names(&ds), vec!["test", "test2", "test/3"]);
}

#[test]
fn layers_reopen_in_creation_order_when_committed_out_of_order() {
    let engine = engine();
    {
        let mut ds = create(&engine, DatasetOptions::default().with_group(true));
        add(&mut ds, "a", &[]);
        add(&mut ds, "a/b", &[]);

        let b = ds.layer_by_name("a/b").expect("a/b");
        let mut f = Feature::new(b.feature_defn());
        f.set_geometry(Some(Geometry::point(2.0, 2.0)));
        write(b, f);
        b.sync_to_disk().expect("sync a/b");
    }

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert_eq!(names(&ds), vec!["a", "a/b"]);
}

#[test]
fn layers_created_after_reopen_follow_the_existing_ones() {
    let engine = engine();
    {
        let mut ds = create(&engine, DatasetOptions::default().with_group(true));
        add(&mut ds, "first", &[]);
        add(&mut ds, "second", &[]);
        ds.layer_by_name("second")
            .expect("second")
            .sync_to_disk()
            .expect("sync second");
    }
    {
        let mut ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
        add(&mut ds, "third", &[]);
        add(&mut ds, "fourth", &[(1.0, 1.0)]);
        ds.layer_by_name("fourth")
            .expect("fourth")
            .sync_to_disk()
            .expect("sync fourth");
    }

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("reopen");
    assert_eq!(names(&ds), vec!["first", "second", "third", "fourth"]);
}

#[test]
fn plain_datasets_refuse_a_second_layer() {
    let engine = engine();
    let mut ds = create(&engine, DatasetOptions::default());
    add(&mut ds, "only", &[(0.0, 0.0)]);
    assert!(!ds.test_capability(DatasetCapability::CreateLayer));

    let err = ds
        .create_layer("second", GeometryType::POINT, None, vec![], &bounded())
        .err()
        .expect("rejected");
    assert!(matches!(
        err,
        Error::Catalog(CatalogError::SingleLayer { .. })
    ));
    assert_eq!(err.class(), ErrorClass::CreateLayer);
    assert_eq!(ds.layer_count(), 1);
}

#[test]
fn group_option_parses_from_creation_pairs() {
    let engine = engine();
    let options = DatasetOptions::parse(["CREATE_GROUP=YES"]).expect("options");
    {
        let mut ds = create(&engine, options);
        add(&mut ds, "x", &[]);
        add(&mut ds, "y", &[]);
    }

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default().read_only())
        .expect("open");
    assert_eq!(names(&ds), vec!["x", "y"]);
    assert!(!ds.test_capability(DatasetCapability::CreateLayer));
}
