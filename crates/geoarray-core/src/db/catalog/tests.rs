use super::*;
use crate::{
    db::{
        engine::{ArrayEngine, MemoryEngine},
        layer::LayerCapability,
        schema::Bounds,
    },
    error::ErrorClass,
    model::{field::FieldKind, geometry::Geometry},
};

const URI: &str = "mem://catalog";

fn engine() -> Arc<MemoryEngine> {
    Arc::new(MemoryEngine::new())
}

fn options() -> LayerOptions {
    LayerOptions::default().with_bounds(Bounds::new(-10.0, -10.0, 10.0, 10.0))
}

fn group(engine: &Arc<MemoryEngine>) -> Dataset {
    Dataset::create(engine.clone(), URI, DatasetOptions::default().with_group(true))
        .expect("group dataset")
}

fn add_layer(ds: &mut Dataset, name: &str) {
    ds.create_layer(
        name,
        GeometryType::POINT,
        None,
        vec![FieldSpec::new("n", FieldKind::INTEGER)],
        &options(),
    )
    .expect("layer");
}

fn names(ds: &Dataset) -> Vec<&str> {
    ds.layers().iter().map(Layer::name).collect()
}

#[test]
fn options_parse_dataset_and_open_keys() {
    let ds = DatasetOptions::parse(["create_group=yes", "BOUNDS=0,0,1,1"]).expect("dataset");
    assert!(ds.group);
    assert!(!DatasetOptions::parse(["CREATE_GROUP=NO"]).expect("no").group);
    assert!(DatasetOptions::parse(["CREATE_GROUP=maybe"]).is_err());

    let open = OpenOptions::parse(["DIM_X=_Y", "dim_y=_X", "OTHER=1"]).expect("open");
    assert_eq!(open.dim_x.as_deref(), Some("_Y"));
    assert_eq!(open.dim_y.as_deref(), Some("_X"));
    assert!(open.axes().expect("axes").is_swapped());

    let bad = OpenOptions::default().with_axes("_X", "_X");
    assert!(matches!(
        bad.axes(),
        Err(CatalogError::InvalidOpenOption { .. })
    ));
}

#[test]
fn plain_datasets_hold_a_single_layer() {
    let engine = engine();
    let mut ds = Dataset::create(engine.clone(), URI, DatasetOptions::default()).expect("ds");
    assert!(ds.test_capability(DatasetCapability::CreateLayer));

    add_layer(&mut ds, "only");
    assert!(!ds.test_capability(DatasetCapability::CreateLayer));

    let err = ds
        .create_layer("second", GeometryType::POINT, None, vec![], &options())
        .err()
        .expect("second layer rejected");
    assert!(matches!(
        err,
        Error::Catalog(CatalogError::SingleLayer { .. })
    ));
    assert_eq!(err.class(), ErrorClass::CreateLayer);

    ds.close().expect("close");
    assert_eq!(engine.object_type(URI), Some(ObjectType::Array));

    let reopened = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert_eq!(names(&reopened), vec!["only"]);
    assert!(!reopened.is_group());
}

#[test]
fn schema_failures_surface_as_create_layer_errors() {
    let engine = engine();
    let mut ds = group(&engine);

    let err = ds
        .create_layer("x", GeometryType::POINT, None, vec![], &LayerOptions::default())
        .err()
        .expect("missing bounds");
    assert!(matches!(
        err,
        Error::Catalog(CatalogError::Schema {
            source: SchemaError::MissingBounds,
            ..
        })
    ));
    assert_eq!(err.class(), ErrorClass::CreateLayer);

    for bad in ["", "a//b", "/a"] {
        assert!(
            matches!(
                ds.create_layer(bad, GeometryType::POINT, None, vec![], &options()),
                Err(Error::Catalog(CatalogError::InvalidName { .. }))
            ),
            "{bad:?}"
        );
    }

    add_layer(&mut ds, "dup");
    assert!(matches!(
        ds.create_layer("dup", GeometryType::POINT, None, vec![], &options()),
        Err(Error::Catalog(CatalogError::DuplicateLayer { .. }))
    ));
    assert_eq!(ds.layer_count(), 1);
}

#[test]
fn existing_location_and_missing_dataset_are_reported() {
    let engine = engine();
    drop(group(&engine));

    let err = Dataset::create(engine.clone(), URI, DatasetOptions::default())
        .err()
        .expect("exists");
    assert!(matches!(err, Error::Catalog(CatalogError::AlreadyExists { .. })));

    let err = Dataset::open(engine.clone(), "mem://nowhere", OpenOptions::default())
        .err()
        .expect("missing");
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn read_only_datasets_refuse_new_layers() {
    let engine = engine();
    drop(group(&engine));

    let mut ds = Dataset::open(engine.clone(), URI, OpenOptions::default().read_only())
        .expect("open");
    assert!(!ds.test_capability(DatasetCapability::CreateLayer));

    let err = ds
        .create_layer("x", GeometryType::POINT, None, vec![], &options())
        .err()
        .expect("read-only");
    assert!(matches!(err, Error::Catalog(CatalogError::ReadOnly)));
    assert_eq!(err.class(), ErrorClass::CreateLayer);
}

#[test]
fn group_layers_reopen_in_creation_order() {
    let engine = engine();
    {
        let mut ds = group(&engine);
        add_layer(&mut ds, "a");
        add_layer(&mut ds, "a/b");
        add_layer(&mut ds, "c");
    }

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert!(ds.is_group());
    assert_eq!(names(&ds), vec!["a", "a/b", "c"]);

    // a child of an existing layer sits flat in the layers group
    let members = engine
        .group_members(&format!("{URI}/layers"))
        .expect("members");
    let member_names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(member_names, vec!["a", "a/b", "c"]);
    assert_eq!(members[1].uri, format!("{URI}/layers/a/b"));
}

#[test]
fn hierarchical_names_create_intermediate_groups() {
    let engine = engine();
    {
        let mut ds = group(&engine);
        add_layer(&mut ds, "roads/major");
        add_layer(&mut ds, "roads/minor");
    }

    assert_eq!(
        engine.object_type(&format!("{URI}/layers/roads")),
        Some(ObjectType::Group)
    );

    let ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert_eq!(names(&ds), vec!["roads/major", "roads/minor"]);
}

#[test]
fn written_layers_keep_their_features_across_reopen() {
    let engine = engine();
    {
        let mut ds = group(&engine);
        add_layer(&mut ds, "empty");
        add_layer(&mut ds, "pts");

        let layer = ds.layer_by_name("pts").expect("pts");
        for i in 0..3 {
            let mut f = crate::model::feature::Feature::new(layer.feature_defn());
            f.set("n", i).expect("n");
            f.set_geometry(Some(Geometry::point(f64::from(i), 0.0)));
            layer.create_feature(&mut f).expect("write");
        }
        ds.sync().expect("sync");
    }

    let mut ds = Dataset::open(engine.clone(), URI, OpenOptions::default()).expect("open");
    assert_eq!(ds.layer_count(), 2);

    let layer = ds.layer_by_name("pts").expect("pts");
    assert_eq!(layer.feature_count().expect("count"), 3);
    assert!(layer.test_capability(LayerCapability::RandomRead));
    assert!(!layer.test_capability(LayerCapability::CreateField));

    let empty = ds.layer_by_name("empty").expect("empty");
    assert_eq!(empty.feature_count().expect("count"), 0);
}

#[test]
fn catalog_resolves_engines_by_scheme() {
    let mut registry = EngineRegistry::new();
    registry
        .register("mem", Arc::new(MemoryEngine::new()))
        .expect("register");
    let catalog = Catalog::new(registry);

    {
        let mut ds = catalog
            .create("mem://data", DatasetOptions::default())
            .expect("create");
        add_layer(&mut ds, "pts");
    }
    let ds = catalog.open("mem://data", OpenOptions::default()).expect("open");
    assert_eq!(names(&ds), vec!["pts"]);

    let err = catalog
        .create("s3://bucket", DatasetOptions::default())
        .err()
        .expect("unknown scheme");
    assert_eq!(err.class(), ErrorClass::NotFound);
}
