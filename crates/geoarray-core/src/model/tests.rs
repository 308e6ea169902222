use crate::{
    model::{
        feature::{Feature, FeatureDefn, FeatureError},
        field::{FieldKind, FieldSpec, FieldSubtype, ScalarKind},
        geometry::{Coord, Envelope, Geometry, GeometryKind, GeometryType},
    },
    value::{FieldSlot, Value},
};
use std::sync::Arc;

fn defn() -> Arc<FeatureDefn> {
    Arc::new(FeatureDefn {
        fields: vec![
            FieldSpec::new("name", FieldKind::STRING),
            FieldSpec::new("small", FieldKind::INTEGER).with_subtype(FieldSubtype::Int16),
            FieldSpec::new("flag", FieldKind::INTEGER).with_subtype(FieldSubtype::Boolean),
            FieldSpec::new("big", FieldKind::INTEGER64),
            FieldSpec::new("ratio", FieldKind::REAL),
            FieldSpec::new("required", FieldKind::INTEGER).not_null(),
            FieldSpec::new("ints", FieldKind::List(ScalarKind::Integer)),
        ],
        geometry_type: GeometryType::POINT,
    })
}

#[test]
fn geometry_type_display_and_parse_agree() {
    for text in ["Point", "Point Z", "MultiPolygon ZM", "LineString M", "TIN Z"] {
        let parsed: GeometryType = text.parse().expect("geometry type");
        assert_eq!(parsed.to_string(), text);
    }

    let lower: GeometryType = "multilinestring z".parse().expect("lowercase");
    assert_eq!(lower, GeometryType::flat(GeometryKind::MultiLineString).with_z());

    assert!("Pointy".parse::<GeometryType>().is_err());
    assert!("Point Q".parse::<GeometryType>().is_err());
}

#[test]
fn subtype_legality() {
    assert!(FieldSubtype::Int16.applies_to(ScalarKind::Integer));
    assert!(FieldSubtype::Boolean.applies_to(ScalarKind::Integer));
    assert!(!FieldSubtype::Boolean.applies_to(ScalarKind::Integer64));
    assert!(FieldSubtype::Float32.applies_to(ScalarKind::Real));
    assert!(!FieldSubtype::Float32.applies_to(ScalarKind::Integer));
}

#[test]
fn envelope_covers_nested_parts() {
    let geometry = Geometry::collection(
        GeometryKind::GeometryCollection,
        vec![
            Geometry::point(1.0, 2.0),
            Geometry::line_string(vec![Coord::xy(-1.0, 0.0), Coord::xy(3.0, 5.0)]),
        ],
    );

    let env = geometry.envelope().expect("envelope");
    assert_eq!(env, Envelope::new(-1.0, 0.0, 3.0, 5.0));
    assert_eq!(env.center(), Coord::xy(1.0, 2.5));
    assert_eq!(env.half_extents(), (2.0, 2.5, 0.0));
}

#[test]
fn empty_geometries_have_no_envelope() {
    let empty = Geometry::empty(GeometryType::POINT);
    assert!(empty.is_empty());
    assert!(empty.envelope().is_none());

    let hollow = Geometry::collection(GeometryKind::MultiPoint, vec![]);
    assert!(hollow.is_empty());
}

#[test]
fn collection_inherits_dimensionality() {
    let multi = Geometry::collection(
        GeometryKind::MultiPoint,
        vec![Geometry::point_z(1.0, 2.0, 3.0)],
    );

    assert_eq!(multi.geometry_type.to_string(), "MultiPoint Z");
    assert_eq!(multi.envelope().and_then(|e| e.z), Some((3.0, 3.0)));
}

#[test]
fn feature_setters_check_types() {
    let mut feature = Feature::new(defn());

    feature.set("name", "abc").expect("text");
    feature.set("big", 5_i32).expect("int widens to int64");
    feature.set("ratio", 2_i64).expect("int widens to real");
    feature.set("ints", vec![1_i32, -2]).expect("list");

    assert_eq!(feature.value("big"), Some(&Value::Int64(5)));
    assert_eq!(feature.value("ratio"), Some(&Value::Real(2.0)));

    let err = feature.set("name", 3_i32).expect_err("mismatch");
    assert!(matches!(err, FeatureError::TypeMismatch { .. }));

    let err = feature.set("missing", 3_i32).expect_err("unknown");
    assert_eq!(err, FeatureError::UnknownField("missing".to_string()));
}

#[test]
fn feature_setters_check_subtype_ranges() {
    let mut feature = Feature::new(defn());

    feature.set("small", -32_768_i32).expect("int16 min");
    assert!(matches!(
        feature.set("small", 32_768_i32),
        Err(FeatureError::OutOfRange { .. })
    ));

    feature.set("flag", true).expect("bool");
    assert!(matches!(
        feature.set("flag", 2_i32),
        Err(FeatureError::OutOfRange { .. })
    ));
}

#[test]
fn null_is_rejected_on_not_null_fields() {
    let mut feature = Feature::new(defn());

    feature.set_null("name").expect("nullable");
    assert_eq!(feature.get("name"), Some(&FieldSlot::Null));
    assert_eq!(
        feature.set_null("required"),
        Err(FeatureError::NotNullable("required".to_string()))
    );
    assert_eq!(feature.get("required"), Some(&FieldSlot::Unset));
}
