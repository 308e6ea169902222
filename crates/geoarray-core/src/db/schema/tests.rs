use super::*;
use crate::{
    db::engine::{Cell, Scalar},
    model::{
        field::ScalarKind,
        srs::AreaOfUse,
    },
    value::{Value, parse_date, parse_datetime, parse_time},
};

fn options(pairs: &[&str]) -> LayerOptions {
    LayerOptions::parse(pairs).expect("options")
}

fn point_schema(pairs: &[&str]) -> Result<LayerSchema, SchemaError> {
    build_schema(
        "pts",
        vec![FieldSpec::new("n", FieldKind::INTEGER)],
        GeometryType::POINT,
        None,
        &options(pairs),
    )
}

#[test]
fn bounds_parse_four_or_six_values() {
    let flat: Bounds = "1,2,3,4".parse().expect("flat");
    assert_eq!(flat, Bounds::new(1.0, 2.0, 3.0, 4.0));

    let deep: Bounds = " 1, 2, 3, 4, 5, 6 ".parse().expect("deep");
    assert_eq!(deep.z, Some((5.0, 6.0)));

    for bad in ["invalid", "1,2,3", "1,2,3,4,5", "3,0,1,4", "1,2,3,inf"] {
        assert!(
            matches!(bad.parse::<Bounds>(), Err(SchemaError::MalformedBounds(_))),
            "{bad}"
        );
    }
}

#[test]
fn options_parse_case_insensitively_and_reject_bad_values() {
    let parsed = options(&[
        "bounds=0,0,10,10",
        "Compression=zstd",
        "FID=",
        "BATCH_SIZE=10",
        "SOMETHING_ELSE=1",
    ]);
    assert_eq!(parsed.compression, Some(Compression::Zstd));
    assert_eq!(parsed.fid.as_deref(), Some(""));
    assert_eq!(parsed.batch_size, Some(10));

    assert!(matches!(
        LayerOptions::parse(["BOUNDS=invalid"]),
        Err(SchemaError::MalformedBounds(_))
    ));
    assert!(matches!(
        LayerOptions::parse(["COMPRESSION=brotli"]),
        Err(SchemaError::UnknownCompression(_))
    ));
    assert!(matches!(
        LayerOptions::parse(["BATCH_SIZE=0"]),
        Err(SchemaError::InvalidOption { .. })
    ));
    assert!(matches!(
        LayerOptions::parse(["ADD_Z_DIM=maybe"]),
        Err(SchemaError::InvalidOption { .. })
    ));
}

#[test]
fn compression_names_round_trip() {
    for name in ["NONE", "GZIP", "ZSTD", "LZ4", "RLE", "BZIP2", "DOUBLE-DELTA", "DICTIONARY"] {
        let parsed: Compression = name.parse().expect("compression");
        assert_eq!(parsed.to_string(), name);
    }
}

#[test]
fn missing_bounds_fail_unless_inferred_from_srs() {
    assert_eq!(point_schema(&[]).unwrap_err(), SchemaError::MissingBounds);

    let srs = OpaqueSrs::new("EPSG:4326").with_area_of_use(AreaOfUse {
        min_x: -180.0,
        min_y: -90.0,
        max_x: 180.0,
        max_y: 90.0,
    });
    let schema = build_schema(
        "inferred",
        vec![],
        GeometryType::POINT,
        Some(Arc::new(srs)),
        &LayerOptions::default(),
    )
    .expect("inferred bounds");

    assert_eq!(schema.bounds(), &Bounds::new(-180.0, -90.0, 180.0, 90.0));
    assert_eq!(schema.srs().map(|s| s.definition()), Some("EPSG:4326"));
}

#[test]
fn geometry_type_none_is_rejected() {
    let err = build_schema(
        "none",
        vec![],
        GeometryType::NONE,
        None,
        &options(&["BOUNDS=0,0,1,1"]),
    )
    .unwrap_err();

    assert_eq!(err, SchemaError::NoGeometry);
}

#[test]
fn z_dimension_follows_bounds() {
    let deep = point_schema(&["BOUNDS=1,2,3,4,5,6", "ADD_Z_DIM=YES"]).expect("z dim");
    assert!(deep.has_z_dimension());
    assert_eq!(deep.to_array_schema().dimensions.len(), 4);

    assert!(matches!(
        point_schema(&["BOUNDS=1,2,3,4", "ADD_Z_DIM=YES"]),
        Err(SchemaError::ZBoundsMismatch(_))
    ));
    assert!(matches!(
        point_schema(&["BOUNDS=1,2,3,4,5,6", "ADD_Z_DIM=NO"]),
        Err(SchemaError::ZBoundsMismatch(_))
    ));
}

#[test]
fn dimension_only_point_z_gets_default_z_domain() {
    let schema = build_schema(
        "pz",
        vec![],
        GeometryType::POINT_Z,
        None,
        &options(&["BOUNDS=0,0,1,1", "GEOMETRY_NAME="]),
    )
    .expect("point z");

    assert_eq!(schema.bounds().z, Some(DEFAULT_Z_DOMAIN));
    assert_eq!(schema.geometry_name(), None);
    assert!(
        schema
            .to_array_schema()
            .attributes
            .iter()
            .all(|a| a.name != DEFAULT_GEOMETRY_NAME)
    );
}

#[test]
fn empty_geometry_name_requires_points() {
    let err = build_schema(
        "lines",
        vec![],
        GeometryType::flat(GeometryKind::LineString),
        None,
        &options(&["BOUNDS=0,0,1,1", "GEOMETRY_NAME="]),
    )
    .unwrap_err();

    assert!(matches!(err, SchemaError::GeometryNameRequired(_)));
}

#[test]
fn reserved_and_duplicate_names_are_rejected() {
    let mut schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");

    for reserved in ["FID", "wkb_geometry", "_X", "_Y", "_Z", "fid"] {
        assert!(
            matches!(
                schema.create_field(FieldSpec::new(reserved, FieldKind::STRING)),
                Err(SchemaError::ReservedName(_))
            ),
            "{reserved}"
        );
    }
    assert_eq!(
        schema.create_field(FieldSpec::new("n", FieldKind::STRING)),
        Err(SchemaError::DuplicateField("n".into()))
    );
}

#[test]
fn illegal_subtypes_are_rejected() {
    let mut schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");

    let err = schema
        .create_field(FieldSpec::new("f", FieldKind::INTEGER64).with_subtype(FieldSubtype::Int16))
        .unwrap_err();
    assert!(matches!(err, SchemaError::IllegalSubtype { .. }));

    schema
        .create_field(
            FieldSpec::new("bools", FieldKind::List(ScalarKind::Integer))
                .with_subtype(FieldSubtype::Boolean),
        )
        .expect("list of booleans");
}

#[test]
fn fields_freeze_on_first_write() {
    let mut schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");

    assert!(schema.finalize_on_first_write());
    assert!(!schema.finalize_on_first_write());
    assert_eq!(schema.state(), SchemaState::Frozen);
    assert_eq!(
        schema.create_field(FieldSpec::new("late", FieldKind::STRING)),
        Err(SchemaError::Frozen {
            field: "late".into()
        })
    );
}

#[test]
fn bind_field_resolves_attributes_and_fid() {
    let schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");

    let n = schema.bind_field("n").expect("n");
    assert_eq!(
        n.target,
        BindingTarget::Attribute {
            index: 0,
            name: "n".into()
        }
    );
    assert_eq!(n.datatype, Datatype::Int32);

    let fid = schema.bind_field("fid").expect("fid");
    assert_eq!(fid.target, BindingTarget::FidDimension { name: "FID".into() });
    assert!(!fid.nullable);

    assert_eq!(
        schema.bind_field("nope"),
        Err(SchemaError::UnknownField("nope".into()))
    );
}

#[test]
fn storage_mapping_follows_subtypes() {
    let cases = [
        (FieldKind::STRING, FieldSubtype::None, Datatype::StringUtf8, CellValNum::Var),
        (FieldKind::INTEGER, FieldSubtype::None, Datatype::Int32, CellValNum::Single),
        (FieldKind::INTEGER, FieldSubtype::Int16, Datatype::Int16, CellValNum::Single),
        (FieldKind::INTEGER, FieldSubtype::Boolean, Datatype::Uint8, CellValNum::Single),
        (FieldKind::INTEGER64, FieldSubtype::None, Datatype::Int64, CellValNum::Single),
        (FieldKind::REAL, FieldSubtype::Float32, Datatype::Float32, CellValNum::Single),
        (FieldKind::BINARY, FieldSubtype::None, Datatype::Blob, CellValNum::Var),
        (FieldKind::DATE, FieldSubtype::None, Datatype::DatetimeDay, CellValNum::Single),
        (FieldKind::TIME, FieldSubtype::None, Datatype::TimeMs, CellValNum::Single),
        (FieldKind::DATETIME, FieldSubtype::None, Datatype::DatetimeMs, CellValNum::Single),
        (
            FieldKind::List(ScalarKind::Real),
            FieldSubtype::None,
            Datatype::Float64,
            CellValNum::Var,
        ),
    ];

    for (kind, subtype, datatype, cell_val_num) in cases {
        let field = FieldSpec::new("f", kind).with_subtype(subtype);
        let attr = storage::attribute_spec(&field, &[]);
        assert_eq!((attr.datatype, attr.cell_val_num), (datatype, cell_val_num));
        assert_eq!(storage::infer_field(&attr), field);
    }
}

#[test]
fn encode_decode_preserves_values() {
    let cases = [
        (FieldSpec::new("s", FieldKind::STRING), Value::from("héllo")),
        (
            FieldSpec::new("i16", FieldKind::INTEGER).with_subtype(FieldSubtype::Int16),
            Value::Int32(-32_768),
        ),
        (
            FieldSpec::new("b", FieldKind::INTEGER).with_subtype(FieldSubtype::Boolean),
            Value::Int32(1),
        ),
        (FieldSpec::new("i64", FieldKind::INTEGER64), Value::Int64(i64::MIN)),
        (
            FieldSpec::new("f32", FieldKind::REAL).with_subtype(FieldSubtype::Float32),
            Value::Real(1.25),
        ),
        (FieldSpec::new("bin", FieldKind::BINARY), Value::Binary(vec![0, 255])),
        (
            FieldSpec::new("d", FieldKind::DATE),
            Value::Date(parse_date("2023-04-07").expect("date")),
        ),
        (
            FieldSpec::new("t", FieldKind::TIME),
            Value::Time(parse_time("12:34:56.789").expect("time")),
        ),
        (
            FieldSpec::new("dt", FieldKind::DATETIME),
            Value::DateTime(parse_datetime("2023-04-07T12:34:56.789Z").expect("dt")),
        ),
        (
            FieldSpec::new("li", FieldKind::List(ScalarKind::Integer64)),
            Value::from(vec![3_i64, -1, 2]),
        ),
    ];

    for (field, value) in cases {
        let cell = encode(&field, &value).expect("encode");
        assert_eq!(decode(&field, &cell), Some(value), "{}", field.name);
    }
}

#[test]
fn defaults_match_storage_types() {
    let bool_field = FieldSpec::new("b", FieldKind::INTEGER).with_subtype(FieldSubtype::Boolean);
    assert_eq!(default_cell(&bool_field), Cell::Scalar(Scalar::Uint8(0)));

    let list = FieldSpec::new("l", FieldKind::List(ScalarKind::String));
    assert_eq!(default_cell(&list), Cell::List(vec![]));
}

#[test]
fn padding_grows_with_written_envelopes() {
    let mut schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");
    let grid = 10.0 / GRID_CELLS / 2.0;
    assert_eq!(schema.padding().x, grid);

    assert!(schema.observe_envelope(&Envelope::new(1.0, 1.0, 4.0, 2.0)));
    assert_eq!(schema.padding().x, 1.5);
    assert_eq!(schema.padding().y, 0.5);
    assert!(!schema.observe_envelope(&Envelope::new(0.0, 0.0, 1.0, 1.0)));
}

#[test]
fn array_schema_applies_compression_everywhere() {
    let schema = point_schema(&["BOUNDS=0,0,10,10", "COMPRESSION=ZSTD"]).expect("schema");
    let array = schema.to_array_schema();

    assert_eq!(array.coords_filters, vec!["ZSTD".to_string()]);
    assert!(array.attributes.iter().all(|a| a.filters == ["ZSTD"]));
    assert_eq!(
        array.dimensions.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        vec!["_X", "_Y", "FID"]
    );
}

#[test]
fn stored_schema_restores_layer_definition() {
    let mut schema = build_schema(
        "restored",
        vec![
            FieldSpec::new("name", FieldKind::STRING).not_null(),
            FieldSpec::new("flag", FieldKind::INTEGER).with_subtype(FieldSubtype::Boolean),
        ],
        GeometryType::flat(GeometryKind::Polygon),
        Some(Arc::new(OpaqueSrs::new("EPSG:3857"))),
        &options(&["BOUNDS=0,0,10,10", "COMPRESSION=LZ4"]),
    )
    .expect("schema");
    schema.observe_envelope(&Envelope::new(0.0, 0.0, 2.0, 2.0));

    let metadata: BTreeMap<_, _> = metadata::schema_entries(&schema)
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    let restored =
        LayerSchema::from_stored("restored", &schema.to_array_schema(), &metadata).expect("stored");

    assert_eq!(restored.fields(), schema.fields());
    assert_eq!(restored.geometry_type(), schema.geometry_type());
    assert_eq!(restored.padding(), schema.padding());
    assert_eq!(restored.compression(), Some(Compression::Lz4));
    assert_eq!(restored.fid_name(), Some("FID"));
    assert_eq!(restored.geometry_name(), Some("wkb_geometry"));
    assert_eq!(restored.srs().map(|s| s.definition()), Some("EPSG:3857"));
    assert_eq!(restored.state(), SchemaState::Frozen);
}

#[test]
fn stored_schema_without_field_list_is_inferred() {
    let schema = point_schema(&["BOUNDS=0,0,10,10"]).expect("schema");
    let restored =
        LayerSchema::from_stored("bare", &schema.to_array_schema(), &BTreeMap::new())
            .expect("bare");

    assert_eq!(restored.fields(), schema.fields());
    assert_eq!(restored.geometry_type(), GeometryType::UNKNOWN);
    assert_eq!(restored.fid_name(), Some("FID"));
}
