use super::*;

fn schema() -> ArraySchema {
    ArraySchema {
        dimensions: vec![
            DimensionSpec {
                name: "_X".into(),
                domain: Domain::Float64 {
                    lower: 0.0,
                    upper: 10.0,
                },
            },
            DimensionSpec {
                name: "FID".into(),
                domain: Domain::Int64 {
                    lower: 0,
                    upper: 1_000,
                },
            },
        ],
        attributes: vec![
            AttributeSpec {
                name: "n".into(),
                datatype: Datatype::Int32,
                cell_val_num: CellValNum::Single,
                nullable: true,
                filters: vec![],
            },
            AttributeSpec {
                name: "t".into(),
                datatype: Datatype::TimeMs,
                cell_val_num: CellValNum::Single,
                nullable: true,
                filters: vec![],
            },
        ],
        coords_filters: vec![],
    }
}

fn row(x: f64, fid: i64, n: Option<i32>) -> FragmentRow {
    FragmentRow {
        coords: vec![Scalar::Float64(x), Scalar::Int64(fid)],
        cells: vec![n.map(|v| Cell::Scalar(Scalar::Int32(v))), None],
    }
}

fn seeded(engine: &MemoryEngine) {
    engine.create_array("mem://a", schema()).expect("create");
    engine
        .append_fragment(
            "mem://a",
            Fragment {
                rows: vec![row(1.0, 1, Some(5)), row(2.0, 2, None)],
            },
        )
        .expect("first fragment");
    engine
        .append_fragment(
            "mem://a",
            Fragment {
                rows: vec![row(3.0, 3, Some(7))],
            },
        )
        .expect("second fragment");
}

fn fids(rows: &[ResultRow]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.coords[1].as_i64()).collect()
}

#[test]
fn rows_come_back_in_commit_order_with_ordinals() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let rows = engine.query("mem://a", &ArrayQuery::default()).expect("query");
    assert_eq!(fids(&rows), vec![1, 2, 3]);
    assert_eq!(
        rows.iter().map(|r| r.ordinal).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(engine.fragment_count("mem://a"), Ok(2));
}

#[test]
fn min_ordinal_and_limit_page_through_rows() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let query = ArrayQuery {
        min_ordinal: 1,
        limit: Some(1),
        ..ArrayQuery::default()
    };
    let rows = engine.query("mem://a", &query).expect("query");
    assert_eq!(fids(&rows), vec![2]);
}

#[test]
fn ranges_are_closed_intervals() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let query = ArrayQuery {
        ranges: vec![DimensionRange {
            dimension: "_X".into(),
            lower: Scalar::Float64(2.0),
            upper: Scalar::Float64(3.0),
        }],
        ..ArrayQuery::default()
    };
    let rows = engine.query("mem://a", &query).expect("query");
    assert_eq!(fids(&rows), vec![2, 3]);
}

#[test]
fn null_cells_never_satisfy_comparisons() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let ne = ArrayQuery {
        condition: Some(QueryCondition::Compare {
            name: "n".into(),
            op: ConditionOp::Ne,
            value: Scalar::Int32(5),
        }),
        ..ArrayQuery::default()
    };
    assert_eq!(fids(&engine.query("mem://a", &ne).expect("ne")), vec![3]);

    let is_null = ArrayQuery {
        condition: Some(QueryCondition::Null {
            name: "n".into(),
            is_null: true,
        }),
        ..ArrayQuery::default()
    };
    assert_eq!(fids(&engine.query("mem://a", &is_null).expect("null")), vec![2]);
}

#[test]
fn dimension_conditions_and_value_sets() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let query = ArrayQuery {
        condition: Some(QueryCondition::InSet {
            name: "FID".into(),
            values: vec![Scalar::Int64(1), Scalar::Int64(3)],
        }),
        ..ArrayQuery::default()
    };
    assert_eq!(fids(&engine.query("mem://a", &query).expect("in")), vec![1, 3]);
}

#[test]
fn ill_typed_and_unsupported_conditions_are_rejected() {
    let engine = MemoryEngine::new();
    seeded(&engine);

    let wrong_type = ArrayQuery {
        condition: Some(QueryCondition::Compare {
            name: "n".into(),
            op: ConditionOp::Eq,
            value: Scalar::Int64(5),
        }),
        ..ArrayQuery::default()
    };
    assert!(matches!(
        engine.query("mem://a", &wrong_type),
        Err(EngineError::ConditionType { .. })
    ));

    let time_compare = ArrayQuery {
        condition: Some(QueryCondition::Compare {
            name: "t".into(),
            op: ConditionOp::Eq,
            value: Scalar::TimeMs(0),
        }),
        ..ArrayQuery::default()
    };
    assert!(matches!(
        engine.query("mem://a", &time_compare),
        Err(EngineError::Unsupported(_))
    ));
}

#[test]
fn or_capability_is_enforced() {
    let engine = MemoryEngine::with_capabilities(EngineCapabilities {
        or_pushdown: OrPushdown::SameField,
        value_sets: true,
    });
    seeded(&engine);

    let cmp = |name: &str, value: Scalar| QueryCondition::Compare {
        name: name.into(),
        op: ConditionOp::Eq,
        value,
    };

    let same = ArrayQuery {
        condition: Some(QueryCondition::Or(vec![
            cmp("n", Scalar::Int32(5)),
            cmp("n", Scalar::Int32(7)),
        ])),
        ..ArrayQuery::default()
    };
    assert_eq!(fids(&engine.query("mem://a", &same).expect("same")), vec![1, 3]);

    let across = ArrayQuery {
        condition: Some(QueryCondition::Or(vec![
            cmp("n", Scalar::Int32(5)),
            cmp("FID", Scalar::Int64(2)),
        ])),
        ..ArrayQuery::default()
    };
    assert!(matches!(
        engine.query("mem://a", &across),
        Err(EngineError::Unsupported(_))
    ));
}

#[test]
fn appends_validate_domain_and_cell_types() {
    let engine = MemoryEngine::new();
    engine.create_array("mem://a", schema()).expect("create");

    let outside = Fragment {
        rows: vec![row(11.0, 1, None)],
    };
    assert!(matches!(
        engine.append_fragment("mem://a", outside),
        Err(EngineError::OutOfDomain { .. })
    ));

    let mistyped = Fragment {
        rows: vec![FragmentRow {
            coords: vec![Scalar::Float64(1.0), Scalar::Int64(1)],
            cells: vec![Some(Cell::Scalar(Scalar::Text("x".into()))), None],
        }],
    };
    assert!(matches!(
        engine.append_fragment("mem://a", mistyped),
        Err(EngineError::SchemaMismatch { .. })
    ));
    assert_eq!(engine.fragment_count("mem://a"), Ok(0));
}

#[test]
fn groups_keep_member_order() {
    let engine = MemoryEngine::new();
    engine.create_group("mem://g").expect("group");
    engine.create_array("mem://g/b", schema()).expect("b");
    engine.create_array("mem://g/a", schema()).expect("a");
    engine.add_group_member("mem://g", "mem://g/b", "b").expect("add b");
    engine.add_group_member("mem://g", "mem://g/a", "a").expect("add a");

    let names: Vec<_> = engine
        .group_members("mem://g")
        .expect("members")
        .into_iter()
        .map(|m| m.name)
        .collect();
    assert_eq!(names, vec!["b", "a"]);

    assert_eq!(engine.object_type("mem://g"), Some(ObjectType::Group));
    assert_eq!(engine.object_type("mem://g/a"), Some(ObjectType::Array));
    assert_eq!(engine.object_type("mem://nope"), None);
    assert!(matches!(
        engine.create_group("mem://g"),
        Err(EngineError::AlreadyExists { .. })
    ));
}

#[test]
fn or_pushdown_levels_are_ordered() {
    assert!(OrPushdown::Unsupported < OrPushdown::SameField);
    assert!(OrPushdown::SameField < OrPushdown::Full);
    assert_eq!(OrPushdown::Full.min(OrPushdown::SameField), OrPushdown::SameField);
    assert_eq!(Datatype::StringUtf8.to_string(), "STRING_UTF8");
}
