mod common;

use common::{bounded, create, engine, fids, single_layer, write};
use geoarray_core::{
    db::{
        DatasetOptions, Layer,
        engine::{EngineCapabilities, MemoryEngine, OrPushdown},
        filter::Translation,
        layer::{ATTRIBUTE_FILTER_TRANSLATION, DEBUG_DOMAIN},
    },
    model::{
        feature::Feature,
        field::{FieldKind, FieldSpec, FieldSubtype},
        geometry::{Geometry, GeometryType},
    },
};
use std::sync::Arc;

// (int16field, intfield, strfield)
const ROWS: [(Option<i16>, Option<i32>, Option<&str>); 6] = [
    (Some(1), Some(10), Some("foo")),
    (None, Some(20), Some("bar")),
    (Some(-32768), Some(30), Some("foo")),
    (Some(32767), None, Some("baz")),
    (None, Some(50), None),
    (Some(5), Some(60), Some("foo")),
];

fn populate(layer: &mut Layer) {
    for (x, (small, int, text)) in (0_u8..).zip(ROWS) {
        let mut f = Feature::new(layer.feature_defn());
        if let Some(v) = small {
            f.set("int16field", i32::from(v)).expect("int16");
        }
        if let Some(v) = int {
            f.set("intfield", v).expect("int");
        }
        if let Some(v) = text {
            f.set("strfield", v).expect("str");
        }
        f.set_geometry(Some(Geometry::point(f64::from(x), 0.0)));
        write(layer, f);
    }
}

/// Run `body` against a freshly populated layer.
fn with_layer(body: impl FnOnce(&mut Layer)) {
    with_layer_on(&engine(), body);
}

fn with_layer_on(engine: &Arc<MemoryEngine>, body: impl FnOnce(&mut Layer)) {
    let mut ds = create(engine, DatasetOptions::default());
    let fields = vec![
        FieldSpec::new("int16field", FieldKind::INTEGER).with_subtype(FieldSubtype::Int16),
        FieldSpec::new("intfield", FieldKind::INTEGER),
        FieldSpec::new("strfield", FieldKind::STRING),
    ];
    let layer = single_layer(&mut ds, GeometryType::POINT, fields, &bounded());
    populate(layer);

    body(layer);
}

fn select(layer: &mut Layer, filter: &str) -> (Vec<i64>, Translation) {
    layer.set_attribute_filter(Some(filter)).expect(filter);
    let translation = layer
        .filter_translation()
        .map(|o| o.translation)
        .expect("translation");
    let ids = fids(layer);
    assert_eq!(
        layer.feature_count().expect("count"),
        ids.len() as u64,
        "{filter}"
    );

    (ids, translation)
}

#[test]
fn out_of_range_int16_literals_fold_whole() {
    with_layer(|layer| {
        assert_eq!(
            select(layer, "int16field = 32768"),
            (vec![], Translation::Whole)
        );
        assert_eq!(
            select(layer, "int16field <> 32768"),
            (vec![1, 3, 4, 6], Translation::Whole)
        );
        assert_eq!(
            select(layer, "int16field < -32769"),
            (vec![], Translation::Whole)
        );
        assert_eq!(
            select(layer, "int16field >= -32768"),
            (vec![1, 3, 4, 6], Translation::Whole)
        );

        assert_eq!(
            layer
                .metadata_item(ATTRIBUTE_FILTER_TRANSLATION, Some(DEBUG_DOMAIN))
                .expect("item")
                .as_deref(),
            Some("WHOLE")
        );
    });
}

#[test]
fn null_rows_propagate_through_conjunctions() {
    with_layer(|layer| {
        for x in ["0", "-1", "999", "1e12", "25.5"] {
            let (ids, _) = select(layer, &format!("int16field IS NULL AND intfield <> {x}"));
            assert_eq!(ids, vec![2, 5], "x = {x}");
        }

        let (repeated, _) = select(
            layer,
            "int16field IS NOT NULL AND int16field IS NOT NULL",
        );
        let (single, _) = select(layer, "int16field IS NOT NULL");
        assert_eq!(repeated, single);
        assert_eq!(single, vec![1, 3, 4, 6]);

        // null never satisfies a comparison, negated or not
        assert_eq!(select(layer, "NOT (intfield = 10)").0, vec![2, 3, 5, 6]);
        assert_eq!(select(layer, "strfield <> 'foo'").0, vec![2, 4]);
    });
}

#[test]
fn tautology_conjuncts_turn_whole_into_partial() {
    with_layer(|layer| {
        for predicate in ["intfield > 15", "strfield = 'foo'"] {
            let (alone, translation) = select(layer, predicate);
            assert_eq!(translation, Translation::Whole, "{predicate}");

            let (with_true, translation) = select(layer, &format!("{predicate} AND (1 = 1)"));
            assert_eq!(translation, Translation::Partial, "{predicate}");
            assert_eq!(with_true, alone, "{predicate}");
        }
    });
}

#[test]
fn common_filters_push_down_whole() {
    with_layer(|layer| {
        let cases: [(&str, Vec<i64>); 6] = [
            ("strfield = 'foo'", vec![1, 3, 6]),
            ("intfield >= 30", vec![3, 5, 6]),
            ("intfield IN (10, 30)", vec![1, 3]),
            ("intfield = 10 OR strfield = 'baz'", vec![1, 4]),
            ("FID > 4", vec![5, 6]),
            ("strfield IS NULL", vec![5]),
        ];

        for (filter, expected) in cases {
            assert_eq!(
                select(layer, filter),
                (expected, Translation::Whole),
                "{filter}"
            );
        }
    });
}

#[test]
fn local_only_filters_still_select_exactly() {
    with_layer(|layer| {
        assert_eq!(
            select(layer, "1 = 1"),
            (vec![1, 2, 3, 4, 5, 6], Translation::None)
        );
        assert_eq!(select(layer, "1 = 0"), (vec![], Translation::None));
        assert_eq!(
            select(layer, "intfield = int16field"),
            (vec![], Translation::None)
        );
    });
}

#[test]
fn attribute_and_spatial_filters_combine() {
    with_layer(|layer| {
        layer.set_spatial_filter_rect(2.0, -1.0, 5.0, 1.0);
        assert_eq!(fids(layer), vec![3, 4, 5, 6]);

        assert_eq!(select(layer, "strfield = 'foo'").0, vec![3, 6]);

        layer.set_spatial_filter(None);
        assert_eq!(fids(layer), vec![1, 3, 6]);
    });
}

#[test]
fn same_field_range_unions_push_down_without_full_or_support() {
    let engine = Arc::new(MemoryEngine::with_capabilities(EngineCapabilities {
        or_pushdown: OrPushdown::SameField,
        value_sets: false,
    }));

    with_layer_on(&engine, |layer| {
        assert_eq!(
            select(layer, "intfield < 15 OR intfield > 45"),
            (vec![1, 5, 6], Translation::Whole)
        );
        assert_eq!(
            select(layer, "intfield = 20 OR intfield = 30"),
            (vec![2, 3], Translation::Whole)
        );
        assert_eq!(
            select(layer, "intfield < 15 OR strfield = 'baz'"),
            (vec![1, 4], Translation::None)
        );
    });
}
