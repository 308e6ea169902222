
use crate::{
    db::{
        engine::EngineCapabilities,
        filter::{FilterTranslator, TranslationOutcome},
        schema::{Bounds, LayerOptions, LayerSchema},
    },
    model::{
        field::{FieldKind, FieldSpec, FieldSubtype, ScalarKind},
        geometry::GeometryType,
    },
};

/// One field per storage shape the translator distinguishes.
fn schema() -> LayerSchema {
    let fields = vec![
        FieldSpec::new("name", FieldKind::STRING),
        FieldSpec::new("n", FieldKind::INTEGER),
        FieldSpec::new("s16", FieldKind::INTEGER)
            .with_subtype(FieldSubtype::Int16)
            .not_null(),
        FieldSpec::new("flag", FieldKind::INTEGER).with_subtype(FieldSubtype::Boolean),
        FieldSpec::new("big", FieldKind::INTEGER64),
        FieldSpec::new("ratio", FieldKind::REAL),
        FieldSpec::new("r32", FieldKind::REAL).with_subtype(FieldSubtype::Float32),
        FieldSpec::new("day", FieldKind::DATE),
        FieldSpec::new("ts", FieldKind::DATETIME),
        FieldSpec::new("tod", FieldKind::TIME),
        FieldSpec::new("blob", FieldKind::BINARY),
        FieldSpec::new("tags", FieldKind::List(ScalarKind::Integer)),
    ];

    LayerSchema::build(
        "filtered",
        fields,
        GeometryType::POINT,
        None,
        &LayerOptions::default().with_bounds(Bounds::new(0.0, 0.0, 10.0, 10.0)),
    )
    .expect("schema")
}

fn translate_with(
    schema: &LayerSchema,
    caps: EngineCapabilities,
    text: &str,
) -> TranslationOutcome {
    FilterTranslator::new(schema, caps)
        .translate_text(text)
        .unwrap_or_else(|err| panic!("{text}: {err}"))
}

fn translate(text: &str) -> TranslationOutcome {
    translate_with(&schema(), EngineCapabilities::default(), text)
}
