//! Module: layer
//! Responsibility: one open vector layer; buffered appends, filtered scans,
//! random reads, and introspection over a single array.
//! Does not own: array placement and layer enumeration (see `catalog`).
//! Boundary: every engine call for a layer's array is made from here.

mod consistency;


use crate::{
    DIM_X, DIM_Y, DIM_Z,
    config::{ConnectionConfig, NotNullPolicy},
    db::{
        codec::{CodecError, GeometryCodec},
        engine::{
            ArrayEngine, ArrayQuery, ArraySchema, Cell, CellValNum, DimensionRange, Domain,
            EngineCapabilities, Fragment, FragmentRow, MetadataValue, ResultRow, Scalar,
        },
        filter::{FilterTranslator, NativeFilter, TranslationOutcome, matches},
        schema::{LayerSchema, SchemaError, SchemaState, decode, default_cell, encode, metadata},
    },
    error::Error,
    model::{
        feature::{Feature, FeatureDefn},
        field::FieldSpec,
        geometry::{Coord, Envelope, Geometry, GeometryType},
    },
    obs::sink::{self, MetricsEvent},
    value::FieldSlot,
};
use serde_json::{Map, Value as JsonValue, json};
use std::{collections::BTreeMap, sync::Arc};
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

// re-exports
pub use consistency::SessionState;

use consistency::{FidAllocator, ReadCursor, WriteBuffer};

/// Metadata domain answering filter translation queries.
pub const DEBUG_DOMAIN: &str = "_DEBUG_";
pub const ATTRIBUTE_FILTER_TRANSLATION: &str = "ATTRIBUTE_FILTER_TRANSLATION";

///
/// WriteError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum WriteError {
    #[error("layer is opened read-only")]
    ReadOnly,

    #[error("feature has no geometry")]
    MissingGeometry,

    #[error("feature geometry is empty")]
    EmptyGeometry,

    #[error("{0} geometry cannot be stored in a dimension-only point layer")]
    NotAPoint(GeometryType),

    #[error("position ({x}, {y}) lies outside the layer bounds")]
    OutOfDomain { x: f64, y: f64 },

    #[error("feature id {fid} is not greater than the last id {last}")]
    FidNotIncreasing { fid: i64, last: i64 },

    #[error("non-nullable field '{0}' has no value")]
    NullNotAllowed(String),

    #[error("value of field '{0}' does not fit its storage type")]
    Unencodable(String),

    #[error("feature has {found} fields, layer has {expected}")]
    DefinitionMismatch { expected: usize, found: usize },
}

///
/// Access
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Access {
    ReadOnly,
    #[default]
    Update,
}

///
/// LayerCapability
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LayerCapability {
    SequentialWrite,
    CreateField,
    RandomRead,
    FastFeatureCount,
    FastGetExtent,
}

///
/// AxisMap
///
/// Which stored spatial dimension a caller sees as X. Only layers that
/// keep their points in dimensions are remapped; written points, read
/// points and spatial filter ranges all go through it.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AxisMap {
    swapped: bool,
}

impl AxisMap {
    /// `None` unless the names are the two spatial dimensions, in any order.
    #[must_use]
    pub fn from_dimensions(x: &str, y: &str) -> Option<Self> {
        match (x, y) {
            (DIM_X, DIM_Y) => Some(Self { swapped: false }),
            (DIM_Y, DIM_X) => Some(Self { swapped: true }),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_swapped(self) -> bool {
        self.swapped
    }

    const fn to_stored(self, rect: &Envelope) -> Envelope {
        if self.swapped {
            Envelope::new(rect.min_y, rect.min_x, rect.max_y, rect.max_x)
        } else {
            *rect
        }
    }
}

///
/// LayerSettings
/// Connection-level inputs shared by every layer of a dataset.
///

#[derive(Clone, Debug)]
pub(crate) struct LayerSettings {
    pub access: Access,
    pub config: ConnectionConfig,
    pub capabilities: EngineCapabilities,
    pub codec: Arc<dyn GeometryCodec>,
    pub axes: AxisMap,
}

///
/// GroupLink
/// Group registration performed when the layer's array is created.
/// `order` is the creation position, persisted so that reopening lists
/// layers in creation order whatever order their arrays were committed in.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct GroupLink {
    pub group: String,
    pub name: String,
    pub order: i64,
}

///
/// Slots
/// Positions of each layer column inside the array's coordinates and cells.
///

#[derive(Clone, Debug)]
struct Slots {
    dimensions: usize,
    attributes: usize,
    x: usize,
    y: usize,
    z: Option<usize>,
    fid: Option<usize>,
    fields: Vec<usize>,
    geometry: Option<usize>,
}

impl Slots {
    fn resolve(array: &ArraySchema, schema: &LayerSchema) -> Result<Self, SchemaError> {
        let missing = |what: &str| {
            SchemaError::InvalidStoredSchema(format!("{}: no column for {what}", schema.name()))
        };

        let fields = schema
            .fields()
            .iter()
            .map(|f| array.attribute_index(&f.name).ok_or_else(|| missing(&f.name)))
            .collect::<Result<Vec<_>, _>>()?;
        let geometry = match schema.geometry_name() {
            Some(name) => Some(array.attribute_index(name).ok_or_else(|| missing(name))?),
            None => None,
        };
        let fid = match schema.fid_name() {
            Some(name) => Some(array.dimension_index(name).ok_or_else(|| missing(name))?),
            None => None,
        };

        Ok(Self {
            dimensions: array.dimensions.len(),
            attributes: array.attributes.len(),
            x: array.dimension_index(DIM_X).ok_or_else(|| missing(DIM_X))?,
            y: array.dimension_index(DIM_Y).ok_or_else(|| missing(DIM_Y))?,
            z: array.dimension_index(DIM_Z),
            fid,
            fields,
            geometry,
        })
    }
}

///
/// ActiveFilter
///

#[derive(Clone, Debug)]
struct ActiveFilter {
    text: String,
    outcome: TranslationOutcome,
}

///
/// Layer
///
/// Appends are buffered and committed as fragments when the buffer fills,
/// before any read, on `sync_to_disk`, and on drop. The array itself is
/// created lazily, which is also when the field list freezes.
///

pub struct Layer {
    engine: Arc<dyn ArrayEngine>,
    uri: String,
    link: Option<GroupLink>,
    schema: LayerSchema,
    defn: Arc<FeatureDefn>,
    settings: LayerSettings,
    slots: Slots,
    state: SessionState,
    materialized: bool,
    schema_dirty: bool,
    buffer: WriteBuffer,
    fids: FidAllocator,
    committed: u64,
    extent: Option<Envelope>,
    cursor: ReadCursor,
    attribute_filter: Option<ActiveFilter>,
    spatial_filter: Option<Envelope>,
}

impl Layer {
    /// New layer whose array does not exist yet.
    pub(crate) fn create(
        engine: Arc<dyn ArrayEngine>,
        uri: String,
        link: Option<GroupLink>,
        schema: LayerSchema,
        settings: LayerSettings,
    ) -> Result<Self, Error> {
        let slots = Slots::resolve(&schema.to_array_schema(), &schema)?;
        let buffer = WriteBuffer::new(settings.config.write_batch_size);

        Ok(Self {
            engine,
            uri,
            link,
            defn: Arc::new(schema.feature_defn()),
            schema,
            settings,
            slots,
            state: SessionState::Idle,
            materialized: false,
            schema_dirty: false,
            buffer,
            fids: FidAllocator::default(),
            committed: 0,
            extent: None,
            cursor: ReadCursor::default(),
            attribute_filter: None,
            spatial_filter: None,
        })
    }

    /// Layer over an existing array.
    pub(crate) fn open(
        engine: Arc<dyn ArrayEngine>,
        uri: String,
        name: &str,
        settings: LayerSettings,
    ) -> Result<Self, Error> {
        let array = engine.array_schema(&uri)?;
        let stored = engine.metadata(&uri)?;
        let schema = LayerSchema::from_stored(name, &array, &stored)?;
        let slots = Slots::resolve(&array, &schema)?;

        let committed = match stored
            .get(metadata::FEATURE_COUNT)
            .and_then(MetadataValue::as_i64)
        {
            Some(count) => u64::try_from(count).unwrap_or_default(),
            None => engine.query(&uri, &ArrayQuery::default())?.len() as u64,
        };
        let last_fid = match (committed, slots.fid) {
            (0, _) => 0,
            (_, None) => i64::try_from(committed).unwrap_or(i64::MAX),
            (_, Some(index)) => {
                let last = engine.query(
                    &uri,
                    &ArrayQuery {
                        min_ordinal: committed - 1,
                        limit: Some(1),
                        ..ArrayQuery::default()
                    },
                )?;
                last.first()
                    .and_then(|row| row.coords.get(index))
                    .and_then(Scalar::as_i64)
                    .unwrap_or_default()
            }
        };

        debug!(layer = name, uri = %uri, committed, last_fid, "layer opened");

        Ok(Self {
            engine,
            uri,
            link: None,
            defn: Arc::new(schema.feature_defn()),
            schema,
            buffer: WriteBuffer::new(settings.config.write_batch_size),
            settings,
            slots,
            state: SessionState::Idle,
            materialized: true,
            schema_dirty: false,
            fids: FidAllocator::starting_after(last_fid),
            committed,
            extent: stored_extent(&stored),
            cursor: ReadCursor::default(),
            attribute_filter: None,
            spatial_filter: None,
        })
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub const fn schema(&self) -> &LayerSchema {
        &self.schema
    }

    /// Definition new features for this layer are built from.
    #[must_use]
    pub fn feature_defn(&self) -> Arc<FeatureDefn> {
        Arc::clone(&self.defn)
    }

    #[must_use]
    pub const fn geometry_type(&self) -> GeometryType {
        self.schema.geometry_type()
    }

    /// Name of the geometry column; empty when geometries live in dimensions.
    #[must_use]
    pub fn geometry_column(&self) -> &str {
        self.schema.geometry_name().unwrap_or_default()
    }

    /// Name of the feature-id column; empty when ids follow row order.
    #[must_use]
    pub fn fid_column(&self) -> &str {
        self.schema.fid_name().unwrap_or_default()
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub const fn access(&self) -> Access {
        self.settings.access
    }

    #[must_use]
    pub fn attribute_filter(&self) -> Option<&str> {
        self.attribute_filter.as_ref().map(|f| f.text.as_str())
    }

    /// Outcome of the active attribute filter's translation.
    #[must_use]
    pub fn filter_translation(&self) -> Option<&TranslationOutcome> {
        self.attribute_filter.as_ref().map(|f| &f.outcome)
    }

    #[must_use]
    pub const fn spatial_filter(&self) -> Option<&Envelope> {
        self.spatial_filter.as_ref()
    }

    #[must_use]
    pub fn test_capability(&self, capability: LayerCapability) -> bool {
        let writable = self.settings.access == Access::Update;

        match capability {
            LayerCapability::SequentialWrite => writable,
            LayerCapability::CreateField => writable && self.schema.state() == SchemaState::Open,
            LayerCapability::RandomRead | LayerCapability::FastGetExtent => true,
            LayerCapability::FastFeatureCount => {
                self.attribute_filter.is_none() && self.spatial_filter.is_none()
            }
        }
    }

    ///
    /// SCHEMA
    ///

    /// Add a field. Only legal before the first feature is written.
    pub fn create_field(&mut self, field: FieldSpec) -> Result<(), Error> {
        if self.settings.access == Access::ReadOnly {
            return Err(WriteError::ReadOnly.into());
        }

        self.schema.create_field(field)?;
        self.slots = Slots::resolve(&self.schema.to_array_schema(), &self.schema)?;
        self.defn = Arc::new(self.schema.feature_defn());

        Ok(())
    }

    ///
    /// WRITES
    ///

    /// Append a feature and return its id. The id is also set on `feature`.
    pub fn create_feature(&mut self, feature: &mut Feature) -> Result<i64, Error> {
        if self.settings.access == Access::ReadOnly {
            return Err(WriteError::ReadOnly.into());
        }
        if feature.slots().len() != self.schema.fields().len() {
            return Err(WriteError::DefinitionMismatch {
                expected: self.schema.fields().len(),
                found: feature.slots().len(),
            }
            .into());
        }

        let geometry = feature.geometry().ok_or(WriteError::MissingGeometry)?;
        let envelope = geometry.envelope().ok_or(WriteError::EmptyGeometry)?;
        let position = self.position(geometry, &envelope)?;
        let cells = self.encode_cells(feature, geometry)?;

        // Dimension-less layers number rows; caller ids are ignored there.
        let requested = self.slots.fid.and(feature.fid());
        let fid = self
            .fids
            .assign(requested)
            .map_err(|last| WriteError::FidNotIncreasing {
                fid: requested.unwrap_or_default(),
                last,
            })?;

        let mut coords = vec![Scalar::Float64(0.0); self.slots.dimensions];
        coords[self.slots.x] = Scalar::Float64(position.x);
        coords[self.slots.y] = Scalar::Float64(position.y);
        if let Some(z) = self.slots.z {
            coords[z] = Scalar::Float64(position.z.unwrap_or(0.0));
        }
        if let Some(index) = self.slots.fid {
            coords[index] = Scalar::Int64(fid);
        }

        self.schema.finalize_on_first_write();
        if self.schema.observe_envelope(&envelope) {
            self.schema_dirty = true;
        }
        match &mut self.extent {
            Some(extent) => extent.merge(&envelope),
            None => self.extent = Some(envelope),
        }

        self.buffer.push(FragmentRow { coords, cells });
        self.state = SessionState::Writing;
        feature.set_fid(Some(fid));
        sink::record(MetricsEvent::FeatureCommitted { layer: self.name() });

        if self.buffer.is_full() {
            self.flush()?;
        }

        Ok(fid)
    }

    /// Commit buffered features and make sure the array exists.
    pub fn sync_to_disk(&mut self) -> Result<(), Error> {
        if self.settings.access == Access::ReadOnly {
            return Ok(());
        }

        self.materialize()?;
        self.flush()
    }

    fn axes(&self) -> AxisMap {
        if self.slots.geometry.is_none() {
            self.settings.axes
        } else {
            AxisMap::default()
        }
    }

    // Position on the spatial dimensions: the point itself for
    // dimension-only layers, the envelope centre otherwise.
    fn position(&self, geometry: &Geometry, envelope: &Envelope) -> Result<Coord, WriteError> {
        let position = if self.slots.geometry.is_none() {
            let point = *geometry
                .as_point()
                .ok_or(WriteError::NotAPoint(geometry.geometry_type))?;
            if self.axes().is_swapped() {
                Coord {
                    x: point.y,
                    y: point.x,
                    ..point
                }
            } else {
                point
            }
        } else {
            envelope.center()
        };

        let b = self.schema.bounds();
        let inside = b.min_x <= position.x
            && position.x <= b.max_x
            && b.min_y <= position.y
            && position.y <= b.max_y
            && b.z.is_none_or(|(lo, hi)| {
                let z = position.z.unwrap_or(0.0);
                lo <= z && z <= hi
            });
        if !inside {
            return Err(WriteError::OutOfDomain {
                x: position.x,
                y: position.y,
            });
        }

        Ok(position)
    }

    fn encode_cells(
        &self,
        feature: &Feature,
        geometry: &Geometry,
    ) -> Result<Vec<Option<Cell>>, Error> {
        let mut cells = vec![None; self.slots.attributes];

        for ((spec, slot), &index) in self
            .schema
            .fields()
            .iter()
            .zip(feature.slots())
            .zip(&self.slots.fields)
        {
            cells[index] = match slot.value() {
                Some(value) => Some(
                    encode(spec, value).ok_or_else(|| WriteError::Unencodable(spec.name.clone()))?,
                ),
                None if spec.nullable => None,
                None => match self.settings.config.not_null_policy {
                    NotNullPolicy::WarnAndDefault => {
                        warn!(
                            layer = self.name(),
                            field = %spec.name,
                            "non-nullable field has no value; storing its default"
                        );
                        Some(default_cell(spec))
                    }
                    NotNullPolicy::Reject => {
                        return Err(WriteError::NullNotAllowed(spec.name.clone()).into());
                    }
                },
            };
        }

        if let Some(index) = self.slots.geometry {
            let bytes = self.settings.codec.encode(geometry)?;
            cells[index] = Some(Cell::Scalar(Scalar::Blob(bytes)));
        }

        Ok(cells)
    }

    fn materialize(&mut self) -> Result<(), Error> {
        if self.materialized {
            return Ok(());
        }

        self.schema.finalize_on_first_write();
        let array = self.schema.to_array_schema();
        self.slots = Slots::resolve(&array, &self.schema)?;
        self.engine.create_array(&self.uri, array)?;
        if let Some(link) = &self.link {
            self.engine
                .add_group_member(&link.group, &self.uri, &link.name)?;
            self.engine.put_metadata(
                &self.uri,
                metadata::LAYER_ORDER,
                MetadataValue::Int64(link.order),
            )?;
        }
        self.materialized = true;

        self.put_metadata(metadata::schema_entries(&self.schema))?;
        self.put_metadata(metadata::state_entries(self.committed, self.extent.as_ref()))?;
        self.schema_dirty = false;

        info!(layer = self.name(), uri = %self.uri, "layer array created");

        Ok(())
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.materialize()?;

        let rows = self.buffer.take();
        let count = rows.len() as u64;
        self.engine.append_fragment(&self.uri, Fragment { rows })?;
        self.committed += count;

        self.put_metadata(metadata::state_entries(self.committed, self.extent.as_ref()))?;
        if self.schema_dirty {
            self.put_metadata(metadata::schema_entries(&self.schema))?;
            self.schema_dirty = false;
        }

        debug!(
            layer = self.name(),
            rows = count,
            committed = self.committed,
            "fragment committed"
        );
        sink::record(MetricsEvent::FragmentCommitted {
            layer: self.name(),
            rows: count,
        });
        self.state = SessionState::Idle;

        Ok(())
    }

    fn put_metadata(&self, entries: Vec<(&'static str, MetadataValue)>) -> Result<(), Error> {
        for (key, value) in entries {
            self.engine.put_metadata(&self.uri, key, value)?;
        }

        Ok(())
    }

    ///
    /// READS
    ///

    pub fn reset_reading(&mut self) {
        self.cursor.reset();
        self.state = SessionState::Idle;
    }

    /// Next feature of the current scan, `None` once the pass is complete.
    pub fn get_next_feature(&mut self) -> Result<Option<Feature>, Error> {
        self.flush()?;
        self.state = SessionState::Reading;

        loop {
            if let Some(feature) = self.cursor.pop() {
                return Ok(Some(feature));
            }
            if self.cursor.is_exhausted() {
                self.state = SessionState::Idle;
                return Ok(None);
            }
            self.fetch_batch()?;
        }
    }

    /// Restart the scan and iterate it to the end.
    pub fn features(&mut self) -> Features<'_> {
        self.reset_reading();

        Features {
            layer: self,
            done: false,
        }
    }

    /// Feature by id, ignoring active filters. `None` if no such feature.
    pub fn get_feature(&mut self, fid: i64) -> Result<Option<Feature>, Error> {
        self.flush()?;
        if !self.materialized || fid < 1 {
            return Ok(None);
        }

        let ordinal = u64::try_from(fid - 1).unwrap_or_default();
        let query = match self.schema.fid_name() {
            Some(name) => ArrayQuery {
                ranges: vec![DimensionRange {
                    dimension: name.to_string(),
                    lower: Scalar::Int64(fid),
                    upper: Scalar::Int64(fid),
                }],
                limit: Some(1),
                ..ArrayQuery::default()
            },
            None => ArrayQuery {
                min_ordinal: ordinal,
                limit: Some(1),
                ..ArrayQuery::default()
            },
        };

        let rows = self.engine.query(&self.uri, &query)?;
        match rows.first() {
            Some(row) if self.slots.fid.is_some() || row.ordinal == ordinal => {
                Ok(Some(self.decode_row(row)?.0))
            }
            _ => Ok(None),
        }
    }

    /// Number of features the current filters select.
    pub fn feature_count(&mut self) -> Result<u64, Error> {
        if self.attribute_filter.is_none() && self.spatial_filter.is_none() {
            return Ok(self.committed + self.buffer.len() as u64);
        }
        self.flush()?;

        let exact = self.spatial_filter.is_none()
            && self
                .attribute_filter
                .as_ref()
                .is_some_and(|f| f.outcome.residual.is_none());
        let mut count = 0;
        let mut min_ordinal = 0;

        while let Some(query) = self.scan_query(min_ordinal) {
            let rows = self.engine.query(&self.uri, &query)?;
            let Some(last) = rows.last() else {
                break;
            };
            min_ordinal = last.ordinal + 1;

            if exact {
                count += rows.len() as u64;
            } else {
                for row in &rows {
                    if self.accept(row)?.is_some() {
                        count += 1;
                    }
                }
            }
        }

        Ok(count)
    }

    /// Union of every written feature envelope.
    pub fn extent(&mut self) -> Result<Option<Envelope>, Error> {
        self.flush()?;

        Ok(self.extent)
    }

    fn fetch_batch(&mut self) -> Result<(), Error> {
        let Some(query) = self.scan_query(self.cursor.next_ordinal()) else {
            self.cursor.finish();
            return Ok(());
        };

        let rows = self.engine.query(&self.uri, &query)?;
        sink::record(MetricsEvent::RowsScanned {
            layer: self.name(),
            rows: rows.len() as u64,
        });

        let mut features = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(feature) = self.accept(row)? {
                features.push(feature);
            }
        }
        self.cursor.advance(rows.last().map(|r| r.ordinal), features);

        Ok(())
    }

    // `None` when nothing can match: no array yet, or a statically empty filter.
    fn scan_query(&self, min_ordinal: u64) -> Option<ArrayQuery> {
        if !self.materialized {
            return None;
        }

        let condition = match self.attribute_filter.as_ref().map(|f| &f.outcome.native) {
            Some(NativeFilter::Empty) => return None,
            Some(NativeFilter::Condition(cond)) => Some(cond.clone()),
            Some(NativeFilter::Unfiltered) | None => None,
        };

        Some(ArrayQuery {
            ranges: self.spatial_ranges(),
            condition,
            min_ordinal,
            limit: Some(self.settings.config.read_batch_size.max(1)),
        })
    }

    // Padded so a feature whose envelope touches the rectangle is a candidate.
    fn spatial_ranges(&self) -> Vec<DimensionRange> {
        let Some(rect) = &self.spatial_filter else {
            return Vec::new();
        };
        let rect = self.axes().to_stored(rect);
        let pad = self.schema.padding();
        let range = |dimension: &str, lower: f64, upper: f64| DimensionRange {
            dimension: dimension.to_string(),
            lower: Scalar::Float64(lower),
            upper: Scalar::Float64(upper),
        };

        vec![
            range(DIM_X, rect.min_x - pad.x, rect.max_x + pad.x),
            range(DIM_Y, rect.min_y - pad.y, rect.max_y + pad.y),
        ]
    }

    // Exact spatial test and residual predicate on one candidate row.
    fn accept(&self, row: &ResultRow) -> Result<Option<Feature>, Error> {
        let (feature, stored_envelope) = self.decode_row(row)?;

        if let Some(rect) = &self.spatial_filter {
            let rect = self.axes().to_stored(rect);
            if !stored_envelope.is_some_and(|env| env.intersects(&rect)) {
                return Ok(None);
            }
        }
        if let Some(residual) = self
            .attribute_filter
            .as_ref()
            .and_then(|f| f.outcome.residual.as_ref())
            && !matches(residual, &self.schema, &feature)
        {
            return Ok(None);
        }

        Ok(Some(feature))
    }

    // Feature plus its envelope in stored axis order.
    fn decode_row(&self, row: &ResultRow) -> Result<(Feature, Option<Envelope>), Error> {
        let fid = match self.slots.fid {
            Some(index) => row
                .coords
                .get(index)
                .and_then(Scalar::as_i64)
                .ok_or_else(|| CodecError::Decode("row has no feature id".into()))?,
            None => i64::try_from(row.ordinal + 1).unwrap_or(i64::MAX),
        };

        let mut slots = Vec::with_capacity(self.slots.fields.len());
        for (spec, &index) in self.schema.fields().iter().zip(&self.slots.fields) {
            slots.push(match row.cells.get(index).and_then(Option::as_ref) {
                Some(cell) => FieldSlot::Value(decode(spec, cell).ok_or_else(|| {
                    CodecError::Decode(format!("cell of field '{}' has the wrong type", spec.name))
                })?),
                None => FieldSlot::Null,
            });
        }

        let (geometry, envelope) = match self.slots.geometry {
            Some(index) => match row.cells.get(index).and_then(Option::as_ref) {
                Some(Cell::Scalar(Scalar::Blob(bytes))) => {
                    let geometry = self.settings.codec.decode(bytes)?;
                    let envelope = geometry.envelope();
                    (Some(geometry), envelope)
                }
                _ => (None, None),
            },
            None => {
                let (geometry, envelope) = self.point_from_dimensions(row)?;
                (Some(geometry), Some(envelope))
            }
        };

        let feature = Feature::from_parts(Arc::clone(&self.defn), fid, slots, geometry);

        Ok((feature, envelope))
    }

    fn point_from_dimensions(&self, row: &ResultRow) -> Result<(Geometry, Envelope), CodecError> {
        let coord = |index: usize, axis: &str| {
            row.coords
                .get(index)
                .and_then(Scalar::as_f64)
                .ok_or_else(|| CodecError::Decode(format!("row has no {axis} coordinate")))
        };

        let x = coord(self.slots.x, "X")?;
        let y = coord(self.slots.y, "Y")?;
        let z = match self.slots.z {
            Some(index) if self.schema.geometry_type().has_z => Some(coord(index, "Z")?),
            _ => None,
        };

        let stored = Envelope::new(x, y, x, y);
        let (x, y) = if self.axes().is_swapped() {
            (y, x)
        } else {
            (x, y)
        };
        let geometry = match z {
            Some(z) => Geometry::point_z(x, y, z),
            None => Geometry::point(x, y),
        };

        Ok((geometry, stored))
    }

    ///
    /// FILTERS
    ///

    /// Install, replace, or clear (`None` or blank) the attribute filter.
    /// An invalid filter is rejected and the previous one stays active.
    pub fn set_attribute_filter(&mut self, text: Option<&str>) -> Result<(), Error> {
        match text.map(str::trim).filter(|t| !t.is_empty()) {
            None => self.attribute_filter = None,
            Some(text) => {
                let outcome = FilterTranslator::new(&self.schema, self.settings.capabilities)
                    .translate_text(text)?;

                debug!(
                    layer = self.name(),
                    filter = text,
                    translation = %outcome.translation,
                    native = %outcome.native,
                    "attribute filter translated"
                );
                sink::record(MetricsEvent::FilterTranslated {
                    layer: self.name(),
                    translation: outcome.translation,
                });

                self.attribute_filter = Some(ActiveFilter {
                    text: text.to_string(),
                    outcome,
                });
            }
        }
        self.reset_reading();

        Ok(())
    }

    /// Restrict scans to features whose envelope intersects the rectangle.
    pub fn set_spatial_filter_rect(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) {
        self.set_spatial_filter(Some(Envelope::new(
            min_x.min(max_x),
            min_y.min(max_y),
            min_x.max(max_x),
            min_y.max(max_y),
        )));
    }

    pub fn set_spatial_filter(&mut self, rect: Option<Envelope>) {
        self.spatial_filter = rect;
        self.reset_reading();
    }

    ///
    /// INTROSPECTION
    ///

    /// Metadata item by domain. The `_DEBUG_` domain reports the active
    /// filter's translation; the default domain reads array metadata.
    pub fn metadata_item(
        &mut self,
        key: &str,
        domain: Option<&str>,
    ) -> Result<Option<String>, Error> {
        if domain == Some(DEBUG_DOMAIN) {
            return Ok((key == ATTRIBUTE_FILTER_TRANSLATION)
                .then(|| self.filter_translation().map(|o| o.translation.to_string()))
                .flatten());
        }

        Ok(self.metadata_entries()?.remove(key).map(|value| match value {
            MetadataValue::Int64(v) => v.to_string(),
            MetadataValue::Float64(v) => v.to_string(),
            MetadataValue::Ascii(s) | MetadataValue::Utf8(s) => s,
        }))
    }

    /// Array metadata and schema as a JSON document.
    pub fn metadata_json(&mut self) -> Result<JsonValue, Error> {
        let entries = self.metadata_entries()?;
        let array = self.schema.to_array_schema();

        let metadata: Map<String, JsonValue> = entries
            .into_iter()
            .map(|(key, value)| {
                let rendered = match &value {
                    MetadataValue::Int64(v) => json!(v),
                    MetadataValue::Float64(v) => json!(v),
                    MetadataValue::Ascii(s) | MetadataValue::Utf8(s) => json!(s),
                };
                (key, json!({ "type": value.type_label(), "value": rendered }))
            })
            .collect();

        let dimensions: Vec<JsonValue> = array
            .dimensions
            .iter()
            .map(|d| {
                let (datatype, domain) = match d.domain {
                    Domain::Float64 { lower, upper } => ("FLOAT64", json!([lower, upper])),
                    Domain::Int64 { lower, upper } => ("INT64", json!([lower, upper])),
                };
                json!({ "name": d.name, "type": datatype, "domain": domain })
            })
            .collect();

        let attributes: Vec<JsonValue> = array
            .attributes
            .iter()
            .map(|a| {
                let cell_val_num = match a.cell_val_num {
                    CellValNum::Single => json!(1),
                    CellValNum::Var => json!("VAR"),
                };
                json!({
                    "name": a.name,
                    "type": a.datatype.to_string(),
                    "cell_val_num": cell_val_num,
                    "nullable": a.nullable,
                    "filter_list": a.filters,
                })
            })
            .collect();

        Ok(json!({
            "array": { "metadata": metadata },
            "schema": {
                "coords_filter_list": array.coords_filters,
                "dimensions": dimensions,
                "attributes": attributes,
            },
        }))
    }

    // Stored metadata, or what would be stored for a layer not yet created.
    fn metadata_entries(&mut self) -> Result<BTreeMap<String, MetadataValue>, Error> {
        self.flush()?;
        if self.materialized {
            return Ok(self.engine.metadata(&self.uri)?);
        }

        Ok(metadata::schema_entries(&self.schema)
            .into_iter()
            .chain(metadata::state_entries(self.committed, self.extent.as_ref()))
            .map(|(key, value)| (key.to_string(), value))
            .collect())
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        if let Err(err) = self.sync_to_disk() {
            warn!(layer = self.name(), error = %err, "failed to commit layer on close");
        }
    }
}

///
/// Features
/// Iterator over one scan pass; see [`Layer::features`].
///

pub struct Features<'a> {
    layer: &'a mut Layer,
    done: bool,
}

impl Iterator for Features<'_> {
    type Item = Result<Feature, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.layer.get_next_feature() {
            Ok(Some(feature)) => Some(Ok(feature)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

fn stored_extent(stored: &BTreeMap<String, MetadataValue>) -> Option<Envelope> {
    let get = |key: &str| stored.get(key).and_then(MetadataValue::as_f64);

    Some(Envelope::new(
        get(metadata::LAYER_EXTENT_MINX)?,
        get(metadata::LAYER_EXTENT_MINY)?,
        get(metadata::LAYER_EXTENT_MAXX)?,
        get(metadata::LAYER_EXTENT_MAXY)?,
    ))
}
