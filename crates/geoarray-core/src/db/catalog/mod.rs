//! Module: catalog
//! Responsibility: datasets; where each layer's array lives, creating and
//! enumerating layers, and group hierarchy.
//! Does not own: per-layer reads and writes (see `layer`).
//! Boundary: every group object is created or walked from here.

#[cfg(test)]
mod tests;

use crate::{
    DIM_X, DIM_Y,
    config::ConnectionConfig,
    db::{
        codec::{CborGeometryCodec, GeometryCodec},
        engine::{ArrayEngine, MetadataValue, ObjectType},
        layer::{Access, AxisMap, GroupLink, Layer, LayerSettings},
        registry::EngineRegistry,
        schema::{LayerOptions, LayerSchema, SchemaError, metadata, parse_flag, split_pair},
    },
    error::Error,
    model::{field::FieldSpec, geometry::GeometryType, srs::SpatialReference},
    obs::sink::{self, MetricsEvent},
};
use std::sync::Arc;
use thiserror::Error as ThisError;
use tracing::{debug, info, warn};

/// Name of the group holding a group dataset's layers.
pub const LAYERS_GROUP: &str = "layers";

///
/// CatalogError
///

#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum CatalogError {
    #[error("dataset is opened read-only")]
    ReadOnly,

    #[error("no dataset at '{uri}'")]
    NotFound { uri: String },

    #[error("an object already exists at '{uri}'")]
    AlreadyExists { uri: String },

    #[error("dataset '{uri}' holds a single layer; create it with CREATE_GROUP=YES for more")]
    SingleLayer { uri: String },

    #[error("layer '{name}' already exists")]
    DuplicateLayer { name: String },

    #[error("invalid layer name '{name}'")]
    InvalidName { name: String },

    #[error("cannot create layer '{name}': {source}")]
    Schema {
        name: String,
        #[source]
        source: SchemaError,
    },

    #[error("invalid open option {key}={value}")]
    InvalidOpenOption { key: String, value: String },
}

///
/// DatasetCapability
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DatasetCapability {
    CreateLayer,
}

///
/// DatasetOptions
///

#[derive(Clone, Debug)]
pub struct DatasetOptions {
    /// Store layers in a group so the dataset can hold more than one.
    pub group: bool,
    pub config: ConnectionConfig,
    pub codec: Arc<dyn GeometryCodec>,
}

impl DatasetOptions {
    /// Dataset-level `KEY=VALUE` pairs; layer-level keys are skipped.
    pub fn parse<I, S>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for pair in pairs {
            let (key, value) = split_pair(pair.as_ref())?;
            if key.eq_ignore_ascii_case("CREATE_GROUP") {
                options.group = parse_flag(&key, value)?;
            }
        }

        Ok(options)
    }

    #[must_use]
    pub const fn with_group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn GeometryCodec>) -> Self {
        self.codec = codec;
        self
    }
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            group: false,
            config: ConnectionConfig::default(),
            codec: Arc::new(CborGeometryCodec),
        }
    }
}

///
/// OpenOptions
///

#[derive(Clone, Debug)]
pub struct OpenOptions {
    pub access: Access,
    /// Stored dimension read as X.
    pub dim_x: Option<String>,
    /// Stored dimension read as Y.
    pub dim_y: Option<String>,
    pub config: ConnectionConfig,
    pub codec: Arc<dyn GeometryCodec>,
}

impl OpenOptions {
    /// `DIM_X` / `DIM_Y` pairs; unknown keys are ignored with a warning.
    pub fn parse<I, S>(pairs: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::default();

        for pair in pairs {
            let (key, value) = split_pair(pair.as_ref())?;
            match key.to_ascii_uppercase().as_str() {
                "DIM_X" => options.dim_x = Some(value.to_string()),
                "DIM_Y" => options.dim_y = Some(value.to_string()),
                _ => warn!(option = %key, "ignoring unknown open option"),
            }
        }

        Ok(options)
    }

    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    #[must_use]
    pub fn with_axes(mut self, dim_x: impl Into<String>, dim_y: impl Into<String>) -> Self {
        self.dim_x = Some(dim_x.into());
        self.dim_y = Some(dim_y.into());
        self
    }

    #[must_use]
    pub const fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    fn axes(&self) -> Result<AxisMap, CatalogError> {
        let x = self.dim_x.as_deref().unwrap_or(DIM_X);
        let y = self.dim_y.as_deref().unwrap_or(DIM_Y);

        AxisMap::from_dimensions(x, y).ok_or_else(|| CatalogError::InvalidOpenOption {
            key: "DIM_X/DIM_Y".into(),
            value: format!("{x}/{y}"),
        })
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            access: Access::Update,
            dim_x: None,
            dim_y: None,
            config: ConnectionConfig::default(),
            codec: Arc::new(CborGeometryCodec),
        }
    }
}

///
/// Dataset
///
/// One connection to a storage location. A plain dataset is a single layer
/// stored at the dataset URI; a group dataset keeps its layers under
/// `<uri>/layers`. Layers are committed when the dataset is dropped, in
/// creation order.
///

pub struct Dataset {
    engine: Arc<dyn ArrayEngine>,
    uri: String,
    group: bool,
    settings: LayerSettings,
    layers: Vec<Layer>,
    next_order: i64,
}

impl Dataset {
    /// New, empty dataset at `uri`.
    pub fn create(
        engine: Arc<dyn ArrayEngine>,
        uri: &str,
        options: DatasetOptions,
    ) -> Result<Self, Error> {
        if engine.object_type(uri).is_some() {
            return Err(CatalogError::AlreadyExists {
                uri: uri.to_string(),
            }
            .into());
        }

        if options.group {
            let layers_uri = layers_uri(uri);
            engine.create_group(uri)?;
            engine.create_group(&layers_uri)?;
            engine.add_group_member(uri, &layers_uri, LAYERS_GROUP)?;
        }
        info!(uri, group = options.group, "dataset created");

        let settings = LayerSettings {
            access: Access::Update,
            capabilities: options.config.effective_capabilities(engine.capabilities()),
            config: options.config,
            codec: options.codec,
            axes: AxisMap::default(),
        };

        Ok(Self {
            engine,
            uri: uri.to_string(),
            group: options.group,
            settings,
            layers: Vec::new(),
            next_order: 0,
        })
    }

    /// Existing dataset at `uri`, with its layers in creation order.
    pub fn open(
        engine: Arc<dyn ArrayEngine>,
        uri: &str,
        options: OpenOptions,
    ) -> Result<Self, Error> {
        let settings = LayerSettings {
            access: options.access,
            capabilities: options.config.effective_capabilities(engine.capabilities()),
            axes: options.axes()?,
            config: options.config,
            codec: Arc::clone(&options.codec),
        };

        let mut dataset = Self {
            engine: Arc::clone(&engine),
            uri: uri.to_string(),
            group: false,
            settings,
            layers: Vec::new(),
            next_order: 0,
        };

        match engine.object_type(uri) {
            None => {
                return Err(CatalogError::NotFound {
                    uri: uri.to_string(),
                }
                .into());
            }
            Some(ObjectType::Array) => {
                let stored = engine.metadata(uri)?;
                let name = stored
                    .get(metadata::LAYER_NAME)
                    .and_then(MetadataValue::as_str)
                    .map_or_else(|| last_segment(uri).to_string(), str::to_string);
                let layer = Layer::open(engine, uri.to_string(), &name, dataset.settings.clone())?;
                dataset.layers.push(layer);
            }
            Some(ObjectType::Group) => {
                dataset.group = true;
                let root = engine
                    .group_members(uri)?
                    .into_iter()
                    .find(|m| {
                        m.name == LAYERS_GROUP
                            && engine.object_type(&m.uri) == Some(ObjectType::Group)
                    })
                    .map_or_else(|| uri.to_string(), |m| m.uri);
                dataset.walk(&root, "")?;
                dataset.restore_creation_order()?;
            }
        }

        debug!(uri, layers = dataset.layers.len(), "dataset opened");

        Ok(dataset)
    }

    // Open every array below `group`, depth first in registration order.
    fn walk(&mut self, group: &str, prefix: &str) -> Result<(), Error> {
        for member in self.engine.group_members(group)? {
            let name = format!("{prefix}{}", member.name);
            match self.engine.object_type(&member.uri) {
                Some(ObjectType::Array) => {
                    let layer = Layer::open(
                        Arc::clone(&self.engine),
                        member.uri,
                        &name,
                        self.settings.clone(),
                    )?;
                    self.layers.push(layer);
                }
                Some(ObjectType::Group) => self.walk(&member.uri, &format!("{name}/"))?,
                None => warn!(uri = %member.uri, "skipping dangling group member"),
            }
        }

        Ok(())
    }

    // Registration follows commit order; the stored creation position wins.
    // Layers without one keep their registration order, after the others.
    fn restore_creation_order(&mut self) -> Result<(), Error> {
        let mut orders = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let stored = self.engine.metadata(layer.uri())?;
            orders.push(stored.get(metadata::LAYER_ORDER).and_then(MetadataValue::as_i64));
        }

        let mut keyed: Vec<_> = orders.into_iter().zip(self.layers.drain(..)).collect();
        keyed.sort_by_key(|(order, _)| order.unwrap_or(i64::MAX));

        let highest = keyed.iter().filter_map(|(order, _)| *order).max();
        let count = i64::try_from(keyed.len()).unwrap_or(i64::MAX);
        self.next_order = highest.map_or(count, |h| h.saturating_add(1).max(count));
        self.layers = keyed.into_iter().map(|(_, layer)| layer).collect();

        Ok(())
    }

    ///
    /// ACCESSORS
    ///

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub const fn is_group(&self) -> bool {
        self.group
    }

    #[must_use]
    pub const fn layer_count(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn layer(&mut self, index: usize) -> Option<&mut Layer> {
        self.layers.get_mut(index)
    }

    pub fn layer_by_name(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name() == name)
    }

    #[must_use]
    pub fn test_capability(&self, capability: DatasetCapability) -> bool {
        match capability {
            DatasetCapability::CreateLayer => {
                self.settings.access == Access::Update && (self.group || self.layers.is_empty())
            }
        }
    }

    ///
    /// LAYERS
    ///

    /// Create a layer. Its array is written on first commit or close.
    pub fn create_layer(
        &mut self,
        name: &str,
        geometry_type: GeometryType,
        srs: Option<Arc<dyn SpatialReference>>,
        fields: Vec<FieldSpec>,
        options: &LayerOptions,
    ) -> Result<&mut Layer, Error> {
        if self.settings.access == Access::ReadOnly {
            return Err(CatalogError::ReadOnly.into());
        }
        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(CatalogError::InvalidName {
                name: name.to_string(),
            }
            .into());
        }
        if !self.group && !self.layers.is_empty() {
            return Err(CatalogError::SingleLayer {
                uri: self.uri.clone(),
            }
            .into());
        }
        if self.layers.iter().any(|l| l.name() == name) {
            return Err(CatalogError::DuplicateLayer {
                name: name.to_string(),
            }
            .into());
        }

        let schema = LayerSchema::build(name, fields, geometry_type, srs, options).map_err(
            |source| CatalogError::Schema {
                name: name.to_string(),
                source,
            },
        )?;

        let (uri, link) = if self.group {
            let (uri, link) = self.place(name)?;
            (uri, Some(link))
        } else {
            (self.uri.clone(), None)
        };

        let mut settings = self.settings.clone();
        if let Some(batch_size) = options.batch_size {
            settings.config.write_batch_size = batch_size;
        }

        let layer = Layer::create(Arc::clone(&self.engine), uri, link, schema, settings)?;
        info!(layer = name, uri = %layer.uri(), %geometry_type, "layer created");
        sink::record(MetricsEvent::LayerCreated { layer: name });

        let index = self.layers.len();
        self.layers.push(layer);
        self.next_order += 1;

        Ok(&mut self.layers[index])
    }

    // Array URI and group registration for a layer of a group dataset.
    // A child of an existing layer is registered flat under its full name;
    // otherwise each parent path segment becomes a group.
    fn place(&self, name: &str) -> Result<(String, GroupLink), Error> {
        let root = layers_uri(&self.uri);
        let uri = format!("{root}/{name}");
        if self.engine.object_type(&uri).is_some() {
            return Err(CatalogError::AlreadyExists { uri }.into());
        }

        let Some((parent, leaf)) = name.rsplit_once('/') else {
            let link = GroupLink {
                group: root,
                name: name.to_string(),
                order: self.next_order,
            };
            return Ok((uri, link));
        };

        let parent_is_layer = self.layers.iter().any(|l| l.name() == parent)
            || self.engine.object_type(&format!("{root}/{parent}")) == Some(ObjectType::Array);
        if parent_is_layer {
            let link = GroupLink {
                group: root,
                name: name.to_string(),
                order: self.next_order,
            };
            return Ok((uri, link));
        }

        let mut group = root;
        for segment in parent.split('/') {
            let child = format!("{group}/{segment}");
            match self.engine.object_type(&child) {
                Some(ObjectType::Group) => {}
                Some(ObjectType::Array) => {
                    return Err(CatalogError::InvalidName {
                        name: name.to_string(),
                    }
                    .into());
                }
                None => {
                    self.engine.create_group(&child)?;
                    self.engine.add_group_member(&group, &child, segment)?;
                    debug!(uri = %child, "intermediate group created");
                }
            }
            group = child;
        }

        let link = GroupLink {
            group,
            name: leaf.to_string(),
            order: self.next_order,
        };

        Ok((uri, link))
    }

    /// Commit every layer.
    pub fn sync(&mut self) -> Result<(), Error> {
        for layer in &mut self.layers {
            layer.sync_to_disk()?;
        }

        Ok(())
    }

    /// Commit every layer and close, reporting the first failure.
    pub fn close(mut self) -> Result<(), Error> {
        self.sync()
    }
}

///
/// Catalog
/// Dataset entry point resolving URIs through an [`EngineRegistry`].
///

pub struct Catalog {
    registry: EngineRegistry,
}

impl Catalog {
    #[must_use]
    pub const fn new(registry: EngineRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn create(&self, uri: &str, options: DatasetOptions) -> Result<Dataset, Error> {
        let engine = self.registry.resolve(uri)?;

        Dataset::create(engine, uri, options)
    }

    pub fn open(&self, uri: &str, options: OpenOptions) -> Result<Dataset, Error> {
        let engine = self.registry.resolve(uri)?;

        Dataset::open(engine, uri, options)
    }
}

fn layers_uri(uri: &str) -> String {
    format!("{}/{LAYERS_GROUP}", uri.trim_end_matches('/'))
}

fn last_segment(uri: &str) -> &str {
    let trimmed = uri.trim_end_matches('/');
    let path = trimmed.split_once("://").map_or(trimmed, |(_, path)| path);

    path.rsplit('/').next().unwrap_or(path)
}
