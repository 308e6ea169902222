pub mod catalog;
pub mod codec;
pub mod engine;
pub mod filter;
pub mod layer;
pub mod registry;
pub mod schema;

// re-exports
pub use catalog::{Catalog, CatalogError, Dataset, DatasetCapability, DatasetOptions, OpenOptions};
pub use layer::{Access, AxisMap, Features, Layer, LayerCapability, SessionState, WriteError};
pub use registry::{EngineRegistry, RegistryError};
