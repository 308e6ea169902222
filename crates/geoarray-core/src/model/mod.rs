//! Runtime layer model.
//!
//! Types here describe *what a layer holds*: field definitions, geometries,
//! features, and the spatial reference seam. How they map onto array storage
//! lives in `db::schema`.
pub mod feature;
pub mod field;
pub mod geometry;
pub mod srs;

#[cfg(test)]
mod tests;
