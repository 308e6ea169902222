//! Spatial reference seam.
//!
//! CRS representation and comparison live outside this crate. A layer only
//! needs an opaque definition string to persist and, optionally, the CRS
//! area of use (already expressed in the CRS's own axis units) to infer
//! dimension bounds when none are supplied.

use std::fmt;

///
/// SpatialReference
///

pub trait SpatialReference: fmt::Debug + Send + Sync {
    /// Persisted definition (WKT, PROJJSON, authority code, ...).
    fn definition(&self) -> &str;

    /// Area of use in native coordinates, if the CRS declares one.
    fn area_of_use(&self) -> Option<AreaOfUse> {
        None
    }
}

///
/// AreaOfUse
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaOfUse {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

///
/// OpaqueSrs
/// Definition-only spatial reference; used when reopening stored layers.
///

#[derive(Clone, Debug, PartialEq)]
pub struct OpaqueSrs {
    definition: String,
    area_of_use: Option<AreaOfUse>,
}

impl OpaqueSrs {
    #[must_use]
    pub fn new(definition: impl Into<String>) -> Self {
        Self {
            definition: definition.into(),
            area_of_use: None,
        }
    }

    #[must_use]
    pub const fn with_area_of_use(mut self, area: AreaOfUse) -> Self {
        self.area_of_use = Some(area);
        self
    }
}

impl SpatialReference for OpaqueSrs {
    fn definition(&self) -> &str {
        &self.definition
    }

    fn area_of_use(&self) -> Option<AreaOfUse> {
        self.area_of_use
    }
}
