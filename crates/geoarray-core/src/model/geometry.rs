use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error as ThisError;

///
/// GeometryKind
/// The OGC simple-feature geometry type enumeration, minus dimensionality.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum GeometryKind {
    Unknown,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    CircularString,
    CompoundCurve,
    CurvePolygon,
    MultiCurve,
    MultiSurface,
    PolyhedralSurface,
    #[display("TIN")]
    Tin,
    Triangle,
    None,
}

impl GeometryKind {
    const ALL: [Self; 17] = [
        Self::Unknown,
        Self::Point,
        Self::LineString,
        Self::Polygon,
        Self::MultiPoint,
        Self::MultiLineString,
        Self::MultiPolygon,
        Self::GeometryCollection,
        Self::CircularString,
        Self::CompoundCurve,
        Self::CurvePolygon,
        Self::MultiCurve,
        Self::MultiSurface,
        Self::PolyhedralSurface,
        Self::Tin,
        Self::Triangle,
        Self::None,
    ];

    /// Kinds whose geometries are a sequence of child geometries.
    #[must_use]
    pub const fn is_composite(self) -> bool {
        matches!(
            self,
            Self::MultiPoint
                | Self::MultiLineString
                | Self::MultiPolygon
                | Self::GeometryCollection
                | Self::CompoundCurve
                | Self::CurvePolygon
                | Self::MultiCurve
                | Self::MultiSurface
                | Self::PolyhedralSurface
                | Self::Tin
        )
    }
}

///
/// GeometryType
/// Geometry kind plus Z/M presence, e.g. `Point Z` or `MultiPolygon ZM`.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct GeometryType {
    pub kind: GeometryKind,
    pub has_z: bool,
    pub has_m: bool,
}

impl GeometryType {
    pub const UNKNOWN: Self = Self::flat(GeometryKind::Unknown);
    pub const NONE: Self = Self::flat(GeometryKind::None);
    pub const POINT: Self = Self::flat(GeometryKind::Point);
    pub const POINT_Z: Self = Self::flat(GeometryKind::Point).with_z();

    #[must_use]
    pub const fn flat(kind: GeometryKind) -> Self {
        Self {
            kind,
            has_z: false,
            has_m: false,
        }
    }

    #[must_use]
    pub const fn with_z(mut self) -> Self {
        self.has_z = true;
        self
    }

    #[must_use]
    pub const fn with_m(mut self) -> Self {
        self.has_m = true;
        self
    }

    #[must_use]
    pub const fn is_point(self) -> bool {
        matches!(self.kind, GeometryKind::Point)
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        match (self.has_z, self.has_m) {
            (true, true) => f.write_str(" ZM"),
            (true, false) => f.write_str(" Z"),
            (false, true) => f.write_str(" M"),
            (false, false) => Ok(()),
        }
    }
}

///
/// ParseGeometryTypeError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("unrecognized geometry type: '{0}'")]
pub struct ParseGeometryTypeError(pub String);

impl FromStr for GeometryType {
    type Err = ParseGeometryTypeError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let err = || ParseGeometryTypeError(text.to_string());
        let mut words = text.split_whitespace();
        let name = words.next().ok_or_else(err)?;

        let kind = GeometryKind::ALL
            .into_iter()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(name))
            .ok_or_else(err)?;

        let mut ty = Self::flat(kind);
        match words.next().map(str::to_ascii_uppercase).as_deref() {
            None => {}
            Some("Z") => ty = ty.with_z(),
            Some("M") => ty = ty.with_m(),
            Some("ZM") => ty = ty.with_z().with_m(),
            Some(_) => return Err(err()),
        }
        if words.next().is_some() {
            return Err(err());
        }

        Ok(ty)
    }
}

///
/// Coord
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
    pub m: Option<f64>,
}

impl Coord {
    #[must_use]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: None,
            m: None,
        }
    }

    #[must_use]
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z: Some(z),
            m: None,
        }
    }

    #[must_use]
    pub const fn with_m(mut self, m: f64) -> Self {
        self.m = Some(m);
        self
    }
}

///
/// Shape
///
/// Coordinate payload of a geometry. `Rings` holds polygon and triangle
/// rings (exterior first); composite kinds nest child geometries in `Parts`.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Shape {
    Empty,
    Point(Coord),
    Path(Vec<Coord>),
    Rings(Vec<Vec<Coord>>),
    Parts(Vec<Geometry>),
}

///
/// Geometry
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Geometry {
    pub geometry_type: GeometryType,
    pub shape: Shape,
}

impl Geometry {
    #[must_use]
    pub const fn new(geometry_type: GeometryType, shape: Shape) -> Self {
        Self {
            geometry_type,
            shape,
        }
    }

    #[must_use]
    pub const fn empty(geometry_type: GeometryType) -> Self {
        Self::new(geometry_type, Shape::Empty)
    }

    #[must_use]
    pub const fn point(x: f64, y: f64) -> Self {
        Self::new(GeometryType::POINT, Shape::Point(Coord::xy(x, y)))
    }

    #[must_use]
    pub const fn point_z(x: f64, y: f64, z: f64) -> Self {
        Self::new(GeometryType::POINT_Z, Shape::Point(Coord::xyz(x, y, z)))
    }

    #[must_use]
    pub fn line_string(coords: Vec<Coord>) -> Self {
        let ty = dimensionality(GeometryKind::LineString, &coords);
        Self::new(ty, Shape::Path(coords))
    }

    #[must_use]
    pub fn polygon(rings: Vec<Vec<Coord>>) -> Self {
        let ty = dimensionality(GeometryKind::Polygon, rings.iter().flatten());
        Self::new(ty, Shape::Rings(rings))
    }

    /// Build a composite geometry; Z/M presence is inherited from the parts.
    #[must_use]
    pub fn collection(kind: GeometryKind, parts: Vec<Self>) -> Self {
        let mut ty = GeometryType::flat(kind);
        ty.has_z = parts.iter().any(|p| p.geometry_type.has_z);
        ty.has_m = parts.iter().any(|p| p.geometry_type.has_m);

        Self::new(ty, Shape::Parts(parts))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.shape {
            Shape::Empty => true,
            Shape::Point(_) => false,
            Shape::Path(coords) => coords.is_empty(),
            Shape::Rings(rings) => rings.iter().all(Vec::is_empty),
            Shape::Parts(parts) => parts.iter().all(Self::is_empty),
        }
    }

    /// Point coordinate, when this is a non-empty point.
    #[must_use]
    pub const fn as_point(&self) -> Option<&Coord> {
        match &self.shape {
            Shape::Point(coord) => Some(coord),
            _ => None,
        }
    }

    /// Bounding envelope over every coordinate; `None` when empty.
    #[must_use]
    pub fn envelope(&self) -> Option<Envelope> {
        let mut env: Option<Envelope> = None;
        self.visit_coords(&mut |c| match &mut env {
            Some(e) => e.expand(c),
            None => env = Some(Envelope::of(c)),
        });

        env
    }

    fn visit_coords(&self, f: &mut impl FnMut(&Coord)) {
        match &self.shape {
            Shape::Empty => {}
            Shape::Point(c) => f(c),
            Shape::Path(coords) => coords.iter().for_each(&mut *f),
            Shape::Rings(rings) => rings.iter().flatten().for_each(&mut *f),
            Shape::Parts(parts) => {
                for part in parts {
                    part.visit_coords(f);
                }
            }
        }
    }
}

fn dimensionality<'a>(
    kind: GeometryKind,
    coords: impl IntoIterator<Item = &'a Coord>,
) -> GeometryType {
    let mut ty = GeometryType::flat(kind);
    for c in coords {
        ty.has_z |= c.z.is_some();
        ty.has_m |= c.m.is_some();
    }

    ty
}

///
/// Envelope
/// Axis-aligned bounding box. Z bounds are present only for 3D inputs.
///

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Envelope {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub z: Option<(f64, f64)>,
}

impl Envelope {
    #[must_use]
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            z: None,
        }
    }

    #[must_use]
    pub fn of(c: &Coord) -> Self {
        Self {
            min_x: c.x,
            min_y: c.y,
            max_x: c.x,
            max_y: c.y,
            z: c.z.map(|z| (z, z)),
        }
    }

    pub fn expand(&mut self, c: &Coord) {
        self.min_x = self.min_x.min(c.x);
        self.min_y = self.min_y.min(c.y);
        self.max_x = self.max_x.max(c.x);
        self.max_y = self.max_y.max(c.y);
        if let Some(z) = c.z {
            self.z = Some(self.z.map_or((z, z), |(lo, hi)| (lo.min(z), hi.max(z))));
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
        self.z = match (self.z, other.z) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => Some((a_lo.min(b_lo), a_hi.max(b_hi))),
            (a, b) => a.or(b),
        };
    }

    /// Closed-interval intersection test on X/Y.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    #[must_use]
    pub fn center(&self) -> Coord {
        let x = f64::midpoint(self.min_x, self.max_x);
        let y = f64::midpoint(self.min_y, self.max_y);

        match self.z {
            Some((lo, hi)) => Coord::xyz(x, y, f64::midpoint(lo, hi)),
            None => Coord::xy(x, y),
        }
    }

    /// Half extents per axis as `(x, y, z)`.
    #[must_use]
    pub fn half_extents(&self) -> (f64, f64, f64) {
        (
            (self.max_x - self.min_x) / 2.0,
            (self.max_y - self.min_y) / 2.0,
            self.z.map_or(0.0, |(lo, hi)| (hi - lo) / 2.0),
        )
    }
}
