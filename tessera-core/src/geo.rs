//! Geographic primitives: sectors and eye positions.
//!
//! A [`Sector`] is a latitude/longitude bounding rectangle in degrees. Sectors
//! are the spatial footprint of every tile in the pyramid and never wrap the
//! antimeridian.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean spherical earth radius in meters, used wherever an angular extent has
/// to be compared against a linear distance.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Errors raised when constructing a [`Sector`] from invalid bounds.
#[derive(Debug, Error, PartialEq)]
pub enum SectorError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("minimum {min} exceeds maximum {max} on the {axis} axis")]
    Inverted { axis: &'static str, min: f64, max: f64 },
}

pub type SectorResult<T> = Result<T, SectorError>;

/// A geographic bounding rectangle in degrees.
///
/// Immutable once constructed. `min <= max` holds on both axes; tiles crossing
/// the antimeridian are disallowed, so longitudes never wrap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl Sector {
    pub fn new(
        min_latitude: f64,
        max_latitude: f64,
        min_longitude: f64,
        max_longitude: f64,
    ) -> SectorResult<Self> {
        for lat in [min_latitude, max_latitude] {
            if !(-90.0..=90.0).contains(&lat) || lat.is_nan() {
                return Err(SectorError::LatitudeOutOfRange(lat));
            }
        }
        for lon in [min_longitude, max_longitude] {
            if !(-180.0..=180.0).contains(&lon) || lon.is_nan() {
                return Err(SectorError::LongitudeOutOfRange(lon));
            }
        }
        if min_latitude > max_latitude {
            return Err(SectorError::Inverted {
                axis: "latitude",
                min: min_latitude,
                max: max_latitude,
            });
        }
        if min_longitude > max_longitude {
            return Err(SectorError::Inverted {
                axis: "longitude",
                min: min_longitude,
                max: max_longitude,
            });
        }
        Ok(Self {
            min_latitude,
            max_latitude,
            min_longitude,
            max_longitude,
        })
    }

    /// The full-globe sector, the usual coverage of a level-zero pyramid.
    pub fn full_sphere() -> Self {
        Self {
            min_latitude: -90.0,
            max_latitude: 90.0,
            min_longitude: -180.0,
            max_longitude: 180.0,
        }
    }

    /// Angular width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_longitude - self.min_longitude
    }

    /// Angular height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_latitude - self.min_latitude
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            0.5 * (self.min_latitude + self.max_latitude),
            0.5 * (self.min_longitude + self.max_longitude),
        )
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }

    /// Closed-interval overlap test. Sectors sharing only an edge count as
    /// intersecting, which is the conservative choice for visibility culling.
    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_latitude <= other.max_latitude
            && self.max_latitude >= other.min_latitude
            && self.min_longitude <= other.max_longitude
            && self.max_longitude >= other.min_longitude
    }

    /// Splits this sector at its midpoints into four quadrants, ordered
    /// `[SW, SE, NW, NE]` to match child `(row, column)` offsets of
    /// `(0,0), (0,1), (1,0), (1,1)` with row 0 at the southern edge.
    ///
    /// The quadrants partition the parent exactly: shared edges reuse the
    /// same midpoint values, so there are no gaps or overlaps.
    pub fn subdivide(&self) -> [Sector; 4] {
        let (mid_lat, mid_lon) = self.centroid();
        [
            Sector {
                min_latitude: self.min_latitude,
                max_latitude: mid_lat,
                min_longitude: self.min_longitude,
                max_longitude: mid_lon,
            },
            Sector {
                min_latitude: self.min_latitude,
                max_latitude: mid_lat,
                min_longitude: mid_lon,
                max_longitude: self.max_longitude,
            },
            Sector {
                min_latitude: mid_lat,
                max_latitude: self.max_latitude,
                min_longitude: self.min_longitude,
                max_longitude: mid_lon,
            },
            Sector {
                min_latitude: mid_lat,
                max_latitude: self.max_latitude,
                min_longitude: mid_lon,
                max_longitude: self.max_longitude,
            },
        ]
    }

    /// Distance in meters from an eye position to the nearest point of this
    /// sector, on the spherical approximation. The ground distance to the
    /// clamped nearest point is combined with the eye altitude.
    pub fn distance_to(&self, eye: &Position) -> f64 {
        let lat = eye.latitude.clamp(self.min_latitude, self.max_latitude);
        let lon = eye.longitude.clamp(self.min_longitude, self.max_longitude);
        let ground = great_circle_distance(eye.latitude, eye.longitude, lat, lon);
        (ground * ground + eye.altitude * eye.altitude).sqrt()
    }
}

/// A geographic eye position: degrees latitude/longitude and altitude above
/// the surface in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Haversine great-circle distance in meters between two degree coordinates.
pub fn great_circle_distance(lat_a: f64, lon_a: f64, lat_b: f64, lon_b: f64) -> f64 {
    let phi_a = lat_a.to_radians();
    let phi_b = lat_b.to_radians();
    let d_phi = (lat_b - lat_a).to_radians();
    let d_lambda = (lon_b - lon_a).to_radians();

    let h = (0.5 * d_phi).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (0.5 * d_lambda).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        let err = Sector::new(10.0, -10.0, 0.0, 20.0).unwrap_err();
        assert_eq!(
            err,
            SectorError::Inverted {
                axis: "latitude",
                min: 10.0,
                max: -10.0
            }
        );
        assert!(Sector::new(0.0, 10.0, 30.0, 20.0).is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Sector::new(-91.0, 0.0, 0.0, 1.0).is_err());
        assert!(Sector::new(0.0, 1.0, -200.0, 0.0).is_err());
        assert!(Sector::new(0.0, 1.0, 0.0, 181.0).is_err());
    }

    #[test]
    fn subdivision_partitions_exactly() {
        let parent = Sector::new(-45.0, 0.0, 10.0, 55.0).unwrap();
        let children = parent.subdivide();
        let (mid_lat, mid_lon) = parent.centroid();

        // Southern children share the parent's min latitude, northern its max.
        assert_eq!(children[0].min_latitude, parent.min_latitude);
        assert_eq!(children[1].min_latitude, parent.min_latitude);
        assert_eq!(children[2].max_latitude, parent.max_latitude);
        assert_eq!(children[3].max_latitude, parent.max_latitude);

        // Interior edges meet at the exact same midpoint values.
        assert_eq!(children[0].max_latitude, mid_lat);
        assert_eq!(children[2].min_latitude, mid_lat);
        assert_eq!(children[0].max_longitude, mid_lon);
        assert_eq!(children[1].min_longitude, mid_lon);

        // Areas of the quadrants sum to the parent's area (angular).
        let area: f64 = children.iter().map(|c| c.width() * c.height()).sum();
        let expected = parent.width() * parent.height();
        assert!((area - expected).abs() < 1e-9);
    }

    #[test]
    fn intersection_is_closed() {
        let a = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let b = Sector::new(10.0, 20.0, 0.0, 10.0).unwrap();
        let c = Sector::new(10.1, 20.0, 0.0, 10.0).unwrap();
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn distance_clamps_to_nearest_point() {
        let sector = Sector::new(0.0, 10.0, 0.0, 10.0).unwrap();
        let inside = Position::new(5.0, 5.0, 1000.0);
        assert!((sector.distance_to(&inside) - 1000.0).abs() < 1e-6);

        // One degree of latitude south of the sector, at ground level.
        let outside = Position::new(-1.0, 5.0, 0.0);
        let one_degree = 1.0_f64.to_radians() * EARTH_RADIUS_M;
        assert!((sector.distance_to(&outside) - one_degree).abs() < 1.0);
    }
}
