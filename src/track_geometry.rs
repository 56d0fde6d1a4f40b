/// Track geometry model and distance calculations
///
/// A track file flattens into one ordered point sequence regardless of how
/// the file nests its geometry. MultiLine sub-lines are concatenated with no
/// separator, so a seam between two sub-lines is treated like any other
/// consecutive point pair.
use geo::{point, Point};

/// Mean Earth radius in meters for haversine distance
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One recorded track point. Elevation is optional: points without an
/// elevation reading are kept in the sequence, never dropped or zeroed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: Option<f64>,
}

impl TrackPoint {
    pub fn new(longitude: f64, latitude: f64, elevation: Option<f64>) -> Self {
        TrackPoint {
            longitude,
            latitude,
            elevation,
        }
    }

    pub fn as_geo(&self) -> Point<f64> {
        point!(x: self.longitude, y: self.latitude)
    }
}

/// Nested geometry as produced by the track file readers.
#[derive(Debug, Clone)]
pub enum Geometry {
    /// A single coordinate run
    Line(Vec<TrackPoint>),
    /// Several coordinate runs that flatten back-to-back
    MultiLine(Vec<Vec<TrackPoint>>),
    /// A wrapper around one geometry (a named track, a placemark)
    Feature(Box<Geometry>),
    /// An ordered group of geometries
    Collection(Vec<Geometry>),
}

/// Flatten a geometry tree into the ordered point sequence, depth-first,
/// preserving encounter order exactly. No deduplication, no reordering.
pub fn flatten_geometry(root: &Geometry) -> Vec<TrackPoint> {
    let mut points = Vec::new();
    collect_points(root, &mut points);
    points
}

fn collect_points(node: &Geometry, out: &mut Vec<TrackPoint>) {
    match node {
        Geometry::Feature(inner) => collect_points(inner, out),
        Geometry::Collection(members) => {
            for member in members {
                collect_points(member, out);
            }
        }
        Geometry::Line(coords) => out.extend_from_slice(coords),
        Geometry::MultiLine(lines) => {
            for line in lines {
                out.extend_from_slice(line);
            }
        }
    }
}

/// Great-circle surface distance in meters between two points.
pub fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lon = (b.x() - a.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Horizontal distance in meters between two track points.
pub fn point_distance_m(a: &TrackPoint, b: &TrackPoint) -> f64 {
    haversine_m(a.as_geo(), b.as_geo())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(lon: f64, lat: f64) -> TrackPoint {
        TrackPoint::new(lon, lat, None)
    }

    #[test]
    fn test_haversine_coincident_points() {
        let a = pt(13.4, 52.5);
        assert_eq!(point_distance_m(&a, &a), 0.0);
    }

    #[test]
    fn test_haversine_symmetric() {
        let a = pt(13.4, 52.5);
        let b = pt(13.41, 52.51);
        assert_eq!(point_distance_m(&a, &b), point_distance_m(&b, &a));
    }

    #[test]
    fn test_haversine_known_distance() {
        // 0.001 degrees of latitude is about 111.19m on a 6371km sphere
        let a = pt(0.0, 0.0);
        let b = pt(0.0, 0.001);
        let d = point_distance_m(&a, &b);
        assert!((d - 111.19).abs() < 0.05, "got {}", d);
    }

    #[test]
    fn test_flatten_line_keeps_order() {
        let line = Geometry::Line(vec![pt(0.0, 0.0), pt(1.0, 1.0), pt(2.0, 2.0)]);
        let points = flatten_geometry(&line);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].longitude, 1.0);
    }

    #[test]
    fn test_flatten_feature_and_collection() {
        let root = Geometry::Collection(vec![
            Geometry::Feature(Box::new(Geometry::Line(vec![pt(0.0, 0.0)]))),
            Geometry::Line(vec![pt(1.0, 1.0)]),
        ]);
        let points = flatten_geometry(&root);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].longitude, 0.0);
        assert_eq!(points[1].longitude, 1.0);
    }

    #[test]
    fn test_flatten_multiline_seams_are_adjacent() {
        // Sub-lines concatenate with no separator even when they are not
        // geographically continuous
        let multi = Geometry::MultiLine(vec![
            vec![pt(0.0, 0.0), pt(0.001, 0.0)],
            vec![pt(5.0, 5.0), pt(5.001, 5.0)],
        ]);
        let points = flatten_geometry(&multi);
        assert_eq!(points.len(), 4);
        assert_eq!(points[1].longitude, 0.001);
        assert_eq!(points[2].longitude, 5.0);
    }

    #[test]
    fn test_flatten_empty_collection() {
        let points = flatten_geometry(&Geometry::Collection(vec![]));
        assert!(points.is_empty());
    }
}
