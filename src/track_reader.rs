/// Track file readers
///
/// Turns GPX and KML files into the nested geometry model. Each GPX track
/// becomes a feature wrapping a multi-line (one sub-line per trkseg); each
/// KML placemark becomes a feature wrapping the line strings it contains.
/// Points, waypoints and other non-line geometry carry no track data and
/// are ignored.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::track_geometry::{Geometry, TrackPoint};

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read track file: {0}")]
    Io(#[from] std::io::Error),
    #[error("GPX parse error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("KML parse error: {0}")]
    Kml(#[from] quick_xml::Error),
    #[error("unsupported track format: {0}")]
    UnsupportedFormat(String),
    #[error("no line coordinates found in track file")]
    NoCoordinates,
}

/// Load a track file, dispatching on the file extension.
pub fn load_track_geometry(path: &Path) -> Result<Geometry, TrackError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("gpx") => read_gpx_geometry(path),
        Some("kml") => read_kml_geometry(path),
        other => Err(TrackError::UnsupportedFormat(
            other.unwrap_or("(none)").to_string(),
        )),
    }
}

fn read_gpx_geometry(path: &Path) -> Result<Geometry, TrackError> {
    let file = File::open(path)?;
    let gpx = gpx::read(BufReader::new(file))?;
    geometry_from_gpx(&gpx)
}

pub(crate) fn geometry_from_gpx(gpx: &gpx::Gpx) -> Result<Geometry, TrackError> {
    let mut features = Vec::new();

    for track in &gpx.tracks {
        let lines: Vec<Vec<TrackPoint>> = track
            .segments
            .iter()
            .map(|segment| segment.points.iter().map(waypoint_to_track_point).collect())
            .collect();
        features.push(Geometry::Feature(Box::new(Geometry::MultiLine(lines))));
    }

    for route in &gpx.routes {
        let line: Vec<TrackPoint> = route.points.iter().map(waypoint_to_track_point).collect();
        features.push(Geometry::Feature(Box::new(Geometry::Line(line))));
    }

    if features.is_empty() {
        return Err(TrackError::NoCoordinates);
    }
    Ok(Geometry::Collection(features))
}

fn waypoint_to_track_point(waypoint: &gpx::Waypoint) -> TrackPoint {
    TrackPoint::new(
        waypoint.point().x(),
        waypoint.point().y(),
        waypoint.elevation,
    )
}

fn read_kml_geometry(path: &Path) -> Result<Geometry, TrackError> {
    let content = std::fs::read_to_string(path)?;
    parse_kml(&content)
}

/// Event-driven KML scan. Only `<LineString><coordinates>` carries track
/// data; coordinates inside `<Point>` (waypoint placemarks) are skipped.
pub(crate) fn parse_kml(content: &str) -> Result<Geometry, TrackError> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut features: Vec<Geometry> = Vec::new();
    let mut placemark_lines: Vec<Vec<TrackPoint>> = Vec::new();
    let mut in_placemark = false;
    let mut in_linestring = false;
    let mut in_coordinates = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => match e.name().as_ref() {
                b"Placemark" => {
                    in_placemark = true;
                    placemark_lines.clear();
                }
                b"LineString" => in_linestring = true,
                b"coordinates" => in_coordinates = true,
                _ => {}
            },
            Event::Text(ref t) if in_linestring && in_coordinates => {
                let text = t.unescape()?;
                push_coordinate_line(&text, in_placemark, &mut placemark_lines, &mut features);
            }
            Event::CData(ref t) if in_linestring && in_coordinates => {
                let text = String::from_utf8_lossy(t);
                push_coordinate_line(&text, in_placemark, &mut placemark_lines, &mut features);
            }
            Event::End(ref e) => match e.name().as_ref() {
                b"coordinates" => in_coordinates = false,
                b"LineString" => in_linestring = false,
                b"Placemark" => {
                    in_placemark = false;
                    if placemark_lines.len() > 1 {
                        features.push(Geometry::Feature(Box::new(Geometry::MultiLine(
                            std::mem::take(&mut placemark_lines),
                        ))));
                    } else if let Some(line) = placemark_lines.pop() {
                        features.push(Geometry::Feature(Box::new(Geometry::Line(line))));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if features.is_empty() {
        return Err(TrackError::NoCoordinates);
    }
    Ok(Geometry::Collection(features))
}

fn push_coordinate_line(
    text: &str,
    in_placemark: bool,
    placemark_lines: &mut Vec<Vec<TrackPoint>>,
    features: &mut Vec<Geometry>,
) {
    let line = parse_coordinate_list(text);
    if line.is_empty() {
        return;
    }
    if in_placemark {
        placemark_lines.push(line);
    } else {
        features.push(Geometry::Feature(Box::new(Geometry::Line(line))));
    }
}

/// Parse a whitespace-separated list of `lon,lat[,ele]` tuples. Malformed
/// tuples are skipped rather than failing the whole file.
fn parse_coordinate_list(text: &str) -> Vec<TrackPoint> {
    text.split_whitespace()
        .filter_map(|tuple| {
            let mut parts = tuple.split(',');
            let longitude = parts.next()?.trim().parse::<f64>().ok()?;
            let latitude = parts.next()?.trim().parse::<f64>().ok()?;
            let elevation = parts.next().and_then(|e| e.trim().parse::<f64>().ok());
            Some(TrackPoint::new(longitude, latitude, elevation))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track_geometry::flatten_geometry;

    const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk>
    <name>Two segment track</name>
    <trkseg>
      <trkpt lat="45.5" lon="-122.5"><ele>100</ele></trkpt>
      <trkpt lat="45.51" lon="-122.51"><ele>110</ele></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="46.0" lon="-123.0"><ele>200</ele></trkpt>
      <trkpt lat="46.01" lon="-123.01"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const SAMPLE_KML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
    <Placemark>
      <name>climb</name>
      <LineString>
        <coordinates>
          13.4,52.5,100 13.41,52.51,120
        </coordinates>
      </LineString>
    </Placemark>
    <Placemark>
      <name>marker</name>
      <Point><coordinates>13.4,52.5,100</coordinates></Point>
    </Placemark>
    <Placemark>
      <MultiGeometry>
        <LineString>
          <coordinates>0.0,0.0 0.001,0.0,5</coordinates>
        </LineString>
        <LineString>
          <coordinates>5.0,5.0,50 5.001,5.0,55</coordinates>
        </LineString>
      </MultiGeometry>
    </Placemark>
  </Document>
</kml>"#;

    #[test]
    fn test_gpx_trksegs_become_multiline_sublines() {
        let gpx = gpx::read(SAMPLE_GPX.as_bytes()).unwrap();
        let geometry = geometry_from_gpx(&gpx).unwrap();
        let points = flatten_geometry(&geometry);

        assert_eq!(points.len(), 4);
        assert_eq!(points[0].elevation, Some(100.0));
        assert!((points[0].longitude - (-122.5)).abs() < 1e-9);
        assert!((points[0].latitude - 45.5).abs() < 1e-9);
        // the trkseg seam is an ordinary consecutive pair
        assert_eq!(points[2].elevation, Some(200.0));
        // a trkpt without <ele> stays elevation-less
        assert_eq!(points[3].elevation, None);
    }

    #[test]
    fn test_gpx_without_tracks_or_routes_is_an_error() {
        let empty = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t">
  <wpt lat="45.5" lon="-122.5"><ele>100</ele></wpt>
</gpx>"#;
        let gpx = gpx::read(empty.as_bytes()).unwrap();
        assert!(matches!(
            geometry_from_gpx(&gpx),
            Err(TrackError::NoCoordinates)
        ));
    }

    #[test]
    fn test_kml_linestrings_and_multigeometry() {
        let geometry = parse_kml(SAMPLE_KML).unwrap();
        let points = flatten_geometry(&geometry);

        // 2 from the first placemark, 4 from the multi-geometry; the Point
        // placemark contributes nothing
        assert_eq!(points.len(), 6);
        assert_eq!(points[0].elevation, Some(100.0));
        assert!((points[0].longitude - 13.4).abs() < 1e-9);
        // tuple without an elevation value
        assert_eq!(points[2].elevation, None);
        // multi-geometry sub-lines are adjacent in the flattened sequence
        assert!((points[3].longitude - 0.001).abs() < 1e-9);
        assert!((points[4].longitude - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_kml_without_linestrings_is_an_error() {
        let kml = r#"<kml><Document><Placemark>
            <Point><coordinates>1,2,3</coordinates></Point>
        </Placemark></Document></kml>"#;
        assert!(matches!(parse_kml(kml), Err(TrackError::NoCoordinates)));
    }

    #[test]
    fn test_coordinate_list_skips_malformed_tuples() {
        let points = parse_coordinate_list("1.0,2.0,3.0 garbage 4.0,5.0");
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].elevation, Some(3.0));
        assert_eq!(points[1].elevation, None);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = load_track_geometry(Path::new("ride.fit")).unwrap_err();
        assert!(matches!(err, TrackError::UnsupportedFormat(_)));
    }
}
