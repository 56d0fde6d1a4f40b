/// Segment export
///
/// Writes admitted segments back out as GPX or KML, and builds the merged
/// KML document that overlays the graded segments and their start/end
/// markers on the full track.
use std::io::Cursor;

use chrono::Local;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::climb_analyzer::ClimbSegment;
use crate::grade::GradeCountdown;
use crate::segment_report::grade_label;
use crate::track_geometry::TrackPoint;

const KML_NS: &str = "http://www.opengis.net/kml/2.2";
const GPX_VERSION: &str = "1.1";
const GPX_CREATOR: &str = "rust-climb-analyzer";

/// KML line styles, id and aabbggrr color. The gray track style doubles as
/// the fallback for unclassified segments.
const TRACK_STYLE: (&str, &str) = ("styleTrack", "7f7f7f7f");
const GRADE_STYLES: [(&str, &str); 4] = [
    ("styleS", "ffff00ff"),
    ("styleA", "ff0000ff"),
    ("styleB", "ff00a5ff"),
    ("styleC", "ff00ff00"),
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no segments to export")]
    NoSegments,
    #[error("XML write error: {0}")]
    Xml(String),
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Timestamped default output filename, e.g. `2026-08-06-14-03-59.kml`.
pub fn default_export_filename(extension: &str) -> String {
    format!("{}.{}", Local::now().format("%Y-%m-%d-%H-%M-%S"), extension)
}

/// Segments as one GPX track, one trkseg per segment, each tagged with its
/// grade letter in an extensions element.
pub fn export_segments_gpx(segments: &[ClimbSegment]) -> Result<String, ExportError> {
    if segments.is_empty() {
        return Err(ExportError::NoSegments);
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_decl(&mut writer)?;

    let mut gpx = BytesStart::new("gpx");
    gpx.push_attribute(("version", GPX_VERSION));
    gpx.push_attribute(("creator", GPX_CREATOR));
    write_start(&mut writer, gpx)?;

    write_start(&mut writer, BytesStart::new("trk"))?;
    write_element(&mut writer, "name", "climb segments")?;

    for segment in segments {
        write_start(&mut writer, BytesStart::new("trkseg"))?;
        for point in &segment.points {
            write_trkpt(&mut writer, point)?;
        }
        write_start(&mut writer, BytesStart::new("extensions"))?;
        write_element(&mut writer, "grade", grade_label(segment.grade()))?;
        write_end(&mut writer, "extensions")?;
        write_end(&mut writer, "trkseg")?;
    }

    write_end(&mut writer, "trk")?;
    write_end(&mut writer, "gpx")?;
    finish(writer)
}

/// Segments as a flat KML document, one placemark per segment.
pub fn export_segments_kml(segments: &[ClimbSegment]) -> Result<String, ExportError> {
    if segments.is_empty() {
        return Err(ExportError::NoSegments);
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_decl(&mut writer)?;

    let mut kml = BytesStart::new("kml");
    kml.push_attribute(("xmlns", KML_NS));
    write_start(&mut writer, kml)?;
    write_start(&mut writer, BytesStart::new("Document"))?;
    write_element(&mut writer, "name", "climb segments")?;

    for (index, segment) in segments.iter().enumerate() {
        write_start(&mut writer, BytesStart::new("Placemark"))?;
        write_element(
            &mut writer,
            "name",
            &format!("segment {} ({})", index + 1, grade_label(segment.grade())),
        )?;
        write_line_string(&mut writer, &segment.points)?;
        write_end(&mut writer, "Placemark")?;
    }

    write_end(&mut writer, "Document")?;
    write_end(&mut writer, "kml")?;
    finish(writer)
}

/// Merged KML export: the original track in gray, each admitted segment
/// styled by grade, and START/END point markers labeled with the grade
/// letter and its countdown number.
pub fn export_merged_kml(
    track: &[TrackPoint],
    segments: &[ClimbSegment],
) -> Result<String, ExportError> {
    if segments.is_empty() || track.is_empty() {
        return Err(ExportError::NoSegments);
    }

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    write_decl(&mut writer)?;

    let mut kml = BytesStart::new("kml");
    kml.push_attribute(("xmlns", KML_NS));
    write_start(&mut writer, kml)?;
    write_start(&mut writer, BytesStart::new("Document"))?;
    write_element(&mut writer, "name", "merged export")?;

    write_line_style(&mut writer, TRACK_STYLE.0, TRACK_STYLE.1, "2")?;
    for (id, color) in GRADE_STYLES {
        write_line_style(&mut writer, id, color, "4")?;
    }

    // full track first, unstyled gray
    write_start(&mut writer, BytesStart::new("Placemark"))?;
    write_element(&mut writer, "name", "full track")?;
    write_element(&mut writer, "styleUrl", &format!("#{}", TRACK_STYLE.0))?;
    write_line_string(&mut writer, track)?;
    write_end(&mut writer, "Placemark")?;

    // graded segments count down from the highest number per grade
    let mut countdown = GradeCountdown::for_segments(segments);
    let mut waypoints: Vec<(String, TrackPoint)> = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let grade = segment.grade();
        let style_id = match grade {
            Some(g) => format!("style{}", g.letter()),
            None => TRACK_STYLE.0.to_string(),
        };

        if let Some(grade) = grade {
            let label = countdown.next_label(grade);
            waypoints.push((format!("{} START", label), segment.start.clone()));
            waypoints.push((format!("{} END", label), segment.end.clone()));
        }

        write_start(&mut writer, BytesStart::new("Placemark"))?;
        write_element(
            &mut writer,
            "name",
            &format!("segment {} ({})", index + 1, grade_label(grade)),
        )?;
        write_element(&mut writer, "styleUrl", &format!("#{}", style_id))?;
        write_line_string(&mut writer, &segment.points)?;
        write_end(&mut writer, "Placemark")?;
    }

    for (name, point) in &waypoints {
        write_start(&mut writer, BytesStart::new("Placemark"))?;
        write_element(&mut writer, "name", name)?;
        write_start(&mut writer, BytesStart::new("Point"))?;
        write_element(&mut writer, "coordinates", &coordinate_tuple(point))?;
        write_end(&mut writer, "Point")?;
        write_end(&mut writer, "Placemark")?;
    }

    write_end(&mut writer, "Document")?;
    write_end(&mut writer, "kml")?;
    finish(writer)
}

fn write_trkpt(writer: &mut XmlWriter, point: &TrackPoint) -> Result<(), ExportError> {
    let lat = format!("{}", point.latitude);
    let lon = format!("{}", point.longitude);
    let mut trkpt = BytesStart::new("trkpt");
    trkpt.push_attribute(("lat", lat.as_str()));
    trkpt.push_attribute(("lon", lon.as_str()));

    match point.elevation {
        Some(elevation) => {
            write_start(writer, trkpt)?;
            write_element(writer, "ele", &format!("{}", elevation))?;
            write_end(writer, "trkpt")?;
        }
        None => writer
            .write_event(Event::Empty(trkpt))
            .map_err(xml_error)?,
    }
    Ok(())
}

fn write_line_string(writer: &mut XmlWriter, points: &[TrackPoint]) -> Result<(), ExportError> {
    write_start(writer, BytesStart::new("LineString"))?;
    write_element(writer, "coordinates", &coordinate_list(points))?;
    write_end(writer, "LineString")?;
    Ok(())
}

fn write_line_style(
    writer: &mut XmlWriter,
    id: &str,
    color: &str,
    width: &str,
) -> Result<(), ExportError> {
    let mut style = BytesStart::new("Style");
    style.push_attribute(("id", id));
    write_start(writer, style)?;
    write_start(writer, BytesStart::new("LineStyle"))?;
    write_element(writer, "color", color)?;
    write_element(writer, "width", width)?;
    write_end(writer, "LineStyle")?;
    write_end(writer, "Style")?;
    Ok(())
}

/// `lon,lat` with the elevation appended only when known.
fn coordinate_tuple(point: &TrackPoint) -> String {
    match point.elevation {
        Some(elevation) => format!("{},{},{}", point.longitude, point.latitude, elevation),
        None => format!("{},{}", point.longitude, point.latitude),
    }
}

fn coordinate_list(points: &[TrackPoint]) -> String {
    points
        .iter()
        .map(coordinate_tuple)
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_decl(writer: &mut XmlWriter) -> Result<(), ExportError> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)
}

fn write_start(writer: &mut XmlWriter, start: BytesStart) -> Result<(), ExportError> {
    writer.write_event(Event::Start(start)).map_err(xml_error)
}

fn write_end(writer: &mut XmlWriter, name: &str) -> Result<(), ExportError> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)
}

fn write_element(writer: &mut XmlWriter, name: &str, value: &str) -> Result<(), ExportError> {
    write_start(writer, BytesStart::new(name))?;
    writer
        .write_event(Event::Text(BytesText::new(value)))
        .map_err(xml_error)?;
    write_end(writer, name)
}

fn finish(writer: XmlWriter) -> Result<String, ExportError> {
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| ExportError::Xml(e.to_string()))
}

fn xml_error<E: std::fmt::Display>(error: E) -> ExportError {
    ExportError::Xml(error.to_string())
}
