/// Segment reporting
///
/// Plain-text table and per-grade summary for interactive runs, plus the
/// CSV record written by batch analysis.
use std::error::Error;
use std::path::Path;

use csv::Writer;
use serde::Serialize;

use crate::climb_analyzer::ClimbSegment;
use crate::grade::{Grade, GradeSummary};
use crate::track_geometry::TrackPoint;

pub fn print_segment_table(segments: &[ClimbSegment]) {
    if segments.is_empty() {
        println!("No segments above the slope threshold.");
        return;
    }

    println!(
        "{:<22} {:>9} | {:<22} {:>9} | {:>12} {:>9} {:>8} {:>6}",
        "Start (lon,lat)",
        "ele (m)",
        "End (lon,lat)",
        "ele (m)",
        "distance (m)",
        "gain (m)",
        "slope %",
        "grade"
    );
    for segment in segments {
        println!(
            "{:<22} {:>9} | {:<22} {:>9} | {:>12.1} {:>9.1} {:>8.1} {:>6}",
            format_coordinate(&segment.start),
            format_elevation(&segment.start),
            format_coordinate(&segment.end),
            format_elevation(&segment.end),
            segment.distance_m,
            segment.gain_m,
            segment.slope_percent,
            grade_label(segment.grade()),
        );
    }
}

/// Auto-analysis summary: one line per grade, steepest first.
pub fn print_grade_summary(segments: &[ClimbSegment]) {
    let summary = GradeSummary::from_segments(segments);
    println!("\nClimbs by grade:");
    for grade in Grade::ORDERED {
        let tally = summary.tally(grade);
        println!(
            "  {}: {} segments, {:.1} m total climb",
            grade.letter(),
            tally.count,
            tally.gain_m
        );
    }
}

pub fn grade_label(grade: Option<Grade>) -> &'static str {
    grade.map(Grade::letter).unwrap_or("-")
}

fn format_coordinate(point: &TrackPoint) -> String {
    format!("{:.6},{:.6}", point.longitude, point.latitude)
}

fn format_elevation(point: &TrackPoint) -> String {
    match point.elevation {
        Some(elevation) => format!("{:.1}", elevation),
        None => "-".to_string(),
    }
}

/// One CSV row of the batch report.
#[derive(Debug, Serialize, Clone)]
pub struct TrackReport {
    pub filename: String,
    pub track_points: usize,
    pub climb_segments: usize,
    pub grade_s: usize,
    pub grade_a: usize,
    pub grade_b: usize,
    pub grade_c: usize,
    pub total_climb_gain_m: f64,
}

impl TrackReport {
    pub fn new(filename: String, track_points: usize, segments: &[ClimbSegment]) -> Self {
        let summary = GradeSummary::from_segments(segments);
        let total_climb_gain_m = segments.iter().map(|s| s.gain_m).sum();
        TrackReport {
            filename,
            track_points,
            climb_segments: segments.len(),
            grade_s: summary.tally(Grade::S).count,
            grade_a: summary.tally(Grade::A).count,
            grade_b: summary.tally(Grade::B).count,
            grade_c: summary.tally(Grade::C).count,
            total_climb_gain_m,
        }
    }
}

pub fn write_track_reports_csv(
    reports: &[TrackReport],
    output_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut writer = Writer::from_path(output_path)?;
    for report in reports {
        writer.serialize(report)?;
    }
    writer.flush()?;
    Ok(())
}
