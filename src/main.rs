use std::io::{self, Write};
use std::path::Path;

mod batch_analysis;
mod climb_analyzer;
mod grade;
mod segment_report;
mod track_export;
mod track_geometry;
mod track_reader;

use climb_analyzer::{segments_above_slope, ClimbSegment, AUTO_SLOPE_THRESHOLD};
use segment_report::{print_grade_summary, print_segment_table};
use track_export::{
    default_export_filename, export_merged_kml, export_segments_gpx, export_segments_kml,
};
use track_geometry::{flatten_geometry, TrackPoint};
use track_reader::load_track_geometry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    println!("\nCLIMB SEGMENT ANALYZER");
    println!("======================");
    println!("Finds sustained climbs in GPX/KML tracks and grades them by slope");

    let Some(track_path) = args.get(1) else {
        println!("\nUsage: rust-climb-analyzer <track.gpx|track.kml|folder>");
        println!("Pass a track file for the analysis options, or a folder for batch mode.");
        return Ok(());
    };

    println!("\nAvailable actions for {}:", track_path);
    println!("1. Analyze with a custom slope threshold");
    println!("2. Auto analyze (threshold {}%, per-grade summary)", AUTO_SLOPE_THRESHOLD);
    println!("3. Analyze and export segments as GPX");
    println!("4. Analyze and export segments as KML");
    println!("5. Analyze and export merged KML (track + segments + markers)");
    println!("6. Batch auto-analyze a folder of GPX files");

    print!("\nChoice (or Enter to exit): ");
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    let choice = input.trim();

    match choice {
        "1" => {
            let points = load_points(track_path)?;
            if let Some(threshold) = prompt_slope_threshold() {
                let segments = segments_above_slope(&points, threshold);
                println!("\nFound {} segments above {}%", segments.len(), threshold);
                print_segment_table(&segments);
            }
        }
        "2" => {
            let points = load_points(track_path)?;
            let segments = segments_above_slope(&points, AUTO_SLOPE_THRESHOLD);
            println!("\nFound {} segments above {}%", segments.len(), AUTO_SLOPE_THRESHOLD);
            print_segment_table(&segments);
            print_grade_summary(&segments);
        }
        "3" => {
            let points = load_points(track_path)?;
            if let Some(segments) = analyze_for_export(&points) {
                let document = export_segments_gpx(&segments)?;
                save_export(&document, "gpx", segments.len())?;
            }
        }
        "4" => {
            let points = load_points(track_path)?;
            if let Some(segments) = analyze_for_export(&points) {
                let document = export_segments_kml(&segments)?;
                save_export(&document, "kml", segments.len())?;
            }
        }
        "5" => {
            let points = load_points(track_path)?;
            if let Some(segments) = analyze_for_export(&points) {
                let document = export_merged_kml(&points, &segments)?;
                save_export(&document, "kml", segments.len())?;
            }
        }
        "6" => {
            batch_analysis::run_batch_analysis(track_path)?;
        }
        "" => {
            println!("Exiting.");
        }
        _ => {
            println!("Unknown option. Exiting.");
        }
    }

    Ok(())
}

fn load_points(track_path: &str) -> Result<Vec<TrackPoint>, Box<dyn std::error::Error>> {
    let geometry = load_track_geometry(Path::new(track_path))?;
    let points = flatten_geometry(&geometry);
    println!("Loaded {} track points from {}", points.len(), track_path);
    Ok(points)
}

/// Threshold input is validated here so the analysis itself never sees a
/// negative or non-numeric value.
fn prompt_slope_threshold() -> Option<f64> {
    print!("Slope threshold % (e.g. 19): ");
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    match input.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => {
            println!("Invalid slope threshold: enter a non-negative number");
            None
        }
    }
}

fn analyze_for_export(points: &[TrackPoint]) -> Option<Vec<ClimbSegment>> {
    let threshold = prompt_slope_threshold()?;
    let segments = segments_above_slope(points, threshold);
    println!("Found {} segments above {}%", segments.len(), threshold);
    if segments.is_empty() {
        println!("Nothing to export.");
        return None;
    }
    Some(segments)
}

fn save_export(
    document: &str,
    extension: &str,
    segment_count: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let filename = default_export_filename(extension);
    std::fs::write(&filename, document)?;
    println!("Exported {} segments to {}", segment_count, filename);
    Ok(())
}
