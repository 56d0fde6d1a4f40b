/// Batch folder analysis
///
/// Walks a folder for GPX files, auto-analyzes each one in parallel with
/// the fixed unattended threshold, and writes a CSV report next to the
/// input files. Per-file failures are reported and skipped, never fatal.
use std::error::Error;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::climb_analyzer::{segments_above_slope, AUTO_SLOPE_THRESHOLD};
use crate::segment_report::{write_track_reports_csv, TrackReport};
use crate::track_geometry::flatten_geometry;
use crate::track_reader::{load_track_geometry, TrackError};

pub fn run_batch_analysis(folder: &str) -> Result<(), Box<dyn Error>> {
    println!("\nBATCH CLIMB ANALYSIS");
    println!("====================");
    println!("Auto slope threshold: {}%", AUTO_SLOPE_THRESHOLD);
    println!("Using parallel processing on {} cores", num_cpus::get());

    let gpx_files = collect_gpx_files(folder);
    println!("Found {} GPX files in {}", gpx_files.len(), folder);

    let reports: Vec<TrackReport> = gpx_files
        .par_iter()
        .filter_map(|path| match analyze_track_file(path) {
            Ok(report) => Some(report),
            Err(e) => {
                eprintln!("Error processing {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    println!("Analyzed {} of {} files", reports.len(), gpx_files.len());

    if reports.is_empty() {
        println!("No valid results to save");
        return Ok(());
    }

    let output_path = Path::new(folder).join("climb_analysis_report.csv");
    write_track_reports_csv(&reports, &output_path)?;
    print_batch_summary(&reports);
    println!("Results saved to: {}", output_path.display());

    Ok(())
}

fn collect_gpx_files(folder: &str) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("gpx"))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect()
}

fn analyze_track_file(path: &Path) -> Result<TrackReport, TrackError> {
    let geometry = load_track_geometry(path)?;
    let points = flatten_geometry(&geometry);
    let segments = segments_above_slope(&points, AUTO_SLOPE_THRESHOLD);

    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unknown")
        .to_string();

    Ok(TrackReport::new(filename, points.len(), &segments))
}

fn print_batch_summary(reports: &[TrackReport]) {
    let total_segments: usize = reports.iter().map(|r| r.climb_segments).sum();
    let files_with_climbs = reports.iter().filter(|r| r.climb_segments > 0).count();
    let total_gain: f64 = reports.iter().map(|r| r.total_climb_gain_m).sum();

    println!("\nBATCH SUMMARY");
    println!("=============");
    println!("Files with climbs: {} of {}", files_with_climbs, reports.len());
    println!("Total climb segments: {}", total_segments);
    println!(
        "Grade counts: S={} A={} B={} C={}",
        reports.iter().map(|r| r.grade_s).sum::<usize>(),
        reports.iter().map(|r| r.grade_a).sum::<usize>(),
        reports.iter().map(|r| r.grade_b).sum::<usize>(),
        reports.iter().map(|r| r.grade_c).sum::<usize>(),
    );
    println!("Total climb gain: {:.1} m", total_gain);
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEEP_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test">
  <trk>
    <trkseg>
      <trkpt lat="0.0" lon="0.0"><ele>0</ele></trkpt>
      <trkpt lat="0.001" lon="0.0"><ele>30</ele></trkpt>
      <trkpt lat="0.002" lon="0.0"><ele>80</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn test_analyze_track_file_reports_segments() {
        let path = std::env::temp_dir().join(format!(
            "climb_batch_test_{}.gpx",
            std::process::id()
        ));
        std::fs::write(&path, STEEP_GPX).unwrap();

        let report = analyze_track_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(report.track_points, 3);
        // 80m over ~222m of path is about 36%, grade A
        assert_eq!(report.climb_segments, 1);
        assert_eq!(report.grade_a, 1);
    }

    #[test]
    fn test_collect_gpx_files_on_missing_folder_is_empty() {
        let files = collect_gpx_files("/nonexistent/path/for/this/test");
        assert!(files.is_empty());
    }
}
