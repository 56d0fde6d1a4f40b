/// Climb segment detection
///
/// Partitions a track into maximal climb chunks (elevation never decreasing,
/// flat stretches tolerated up to a cumulative 10m), measures each chunk,
/// and keeps the chunks that qualify as real climbs above the requested
/// slope threshold.
use crate::grade::Grade;
use crate::track_geometry::{point_distance_m, TrackPoint};

/// Chunks shorter than this horizontal distance are not climbs
pub const MIN_HORIZONTAL_M: f64 = 20.0;
/// Chunks must gain strictly more than this to count
pub const MIN_GAIN_M: f64 = 10.0;
/// Cumulative flat distance allowed inside one chunk
pub const MAX_FLAT_M: f64 = 10.0;
/// Threshold used by the unattended auto-analysis mode
pub const AUTO_SLOPE_THRESHOLD: f64 = 19.0;

/// Inclusive index range of one climb candidate within the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClimbChunk {
    pub start_index: usize,
    pub end_index: usize,
}

/// An admitted climb with its measurements. Built once per analysis run,
/// immutable afterwards.
#[derive(Debug, Clone)]
pub struct ClimbSegment {
    pub start: TrackPoint,
    pub end: TrackPoint,
    pub slope_percent: f64,
    pub distance_m: f64,
    pub gain_m: f64,
    pub points: Vec<TrackPoint>,
}

impl ClimbSegment {
    /// Grade is recomputed from the stored slope on demand, never cached.
    pub fn grade(&self) -> Option<Grade> {
        Grade::from_slope(self.slope_percent)
    }
}

/// Scan state threaded through the fold over consecutive point pairs.
struct ScanState {
    chunks: Vec<ClimbChunk>,
    segment_start: usize,
    flat_m: f64,
}

impl ScanState {
    fn close_at(mut self, index: usize) -> Self {
        self.chunks.push(ClimbChunk {
            start_index: self.segment_start,
            end_index: index,
        });
        self.segment_start = index + 1;
        self.flat_m = 0.0;
        self
    }
}

/// Split the track into maximal climb chunks.
///
/// A chunk ends when elevation drops, when the cumulative flat distance
/// since the last ascent exceeds [`MAX_FLAT_M`], or when either point of a
/// pair has no elevation (untrusted data is never bridged). The chunks are
/// disjoint, cover every consecutive index pair exactly once, and come out
/// in ascending index order.
pub fn build_climb_chunks(points: &[TrackPoint]) -> Vec<ClimbChunk> {
    let initial = ScanState {
        chunks: Vec::new(),
        segment_start: 0,
        flat_m: 0.0,
    };

    let mut state = (0..points.len().saturating_sub(1)).fold(initial, |mut state, i| {
        let p1 = &points[i];
        let p2 = &points[i + 1];

        let (e1, e2) = match (p1.elevation, p2.elevation) {
            (Some(e1), Some(e2)) => (e1, e2),
            // missing elevation is a hard boundary, the pair contributes
            // no distance or elevation accounting
            _ => return state.close_at(i),
        };

        if e2 < e1 {
            state.close_at(i)
        } else if e2 == e1 {
            state.flat_m += point_distance_m(p1, p2);
            if state.flat_m > MAX_FLAT_M {
                state.close_at(i)
            } else {
                state
            }
        } else {
            // an ascent cancels any accumulated flat credit
            state.flat_m = 0.0;
            state
        }
    });

    if !points.is_empty() && state.segment_start <= points.len() - 1 {
        state.chunks.push(ClimbChunk {
            start_index: state.segment_start,
            end_index: points.len() - 1,
        });
    }

    state.chunks
}

/// Analyze a track: every chunk that climbs more than [`MIN_GAIN_M`] over at
/// least [`MIN_HORIZONTAL_M`] of path with an average slope strictly above
/// `slope_threshold` becomes a segment. Segments come back in ascending
/// start-index order; degenerate input yields an empty list.
pub fn segments_above_slope(points: &[TrackPoint], slope_threshold: f64) -> Vec<ClimbSegment> {
    build_climb_chunks(points)
        .into_iter()
        .filter_map(|chunk| measure_chunk(points, chunk, slope_threshold))
        .collect()
}

fn measure_chunk(
    points: &[TrackPoint],
    chunk: ClimbChunk,
    slope_threshold: f64,
) -> Option<ClimbSegment> {
    let start = &points[chunk.start_index];
    let end = &points[chunk.end_index];

    let start_ele = start.elevation?;
    let end_ele = end.elevation?;

    // endpoint-to-endpoint gain: the segmenter already forbids net descent
    // inside a chunk, intermediate wiggles are not accumulated separately
    let gain_m = end_ele - start_ele;
    if gain_m <= MIN_GAIN_M {
        return None;
    }

    // path distance, summed leg by leg, not the straight-line chord
    let distance_m: f64 = (chunk.start_index..chunk.end_index)
        .map(|j| point_distance_m(&points[j], &points[j + 1]))
        .sum();
    if distance_m < MIN_HORIZONTAL_M {
        return None;
    }

    let slope = gain_m / distance_m * 100.0;
    if slope <= slope_threshold {
        return None;
    }

    Some(ClimbSegment {
        start: start.clone(),
        end: end.clone(),
        slope_percent: round1(slope),
        distance_m: round1(distance_m),
        gain_m: round1(gain_m),
        points: points[chunk.start_index..=chunk.end_index].to_vec(),
    })
}

/// Round to one decimal place, matching the reported precision of all
/// segment measurements.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
