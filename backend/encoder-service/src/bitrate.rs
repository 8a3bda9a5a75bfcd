//! Content-aware bitrate planner
//!
//! Maps a resolution class to a base rate and scales it by the complexity
//! score, keeping the result within `[0.3 * base, base]` kbps. Deterministic
//! for a given `(width, height, spatial, temporal)`.

use crate::analysis::Complexity;
use video_core::constants::{
    DEFAULT_BASE_BITRATE_KBPS, FULL_HD_BASE_BITRATE_KBPS, HD_BASE_BITRATE_KBPS,
};
use video_core::{EncodeJob, VideoInfo};

/// Base rate (kbps) for the source's pixel count.
pub fn base_bitrate(width: u32, height: u32) -> u32 {
    let pixels = width * height;
    if pixels >= 1920 * 1080 {
        FULL_HD_BASE_BITRATE_KBPS
    } else if pixels >= 1280 * 720 {
        HD_BASE_BITRATE_KBPS
    } else {
        DEFAULT_BASE_BITRATE_KBPS
    }
}

/// Complexity-scaled target bitrate in kbps.
pub fn compute_bitrate(info: &VideoInfo, complexity: &Complexity) -> u32 {
    let base = base_bitrate(info.width, info.height) as f64;

    let spatial_score = (complexity.spatial / 800.0).min(1.0);
    let temporal_score = (complexity.temporal / 40.0).min(1.0);
    let score = 0.7 * spatial_score + 0.3 * temporal_score;

    (base * (0.3 + 0.7 * score)).round() as u32
}

/// Target bitrate for a job.
///
/// Per-title jobs use the complexity score; otherwise the first requested
/// quality's (already clamped) bitrate wins, with the resolution base rate
/// as the fallback for an empty ladder.
pub fn target_bitrate(job: &EncodeJob, info: &VideoInfo, complexity: Option<&Complexity>) -> u32 {
    if let (true, Some(complexity)) = (job.enable_per_title_encoding, complexity) {
        return compute_bitrate(info, complexity);
    }

    job.qualities
        .first()
        .map(|q| q.bitrate)
        .unwrap_or_else(|| base_bitrate(info.width, info.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32, height: u32) -> VideoInfo {
        VideoInfo {
            width,
            height,
            duration_seconds: 60.0,
        }
    }

    #[test]
    fn test_base_bitrate_classes() {
        assert_eq!(base_bitrate(1920, 1080), 1500);
        assert_eq!(base_bitrate(1280, 720), 800);
        assert_eq!(base_bitrate(854, 480), 400);
        assert_eq!(base_bitrate(3840, 2160), 1500);
    }

    #[test]
    fn test_max_complexity_hits_base_rate() {
        let c = Complexity {
            spatial: 800.0,
            temporal: 40.0,
        };
        assert_eq!(compute_bitrate(&info(1920, 1080), &c), 1500);
    }

    #[test]
    fn test_zero_complexity_hits_floor() {
        let c = Complexity {
            spatial: 0.0,
            temporal: 0.0,
        };
        assert_eq!(compute_bitrate(&info(1280, 720), &c), 240);
    }

    #[test]
    fn test_result_stays_within_bounds() {
        let samples = [
            (0.0, 0.0),
            (100.0, 5.0),
            (400.0, 20.0),
            (800.0, 40.0),
            (5000.0, 500.0),
        ];
        for (spatial, temporal) in samples {
            let c = Complexity { spatial, temporal };
            for (w, h) in [(1920, 1080), (1280, 720), (640, 360)] {
                let base = base_bitrate(w, h);
                let target = compute_bitrate(&info(w, h), &c);
                let floor = (base as f64 * 0.3).round() as u32;
                assert!(
                    (floor..=base).contains(&target),
                    "target {target} outside [{floor}, {base}]"
                );
            }
        }
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let c = Complexity {
            spatial: 523.7,
            temporal: 17.2,
        };
        assert_eq!(
            compute_bitrate(&info(1920, 1080), &c),
            compute_bitrate(&info(1920, 1080), &c)
        );
    }
}
