//! Frame admission and centroid caching for the camera views.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ndarray::Array2;

use crate::image::{compute_centroid, Centroid};
use crate::rate::RateLimiter;

/// What happened to one incoming frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Arrived within the minimum interval; not processed.
    Dropped,
    /// Processed without tracking.
    Shown,
    /// Processed with tracking; `None` when no spot was found.
    Tracked(Option<Centroid>),
}

impl FrameOutcome {
    pub fn is_processed(&self) -> bool {
        !matches!(self, FrameOutcome::Dropped)
    }
}

/// Rate-limited centroid tracking of several image attributes.
#[derive(Debug, Clone)]
pub struct BeamTracker {
    limiter: RateLimiter,
    last: HashMap<String, Centroid>,
}

impl BeamTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: RateLimiter::new(interval),
            last: HashMap::new(),
        }
    }

    pub fn process(&mut self, attribute: &str, image: &Array2<f64>, tracking: bool) -> FrameOutcome {
        self.process_at(attribute, image, tracking, Instant::now())
    }

    /// Admit a frame of `attribute` received at `now`, and locate the beam if
    /// a view tracks this attribute.
    pub fn process_at(
        &mut self,
        attribute: &str,
        image: &Array2<f64>,
        tracking: bool,
        now: Instant,
    ) -> FrameOutcome {
        if !self.limiter.accept_at(attribute, now) {
            return FrameOutcome::Dropped;
        }
        if !tracking {
            return FrameOutcome::Shown;
        }
        let key = attribute.to_lowercase();
        match compute_centroid(image) {
            Some(centroid) => {
                self.last.insert(key, centroid);
                FrameOutcome::Tracked(Some(centroid))
            }
            None => {
                tracing::debug!(attribute, "Failed to find a centroid");
                self.last.remove(&key);
                FrameOutcome::Tracked(None)
            }
        }
    }

    /// Last centroid found on `attribute`.
    pub fn last_centroid(&self, attribute: &str) -> Option<Centroid> {
        self.last.get(&attribute.to_lowercase()).copied()
    }

    pub fn forget(&mut self, attribute: &str) {
        self.last.remove(&attribute.to_lowercase());
        self.limiter.reset(attribute);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauss::Gauss2d;

    fn frame() -> Array2<f64> {
        let g = Gauss2d {
            baseline: 10.0,
            amplitude: 100.0,
            mean_x: 50.0,
            mean_y: 60.0,
            sigma_x: 10.0,
            sigma_y: 10.0,
        };
        Array2::from_shape_fn((120, 100), |(r, c)| g.eval(c as f64, r as f64))
    }

    #[test]
    fn ten_frames_in_half_a_second_process_one() {
        let mut tracker = BeamTracker::new(Duration::from_millis(500));
        let image = frame();
        let t0 = Instant::now();
        let processed = (0..10u64)
            .map(|i| tracker.process_at("Image_00", &image, true, t0 + Duration::from_millis(i * 50)))
            .filter(FrameOutcome::is_processed)
            .count();
        assert_eq!(processed, 1);
        assert!(tracker.last_centroid("image_00").is_some());
    }

    #[test]
    fn lost_spot_clears_cached_centroid() {
        let mut tracker = BeamTracker::new(Duration::from_millis(500));
        let t0 = Instant::now();
        assert!(matches!(
            tracker.process_at("Image_00", &frame(), true, t0),
            FrameOutcome::Tracked(Some(_))
        ));
        let dark = Array2::from_elem((120, 100), 10.0);
        assert_eq!(
            tracker.process_at("Image_00", &dark, true, t0 + Duration::from_secs(1)),
            FrameOutcome::Tracked(None)
        );
        assert_eq!(tracker.last_centroid("Image_00"), None);
    }

    #[test]
    fn untracked_frames_are_only_shown() {
        let mut tracker = BeamTracker::new(Duration::from_millis(500));
        assert_eq!(
            tracker.process_at("Image_01", &frame(), false, Instant::now()),
            FrameOutcome::Shown
        );
        assert_eq!(tracker.last_centroid("Image_01"), None);
    }
}
