//! Synthetic camera frames.
//!
//! [`FrameGenerator`] runs a [`Ticker`] that manufactures one noisy Gaussian
//! spot per image attribute at a fixed cadence and hands it to a delivery
//! closure. The thread is joined when the generator is stopped or dropped.

use std::time::Duration;

use ndarray::Array2;

use crate::rng::SimRng;
use crate::ticker::Ticker;

/// Frame width in pixels.
pub const FRAME_WIDTH: usize = 100;
/// Frame height in pixels.
pub const FRAME_HEIGHT: usize = 120;

/// Attributes produced in simulation mode.
pub const SIMULATED_ATTRIBUTES: [&str; 2] = ["Image_00", "Image_01"];

const BASELINE: f64 = 10.0;
const AMPLITUDE: f64 = 100.0;
const SIGMA: f64 = 10.0;
const NOISE: f64 = 5.0;

/// One `u16` frame: Gaussian spot centered uniformly in 40..60 on both axes,
/// on a baseline of 10 with uniform noise in -5..5.
pub fn synthetic_frame(rng: &SimRng) -> Array2<f64> {
    let cx = rng.gen_range(40.0..60.0);
    let cy = rng.gen_range(40.0..60.0);
    let mut noise = vec![0.0; FRAME_WIDTH * FRAME_HEIGHT];
    rng.fill_range(&mut noise, -NOISE, NOISE);
    Array2::from_shape_fn((FRAME_HEIGHT, FRAME_WIDTH), |(r, c)| {
        let dx = c as f64 - cx;
        let dy = r as f64 - cy;
        let spot = AMPLITUDE * (-(dx * dx + dy * dy) / (2.0 * SIGMA * SIGMA)).exp();
        let v = BASELINE + spot + noise[r * FRAME_WIDTH + c];
        // Stored as u16 on the wire.
        v.round().clamp(0.0, f64::from(u16::MAX))
    })
}

/// Background producer of synthetic frames.
#[derive(Debug)]
pub struct FrameGenerator {
    ticker: Ticker,
}

impl FrameGenerator {
    /// Start producing a frame for every attribute in `attributes` every
    /// `period`, passing each one to `deliver`.
    pub fn spawn<F>(
        attributes: Vec<String>,
        period: Duration,
        seed: Option<u64>,
        deliver: F,
    ) -> std::io::Result<Self>
    where
        F: Fn(&str, Array2<f64>) + Send + 'static,
    {
        let rng = SimRng::new(seed);
        tracing::debug!(?attributes, "Starting synthetic frames");
        let ticker = Ticker::spawn("frame-generator", period, move || {
            for attr in &attributes {
                deliver(attr, synthetic_frame(&rng));
            }
        })?;
        Ok(Self { ticker })
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_running()
    }

    /// Ask the thread to finish and wait for it.
    pub fn stop(&mut self) {
        self.ticker.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn frame_shape_and_levels() {
        let rng = SimRng::new(Some(3));
        let frame = synthetic_frame(&rng);
        assert_eq!(frame.dim(), (FRAME_HEIGHT, FRAME_WIDTH));
        let max = frame.iter().copied().fold(f64::MIN, f64::max);
        let min = frame.iter().copied().fold(f64::MAX, f64::min);
        assert!(max > 100.0 && max <= 116.0, "max {}", max);
        assert!(min >= 5.0, "min {}", min);
        assert!(frame.iter().all(|v| v.fract() == 0.0));
    }

    #[test]
    fn generator_delivers_and_stops() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut generator = FrameGenerator::spawn(
            vec!["Image_00".into(), "Image_01".into()],
            Duration::from_millis(10),
            Some(1),
            move |attr, _frame| sink.lock().push(attr.to_string()),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(60));
        generator.stop();
        assert!(!generator.is_running());
        let count = seen.lock().len();
        assert!(count >= 2);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(seen.lock().len(), count);
        assert_eq!(seen.lock()[0], "Image_00");
    }
}
