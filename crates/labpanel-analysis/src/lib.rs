//! Numerical routines behind the camera, spectrometer and archiving panels.
//!
//! - [`image`]: background, threshold, morphology, regions and the beam
//!   centroid of one frame
//! - [`gauss`]: 1D and 2D Gaussian fits (bounded Levenberg-Marquardt)
//! - [`tracker`]: per-attribute frame admission and centroid cache
//! - [`spectrum`]: peak FWHM
//! - [`smoothing`]: window smoothing and exponential averaging
//! - [`rate`]: keyed minimum update interval

pub mod gauss;
pub mod image;
pub mod rate;
pub mod smoothing;
pub mod spectrum;
pub mod tracker;

pub use gauss::{fit_1d, fit_2d, Fit, Gauss1d, Gauss2d};
pub use image::{compute_centroid, Centroid, Ellipse};
pub use rate::RateLimiter;
pub use smoothing::{smooth, Ema, WindowKind};
pub use spectrum::{fwhm, fwhm_bounds};
pub use tracker::{BeamTracker, FrameOutcome};
