//! Window smoothing of time series and exponential averaging of readings.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use labpanel_core::error::{AppResult, PanelError};

/// Smoothing window shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowKind {
    #[default]
    Flat,
    Hanning,
    Hamming,
    Bartlett,
    Blackman,
}

impl WindowKind {
    pub const ALL: [WindowKind; 5] = [
        WindowKind::Flat,
        WindowKind::Hanning,
        WindowKind::Hamming,
        WindowKind::Bartlett,
        WindowKind::Blackman,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WindowKind::Flat => "flat",
            WindowKind::Hanning => "hanning",
            WindowKind::Hamming => "hamming",
            WindowKind::Bartlett => "bartlett",
            WindowKind::Blackman => "blackman",
        }
    }

    /// Window coefficients of length `len`, not normalised.
    pub fn coefficients(&self, len: usize) -> Vec<f64> {
        if len == 1 {
            return vec![1.0];
        }
        let m = (len - 1) as f64;
        (0..len)
            .map(|n| {
                let n = n as f64;
                match self {
                    WindowKind::Flat => 1.0,
                    WindowKind::Hanning => 0.5 - 0.5 * (2.0 * PI * n / m).cos(),
                    WindowKind::Hamming => 0.54 - 0.46 * (2.0 * PI * n / m).cos(),
                    WindowKind::Bartlett => 2.0 / m * (m / 2.0 - (n - m / 2.0).abs()),
                    WindowKind::Blackman => {
                        0.42 - 0.5 * (2.0 * PI * n / m).cos() + 0.08 * (4.0 * PI * n / m).cos()
                    }
                }
            })
            .collect()
    }
}

impl fmt::Display for WindowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowKind {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                PanelError::Analysis(
                    "Window is one of 'flat', 'hanning', 'hamming', 'bartlett', 'blackman'".into(),
                )
            })
    }
}

/// Smooth `x` with a normalised window of `window_len` samples.
///
/// The signal is mirrored at both ends before the convolution, so the output
/// has the length of the input and no phase shift.
pub fn smooth(x: &[f64], window_len: usize, kind: WindowKind) -> AppResult<Vec<f64>> {
    if x.len() < window_len {
        return Err(PanelError::Analysis(
            "Input vector needs to be bigger than window size".into(),
        ));
    }
    if window_len < 3 {
        return Ok(x.to_vec());
    }

    let n = x.len();
    let mut padded = Vec::with_capacity(n + 2 * window_len - 2);
    padded.extend((1..window_len).rev().map(|i| x[i]));
    padded.extend_from_slice(x);
    padded.extend((n - window_len..=n - 2).rev().map(|i| x[i]));

    let w = kind.coefficients(window_len);
    let total: f64 = w.iter().sum();
    let valid: Vec<f64> = padded
        .windows(window_len)
        .map(|chunk| chunk.iter().zip(w.iter().rev()).map(|(s, c)| s * c).sum::<f64>() / total)
        .collect();

    let l = window_len - 1;
    Ok(valid[l / 2..valid.len() - (l - l / 2)].to_vec())
}

/// Exponential moving average `0.9 * old + 0.1 * new`.
///
/// The first sample initialises the average.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ema {
    value: Option<f64>,
}

impl Ema {
    const WEIGHT: f64 = 0.1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            Some(old) => (1.0 - Self::WEIGHT) * old + Self::WEIGHT * sample,
            None => sample,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_window_is_moving_average() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = smooth(&x, 3, WindowKind::Flat).unwrap();
        assert_eq!(y.len(), x.len());
        // Mirrored ends: [2,1,2] and [5,6,5]
        let expected = [5.0 / 3.0, 2.0, 3.0, 4.0, 5.0, 16.0 / 3.0];
        for (a, b) in y.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
        }
    }

    #[test]
    fn even_window_keeps_length() {
        let x: Vec<f64> = (0..20).map(|i| (i as f64).sin()).collect();
        for kind in WindowKind::ALL {
            assert_eq!(smooth(&x, 4, kind).unwrap().len(), 20);
            assert_eq!(smooth(&x, 11, kind).unwrap().len(), 20);
        }
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let x = vec![3.5; 30];
        for kind in WindowKind::ALL {
            for v in smooth(&x, 7, kind).unwrap() {
                assert!((v - 3.5).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn short_window_and_short_input() {
        let x = [1.0, 5.0, 2.0];
        assert_eq!(smooth(&x, 2, WindowKind::Hanning).unwrap(), x.to_vec());
        assert!(matches!(
            smooth(&x, 5, WindowKind::Flat),
            Err(PanelError::Analysis(_))
        ));
    }

    #[test]
    fn window_coefficients_match_definitions() {
        let hann = WindowKind::Hanning.coefficients(5);
        assert!((hann[0]).abs() < 1e-12 && (hann[2] - 1.0).abs() < 1e-12);
        let bart = WindowKind::Bartlett.coefficients(5);
        assert_eq!(bart, vec![0.0, 0.5, 1.0, 0.5, 0.0]);
        assert_eq!("Blackman".parse::<WindowKind>().unwrap(), WindowKind::Blackman);
        assert!("gauss".parse::<WindowKind>().is_err());
    }

    #[test]
    fn ema_initialises_on_first_sample() {
        let mut ema = Ema::new();
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(300.0), 300.0);
        assert!((ema.update(310.0) - 301.0).abs() < 1e-12);
        ema.reset();
        assert_eq!(ema.update(5.0), 5.0);
    }
}
