//! Spectrum peak analysis.

use ndarray::ArrayView1;

/// Wavelengths on either side of the main peak where the spectrum crosses
/// half height, `(max + min) / 2`.
///
/// Returns `(NaN, NaN)` when the peak sits on the first sample or the input
/// is empty or mismatched.
pub fn fwhm_bounds(wavelength: ArrayView1<'_, f64>, spectrum: ArrayView1<'_, f64>) -> (f64, f64) {
    let none = (f64::NAN, f64::NAN);
    if spectrum.is_empty() || wavelength.len() != spectrum.len() {
        return none;
    }
    let mut peak = 0;
    for (i, &v) in spectrum.iter().enumerate() {
        if v > spectrum[peak] {
            peak = i;
        }
    }
    if peak == 0 {
        return none;
    }
    let max = spectrum[peak];
    let min = spectrum.iter().copied().fold(f64::INFINITY, f64::min);
    let half = (max + min) / 2.0;

    let closest = |range: std::ops::Range<usize>| {
        range.min_by(|&a, &b| {
            (spectrum[a] - half)
                .abs()
                .total_cmp(&(spectrum[b] - half).abs())
        })
    };
    match (closest(0..peak), closest(peak..spectrum.len())) {
        (Some(x1), Some(x2)) => (wavelength[x1], wavelength[x2]),
        _ => none,
    }
}

/// Full width at half maximum of the main peak, in wavelength units.
pub fn fwhm(wavelength: ArrayView1<'_, f64>, spectrum: ArrayView1<'_, f64>) -> f64 {
    let (lo, hi) = fwhm_bounds(wavelength, spectrum);
    hi - lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn width_of_sampled_peak() {
        let wl = Array1::from_iter((0..200).map(|i| 400.0 + i as f64 * 0.5));
        let s = wl.mapv(|x| 100.0 * (-(x - 450.0).powi(2) / (2.0 * 4.0 * 4.0)).exp());
        let width = fwhm(wl.view(), s.view());
        assert!((width - 2.3548 * 4.0).abs() < 0.6, "width {}", width);
        let (lo, hi) = fwhm_bounds(wl.view(), s.view());
        assert!(lo < 450.0 && hi > 450.0);
    }

    #[test]
    fn peak_on_first_sample_is_undefined() {
        let wl = Array1::from(vec![1.0, 2.0, 3.0]);
        let s = Array1::from(vec![9.0, 3.0, 1.0]);
        let (lo, hi) = fwhm_bounds(wl.view(), s.view());
        assert!(lo.is_nan() && hi.is_nan());
        assert!(fwhm(wl.view(), s.view()).is_nan());
    }
}
