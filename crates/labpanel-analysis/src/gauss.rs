//! Gaussian models and their least-squares fits.
//!
//! Both fits use a projected Levenberg-Marquardt iteration: every trial step
//! is clamped into the parameter box before it is evaluated. A fit that cannot
//! start (inverted bounds, non-finite guess) or that runs out of evaluations
//! returns the initial guess with `converged == false`.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array2, ArrayView1, Axis};

use crate::image::corner_means;

/// Evaluation budget of one fit.
pub const MAX_EVALUATIONS: usize = 10_000;

const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3; // 2 * sqrt(2 ln 2)

/// `baseline + amplitude * exp(-(x - mean)^2 / (2 sigma^2))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gauss1d {
    pub baseline: f64,
    pub amplitude: f64,
    pub mean: f64,
    pub sigma: f64,
}

impl Gauss1d {
    pub fn eval(&self, x: f64) -> f64 {
        let d = x - self.mean;
        self.baseline + self.amplitude * (-(d * d) / (2.0 * self.sigma * self.sigma)).exp()
    }

    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.sigma.abs()
    }

    fn to_vec(self) -> DVector<f64> {
        DVector::from_vec(vec![self.baseline, self.amplitude, self.mean, self.sigma])
    }

    fn from_slice(p: &[f64]) -> Self {
        Self {
            baseline: p[0],
            amplitude: p[1],
            mean: p[2],
            sigma: p[3],
        }
    }
}

/// Axis-aligned 2D Gaussian on a constant background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gauss2d {
    pub baseline: f64,
    pub amplitude: f64,
    pub mean_x: f64,
    pub mean_y: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
}

impl Gauss2d {
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.mean_x;
        let dy = y - self.mean_y;
        self.baseline
            + self.amplitude
                * (-(dx * dx) / (2.0 * self.sigma_x * self.sigma_x)
                    - (dy * dy) / (2.0 * self.sigma_y * self.sigma_y))
                    .exp()
    }

    fn to_vec(self) -> DVector<f64> {
        DVector::from_vec(vec![
            self.baseline,
            self.amplitude,
            self.mean_x,
            self.mean_y,
            self.sigma_x,
            self.sigma_y,
        ])
    }

    fn from_slice(p: &[f64]) -> Self {
        Self {
            baseline: p[0],
            amplitude: p[1],
            mean_x: p[2],
            mean_y: p[3],
            sigma_x: p[4],
            sigma_y: p[5],
        }
    }
}

/// Result of a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit<P> {
    pub params: P,
    /// False when the initial guess was returned unrefined.
    pub converged: bool,
    pub evaluations: usize,
}

/// Profile-based initial guess of a 1D Gaussian.
///
/// The FWHM is taken between the samples closest to half height on each side
/// of the maximum. Returns `None` for empty or mismatched input.
pub fn initial_guess_1d(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Option<Gauss1d> {
    if y.is_empty() || x.len() != y.len() {
        return None;
    }
    let baseline = y.iter().copied().fold(f64::INFINITY, f64::min);
    let id_max = argmax(y.iter().copied())?;
    let amplitude = y[id_max] - baseline;
    let half: Vec<f64> = y
        .iter()
        .map(|v| (v - baseline - amplitude / 2.0).abs())
        .collect();
    let id1 = argmin(half[..id_max].iter().copied()).unwrap_or(0);
    let id2 = id_max + argmin(half[id_max..].iter().copied()).unwrap_or(0);
    let fwhm = x[id2] - x[id1];
    Some(Gauss1d {
        baseline,
        amplitude,
        mean: x[id_max],
        sigma: fwhm / FWHM_PER_SIGMA,
    })
}

/// Unbounded least-squares fit of a 1D Gaussian to `y(x)`.
pub fn fit_1d(x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> Option<Fit<Gauss1d>> {
    let guess = initial_guess_1d(x, y)?;
    let lower = [f64::NEG_INFINITY; 4];
    let upper = [f64::INFINITY; 4];

    let residuals = |p: &DVector<f64>| {
        let g = Gauss1d::from_slice(p.as_slice());
        DVector::from_iterator(x.len(), x.iter().zip(y.iter()).map(|(&xi, &yi)| g.eval(xi) - yi))
    };
    let jacobian = |p: &DVector<f64>| {
        let g = Gauss1d::from_slice(p.as_slice());
        let s2 = g.sigma * g.sigma;
        let mut j = DMatrix::zeros(x.len(), 4);
        for (row, &xi) in x.iter().enumerate() {
            let d = xi - g.mean;
            let e = (-(d * d) / (2.0 * s2)).exp();
            j[(row, 0)] = 1.0;
            j[(row, 1)] = e;
            j[(row, 2)] = g.amplitude * e * d / s2;
            j[(row, 3)] = g.amplitude * e * d * d / (s2 * g.sigma);
        }
        j
    };

    let outcome = solve_bounded(guess.to_vec(), &lower, &upper, residuals, jacobian);
    Some(Fit {
        params: Gauss1d::from_slice(outcome.params.as_slice()),
        converged: outcome.converged,
        evaluations: outcome.evaluations,
    })
}

/// Initial guess and bounds of the 2D fit, derived from the image profiles
/// and corner blocks.
pub fn initial_guess_2d(image: &Array2<f64>) -> Option<(Gauss2d, [f64; 6], [f64; 6])> {
    let (rows, cols) = image.dim();
    if rows == 0 || cols == 0 {
        return None;
    }
    let x = ndarray::Array1::from_iter((0..cols).map(|c| c as f64));
    let y = ndarray::Array1::from_iter((0..rows).map(|r| r as f64));
    let horizontal = image.mean_axis(Axis(0))?;
    let vertical = image.mean_axis(Axis(1))?;
    let gh = initial_guess_1d(x.view(), horizontal.view())?;
    let gv = initial_guess_1d(y.view(), vertical.view())?;

    let corners = corner_means(image);
    let baseline = crate::image::robust_floor(&corners);
    let max_corner = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let maximum = image.iter().copied().fold(f64::NEG_INFINITY, f64::max) - baseline;

    let guess = Gauss2d {
        baseline,
        amplitude: maximum,
        mean_x: gh.mean,
        mean_y: gv.mean,
        sigma_x: gh.sigma,
        sigma_y: gv.sigma,
    };
    let lower = [
        0.0,
        maximum * 0.8,
        gh.mean * 0.8,
        gv.mean * 0.8,
        gh.sigma * 0.8,
        gv.sigma * 0.8,
    ];
    let upper = [
        max_corner,
        maximum * 1.2,
        gh.mean * 1.2,
        gv.mean * 1.2,
        gh.sigma * 1.2,
        gv.sigma * 1.2,
    ];
    Some((guess, lower, upper))
}

/// Bounded fit of an axis-aligned 2D Gaussian to the whole image.
///
/// Pixel `(row, col)` sits at `x = col`, `y = row`.
pub fn fit_2d(image: &Array2<f64>) -> Option<Fit<Gauss2d>> {
    let (guess, lower, upper) = initial_guess_2d(image)?;
    let (rows, cols) = image.dim();
    let n = rows * cols;

    let residuals = |p: &DVector<f64>| {
        let g = Gauss2d::from_slice(p.as_slice());
        DVector::from_iterator(
            n,
            image
                .indexed_iter()
                .map(|((r, c), &z)| g.eval(c as f64, r as f64) - z),
        )
    };
    let jacobian = |p: &DVector<f64>| {
        let g = Gauss2d::from_slice(p.as_slice());
        let sx2 = g.sigma_x * g.sigma_x;
        let sy2 = g.sigma_y * g.sigma_y;
        let mut j = DMatrix::zeros(n, 6);
        for (row, ((r, c), _)) in image.indexed_iter().enumerate() {
            let dx = c as f64 - g.mean_x;
            let dy = r as f64 - g.mean_y;
            let e = (-(dx * dx) / (2.0 * sx2) - (dy * dy) / (2.0 * sy2)).exp();
            let ae = g.amplitude * e;
            j[(row, 0)] = 1.0;
            j[(row, 1)] = e;
            j[(row, 2)] = ae * dx / sx2;
            j[(row, 3)] = ae * dy / sy2;
            j[(row, 4)] = ae * dx * dx / (sx2 * g.sigma_x);
            j[(row, 5)] = ae * dy * dy / (sy2 * g.sigma_y);
        }
        j
    };

    let outcome = solve_bounded(guess.to_vec(), &lower, &upper, residuals, jacobian);
    if !outcome.converged {
        tracing::debug!(?guess, "2D fit did not converge, keeping initial guess");
    }
    Some(Fit {
        params: Gauss2d::from_slice(outcome.params.as_slice()),
        converged: outcome.converged,
        evaluations: outcome.evaluations,
    })
}

struct Outcome {
    params: DVector<f64>,
    converged: bool,
    evaluations: usize,
}

/// Projected Levenberg-Marquardt on `sum(residuals(p)^2)` inside `[lower, upper]`.
fn solve_bounded<R, J>(
    guess: DVector<f64>,
    lower: &[f64],
    upper: &[f64],
    residuals: R,
    jacobian: J,
) -> Outcome
where
    R: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    const FTOL: f64 = 1e-10;
    const XTOL: f64 = 1e-10;
    const GTOL: f64 = 1e-12;

    let unrefined = |evaluations| Outcome {
        params: guess.clone(),
        converged: false,
        evaluations,
    };

    let bounds_ok = lower.iter().zip(upper).all(|(lo, hi)| lo < hi);
    if !bounds_ok || guess.iter().any(|v| !v.is_finite()) {
        return unrefined(0);
    }
    let clamp = |p: &mut DVector<f64>| {
        for (i, v) in p.iter_mut().enumerate() {
            *v = v.clamp(lower[i], upper[i]);
        }
    };

    let mut p = guess.clone();
    clamp(&mut p);
    let mut r = residuals(&p);
    let mut cost = r.norm_squared();
    let mut evaluations = 1;
    if !cost.is_finite() {
        return unrefined(evaluations);
    }

    let mut lambda = 1e-3;
    while evaluations < MAX_EVALUATIONS {
        let j = jacobian(&p);
        let gradient = j.transpose() * &r;
        if gradient.amax() < GTOL {
            return Outcome { params: p, converged: true, evaluations };
        }
        let normal = j.transpose() * &j;

        loop {
            let mut damped = normal.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * normal[(i, i)].max(1e-12);
            }
            let Some(step) = damped.lu().solve(&(-&gradient)) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    return unrefined(evaluations);
                }
                continue;
            };

            let mut trial = &p + &step;
            clamp(&mut trial);
            let trial_r = residuals(&trial);
            let trial_cost = trial_r.norm_squared();
            evaluations += 1;

            if trial_cost.is_finite() && trial_cost < cost {
                let moved = (&trial - &p).norm();
                let reduction = cost - trial_cost;
                p = trial;
                r = trial_r;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if reduction <= FTOL * cost || moved <= XTOL * (p.norm() + XTOL) {
                    return Outcome { params: p, converged: true, evaluations };
                }
                break;
            }

            lambda *= 10.0;
            if lambda > 1e16 {
                // No descent left inside the box.
                return Outcome { params: p, converged: true, evaluations };
            }
            if evaluations >= MAX_EVALUATIONS {
                break;
            }
        }
    }
    unrefined(evaluations)
}

fn argmax(values: impl Iterator<Item = f64>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, v)| match best {
            Some((_, b)) if b <= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn profile(g: Gauss1d, n: usize) -> (Array1<f64>, Array1<f64>) {
        let x = Array1::from_iter((0..n).map(|i| i as f64));
        let y = x.mapv(|v| g.eval(v));
        (x, y)
    }

    #[test]
    fn initial_guess_reads_peak_and_width() {
        let truth = Gauss1d {
            baseline: 5.0,
            amplitude: 50.0,
            mean: 40.0,
            sigma: 6.0,
        };
        let (x, y) = profile(truth, 100);
        let guess = initial_guess_1d(x.view(), y.view()).unwrap();
        assert!((guess.baseline - 5.0).abs() < 1e-3);
        assert!((guess.amplitude - 50.0).abs() < 1e-3);
        assert_eq!(guess.mean, 40.0);
        // FWHM sampled on integer pixels
        assert!((guess.sigma - 6.0).abs() < 0.5, "sigma {}", guess.sigma);
    }

    #[test]
    fn peak_at_first_sample_uses_index_zero() {
        let x = Array1::from(vec![0.0, 1.0, 2.0, 3.0]);
        let y = Array1::from(vec![10.0, 6.0, 2.0, 1.0]);
        let guess = initial_guess_1d(x.view(), y.view()).unwrap();
        assert_eq!(guess.mean, 0.0);
        // Left half is empty; the right half-height sample is x = 1.
        assert!((guess.sigma - 1.0 / FWHM_PER_SIGMA).abs() < 1e-12);
    }

    #[test]
    fn fit_1d_recovers_parameters() {
        let truth = Gauss1d {
            baseline: 2.0,
            amplitude: 30.0,
            mean: 33.3,
            sigma: 4.2,
        };
        let (x, y) = profile(truth, 80);
        let fit = fit_1d(x.view(), y.view()).unwrap();
        assert!(fit.converged);
        assert!((fit.params.mean - 33.3).abs() < 1e-3);
        assert!((fit.params.sigma.abs() - 4.2).abs() < 1e-3);
        assert!((fit.params.fwhm() - 4.2 * FWHM_PER_SIGMA).abs() < 1e-2);
    }

    #[test]
    fn fit_2d_recovers_blob() {
        let truth = Gauss2d {
            baseline: 10.0,
            amplitude: 100.0,
            mean_x: 48.0,
            mean_y: 55.0,
            sigma_x: 9.0,
            sigma_y: 11.0,
        };
        let image = Array2::from_shape_fn((120, 100), |(r, c)| truth.eval(c as f64, r as f64));
        let fit = fit_2d(&image).unwrap();
        assert!(fit.converged);
        assert!((fit.params.mean_x - 48.0).abs() < 0.05);
        assert!((fit.params.mean_y - 55.0).abs() < 0.05);
        assert!((fit.params.sigma_x - 9.0).abs() < 0.1);
        assert!((fit.params.sigma_y - 11.0).abs() < 0.1);
    }

    #[test]
    fn inverted_bounds_return_guess() {
        // Flat image: zero width guess collapses the sigma bounds.
        let image = Array2::from_elem((30, 30), 7.0);
        let (guess, _, _) = initial_guess_2d(&image).unwrap();
        let fit = fit_2d(&image).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.params, guess);
        assert_eq!(fit.evaluations, 0);
    }
}
