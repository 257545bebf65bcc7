//! Beam centroid extraction from camera frames.
//!
//! Images are `Array2<f64>` indexed `(row, col)`; `x` runs along columns and
//! `y` along rows.

use std::collections::HashMap;

use ::image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::{Array1, Array2, Axis};

use crate::gauss;

/// Side of the square corner blocks used for the background estimate.
pub const CORNER_BLOCK: usize = 10;

/// Minimum peak height above background for a spot to be analysed.
pub const MIN_SIGNAL: f64 = 10.0;

/// Threshold position between background and peak.
pub const THRESHOLD_FRACTION: f64 = 0.33;

/// Beam size and position from the 2D Gaussian fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Intensity-weighted spot center plus the fitted ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    pub ellipse: Ellipse,
}

/// Means of the up-left, up-right, down-left and down-right corner blocks.
pub fn corner_means(image: &Array2<f64>) -> [f64; 4] {
    let (rows, cols) = image.dim();
    let h = CORNER_BLOCK.min(rows);
    let w = CORNER_BLOCK.min(cols);
    let block = |r0: usize, c0: usize| {
        image
            .slice(ndarray::s![r0..r0 + h, c0..c0 + w])
            .mean()
            .unwrap_or(0.0)
    };
    [
        block(0, 0),
        block(0, cols - w),
        block(rows - h, 0),
        block(rows - h, cols - w),
    ]
}

/// Mean of the corner values at or below their median.
pub fn robust_floor(corners: &[f64; 4]) -> f64 {
    let mut sorted = *corners;
    sorted.sort_by(f64::total_cmp);
    let median = (sorted[1] + sorted[2]) / 2.0;
    let kept: Vec<f64> = corners.iter().copied().filter(|&c| c <= median).collect();
    kept.iter().sum::<f64>() / kept.len() as f64
}

/// Outlier-robust background level of an image.
pub fn background(image: &Array2<f64>) -> f64 {
    if image.is_empty() {
        return 0.0;
    }
    robust_floor(&corner_means(image))
}

/// Horizontal (column means) and vertical (row means) profiles.
pub fn profiles(image: &Array2<f64>) -> Option<(Array1<f64>, Array1<f64>)> {
    Some((image.mean_axis(Axis(0))?, image.mean_axis(Axis(1))?))
}

/// Pixels at or above `threshold`.
pub fn threshold_mask(image: &Array2<f64>, threshold: f64) -> Array2<bool> {
    image.mapv(|v| v >= threshold)
}

const SET: u8 = 255;

fn to_gray(mask: &Array2<bool>) -> GrayImage {
    let (rows, cols) = mask.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([if mask[(y as usize, x as usize)] { SET } else { 0 }])
    })
}

fn from_gray(image: &GrayImage) -> Array2<bool> {
    let (width, height) = image.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(r, c)| {
        image.get_pixel(c as u32, r as u32).0[0] != 0
    })
}

// 2x2 elliptic kernel anchored at its lower-right cell: the pixel itself plus
// its upper and left neighbours.
fn kernel() -> Mask {
    let cells = GrayImage::from_fn(2, 2, |x, y| Luma([if x + y > 0 { SET } else { 0 }]));
    Mask::from_image(&cells, 1, 1)
}

/// One binary erosion with the 2x2 elliptic kernel.
pub fn erode(mask: &Array2<bool>) -> Array2<bool> {
    from_gray(&grayscale_erode(&to_gray(mask), &kernel()))
}

/// One binary dilation with the 2x2 elliptic kernel.
pub fn dilate(mask: &Array2<bool>) -> Array2<bool> {
    from_gray(&grayscale_dilate(&to_gray(mask), &kernel()))
}

/// One external 8-connected region of a mask. Its holes, and anything lying
/// inside them, count towards the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// Pixel count of the filled region.
    pub area: usize,
    /// First pixel of the region in raster order, `(row, col)`.
    pub seed: (usize, usize),
    id: u32,
}

/// External regions of a mask, labelled once.
#[derive(Debug, Clone)]
pub struct Regions {
    // Region id per pixel, 0 outside every region.
    owner: Array2<u32>,
    found: Vec<Region>,
}

impl Regions {
    /// Number of external regions.
    pub fn len(&self) -> usize {
        self.found.len()
    }

    /// True when the mask has no foreground.
    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// Regions in order of their seed pixel.
    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.found.iter()
    }

    /// Region with the largest filled area, the last one on ties.
    pub fn largest(&self) -> Option<&Region> {
        self.found.iter().max_by_key(|r| r.area)
    }

    /// Filled mask of `region` over the full image.
    pub fn mask(&self, region: &Region) -> Array2<bool> {
        self.owner.mapv(|o| o == region.id)
    }
}

/// External regions of `mask`, holes filled.
///
/// Foreground is labelled with 8-connectivity and background with
/// 4-connectivity on a copy padded by one background pixel, so everything
/// outside the regions is a single background component. Components are
/// visited in order of their first pixel; the pixel right above it belongs
/// to the component enclosing it, whose region it joins.
pub fn regions(mask: &Array2<bool>) -> Regions {
    let (rows, cols) = mask.dim();
    let inside = |x: u32, y: u32| {
        let (x, y) = (x as usize, y as usize);
        (1..=cols).contains(&x) && (1..=rows).contains(&y) && mask[(y - 1, x - 1)]
    };
    let (width, height) = (cols as u32 + 2, rows as u32 + 2);
    let foreground = GrayImage::from_fn(width, height, |x, y| {
        Luma([if inside(x, y) { SET } else { 0 }])
    });
    let background = GrayImage::from_fn(width, height, |x, y| {
        Luma([if inside(x, y) { 0 } else { SET }])
    });
    let fg = connected_components(&foreground, Connectivity::Eight, Luma([0u8]));
    let bg = connected_components(&background, Connectivity::Four, Luma([0u8]));

    // Components in order of first appearance; node 0 is the outside.
    let mut index: HashMap<(bool, u32), usize> = HashMap::new();
    let mut first: Vec<(u32, u32)> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut node = Array2::<usize>::zeros((height as usize, width as usize));
    for y in 0..height {
        for x in 0..width {
            let set = inside(x, y);
            let pixel = if set { fg.get_pixel(x, y) } else { bg.get_pixel(x, y) };
            let label = pixel.0[0];
            let n = *index.entry((set, label)).or_insert_with(|| {
                first.push((x, y));
                count.push(0);
                first.len() - 1
            });
            count[n] += 1;
            node[(y as usize, x as usize)] = n;
        }
    }

    // Row 0 is padding, so every other component starts below it.
    let mut root: Vec<Option<usize>> = vec![None; first.len()];
    let mut found: Vec<Region> = Vec::new();
    for (n, &(x, y)) in first.iter().enumerate().skip(1) {
        let above = node[(y as usize - 1, x as usize)];
        root[n] = match root[above] {
            Some(r) => Some(r),
            None if inside(x, y) => {
                found.push(Region {
                    area: 0,
                    seed: (y as usize - 1, x as usize - 1),
                    id: found.len() as u32 + 1,
                });
                Some(found.len() - 1)
            }
            None => None,
        };
    }
    for (n, r) in root.iter().enumerate() {
        if let Some(r) = r {
            found[*r].area += count[n];
        }
    }

    let owner = Array2::from_shape_fn((rows, cols), |(r, c)| {
        root[node[(r + 1, c + 1)]].map_or(0, |i| found[i].id)
    });
    Regions { owner, found }
}

/// Intensity-weighted center `(m10/m00, m01/m00)` of the region.
pub fn moments_centroid(image: &Array2<f64>, region: &Array2<bool>) -> Option<(f64, f64)> {
    let (mut m00, mut m10, mut m01) = (0.0, 0.0, 0.0);
    for (((r, c), &v), &inside) in image.indexed_iter().zip(region.iter()) {
        if !inside {
            continue;
        }
        m00 += v;
        m10 += v * c as f64;
        m01 += v * r as f64;
    }
    if m00 == 0.0 {
        None
    } else {
        Some((m10 / m00, m01 / m00))
    }
}

/// Locate the beam in `image`.
///
/// Returns `None` when the peak rises at most [`MIN_SIGNAL`] above the
/// background or when no region survives thresholding. The center comes from
/// the moments of the largest region; the ellipse comes from a 2D Gaussian
/// fit of the full frame.
pub fn compute_centroid(image: &Array2<f64>) -> Option<Centroid> {
    if image.is_empty() {
        return None;
    }
    let floor = background(image);
    let peak = image.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    tracing::debug!(min = floor, max = peak, "Centroid input levels");
    if (peak - floor).abs() <= MIN_SIGNAL {
        return None;
    }

    let threshold = floor + THRESHOLD_FRACTION * (peak - floor);
    let mask = dilate(&erode(&threshold_mask(image, threshold)));
    let found = regions(&mask);
    tracing::debug!(threshold, regions = found.len(), "Centroid thresholding");
    let largest = found.largest()?;

    let fit = gauss::fit_2d(image)?;
    let g = fit.params;
    let ellipse = Ellipse {
        x: g.mean_x,
        y: g.mean_y,
        width: 2.0 * std::f64::consts::SQRT_2 * g.sigma_x,
        height: 2.0 * std::f64::consts::SQRT_2 * g.sigma_y,
    };
    tracing::debug!(?ellipse, converged = fit.converged, "Ellipse");

    let (x, y) = moments_centroid(image, &found.mask(largest))?;
    Some(Centroid { x, y, ellipse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauss::Gauss2d;

    fn blob(mean_x: f64, mean_y: f64, amplitude: f64) -> Array2<f64> {
        let g = Gauss2d {
            baseline: 10.0,
            amplitude,
            mean_x,
            mean_y,
            sigma_x: 8.0,
            sigma_y: 10.0,
        };
        Array2::from_shape_fn((120, 100), |(r, c)| g.eval(c as f64, r as f64))
    }

    #[test]
    fn centroid_of_synthetic_blob() {
        let image = blob(47.0, 58.5, 100.0);
        let centroid = compute_centroid(&image).unwrap();
        assert!((centroid.x - 47.0).abs() < 1.0, "x = {}", centroid.x);
        assert!((centroid.y - 58.5).abs() < 1.0, "y = {}", centroid.y);
        assert!((centroid.ellipse.x - 47.0).abs() < 0.1);
        assert!((centroid.ellipse.width - 2.0 * std::f64::consts::SQRT_2 * 8.0).abs() < 0.5);
    }

    #[test]
    fn weak_signal_has_no_centroid() {
        assert_eq!(compute_centroid(&blob(50.0, 60.0, 10.0)), None);
        assert_eq!(compute_centroid(&Array2::from_elem((40, 40), 3.0)), None);
        assert!(compute_centroid(&blob(50.0, 60.0, 11.0)).is_some());
    }

    #[test]
    fn background_ignores_bright_corner() {
        let mut image = Array2::from_elem((50, 50), 4.0);
        image.slice_mut(ndarray::s![0..10, 0..10]).fill(200.0);
        assert_eq!(background(&image), 4.0);
    }

    #[test]
    fn erosion_removes_isolated_pixels() {
        let mut mask = Array2::from_elem((8, 8), false);
        mask[(1, 1)] = true;
        mask.slice_mut(ndarray::s![3..7, 3..7]).fill(true);
        let opened = dilate(&erode(&mask));
        assert!(!opened[(1, 1)]);
        assert!(opened[(4, 4)]);
        // The even kernel moves the block one pixel down and right, minus
        // the far corner.
        assert!(!opened[(3, 3)]);
        assert!(opened[(7, 4)]);
        assert!(!opened[(7, 7)]);
        assert_eq!(opened.iter().filter(|v| **v).count(), 15);
    }

    #[test]
    fn regions_fill_holes_and_skip_nested() {
        let mut mask = Array2::from_elem((9, 9), false);
        // Ring with an island inside.
        mask.slice_mut(ndarray::s![1..8, 1..8]).fill(true);
        mask.slice_mut(ndarray::s![2..7, 2..7]).fill(false);
        mask[(4, 4)] = true;
        let found = regions(&mask);
        assert_eq!(found.len(), 1);
        let ring = found.largest().unwrap();
        assert_eq!(ring.area, 49);
        assert_eq!(ring.seed, (1, 1));
        let filled = found.mask(ring);
        assert!(filled[(3, 3)]);
        assert!(filled[(4, 4)]);
        assert!(!filled[(0, 0)]);
        assert_eq!(filled.iter().filter(|v| **v).count(), 49);
    }

    #[test]
    fn nested_rings_join_the_outer_region() {
        let mut mask = Array2::from_elem((14, 20), false);
        // Closed ring holding a second ring and an island.
        mask.slice_mut(ndarray::s![1..12, 1..12]).fill(true);
        mask.slice_mut(ndarray::s![2..11, 2..11]).fill(false);
        mask.slice_mut(ndarray::s![4..9, 4..9]).fill(true);
        mask.slice_mut(ndarray::s![5..8, 5..8]).fill(false);
        mask[(6, 6)] = true;
        // Solid square.
        mask.slice_mut(ndarray::s![2..5, 15..18]).fill(true);
        // Ring opened on its left side, so its inside is background.
        mask.slice_mut(ndarray::s![7..12, 14..19]).fill(true);
        mask.slice_mut(ndarray::s![8..11, 15..18]).fill(false);
        mask[(9, 14)] = false;

        let found = regions(&mask);
        let mut areas: Vec<usize> = found.iter().map(|r| r.area).collect();
        areas.sort();
        assert_eq!(areas, vec![9, 15, 121]);

        let outer = found.largest().unwrap();
        let filled = found.mask(outer);
        assert!(filled[(6, 6)]);
        assert!(filled[(3, 3)]);
        assert!(!filled[(3, 16)]);
        assert!(!filled[(9, 16)]);
    }

    #[test]
    fn speckle_frame_labels_every_spot() {
        // 3x3 spots every 6 pixels on a flat background.
        let image = Array2::from_shape_fn((600, 800), |(r, c)| {
            if r % 6 >= 3 && c % 6 >= 3 {
                200.0
            } else {
                10.0
            }
        });
        let mask = dilate(&erode(&threshold_mask(&image, 72.0)));
        let found = regions(&mask);
        assert_eq!(found.len(), 100 * 133);
        // The bottom row of spots is clipped by the frame edge.
        assert_eq!(found.iter().filter(|r| r.area == 8).count(), 99 * 133);
        assert_eq!(found.iter().filter(|r| r.area == 6).count(), 133);

        let spot = found.largest().unwrap();
        assert_eq!(spot.area, 8);
        assert_eq!(found.mask(spot).iter().filter(|v| **v).count(), 8);
    }

    #[test]
    fn centroid_stays_on_the_main_spot() {
        let single = blob(35.0, 60.0, 100.0);
        let side = Gauss2d {
            baseline: 0.0,
            amplitude: 60.0,
            mean_x: 80.0,
            mean_y: 25.0,
            sigma_x: 3.0,
            sigma_y: 3.0,
        };
        let image = Array2::from_shape_fn(single.dim(), |(r, c)| {
            single[(r, c)] + side.eval(c as f64, r as f64)
        });

        // Both spots clear the threshold as separate regions.
        let threshold = 10.0 + THRESHOLD_FRACTION * 100.0;
        let found = regions(&dilate(&erode(&threshold_mask(&image, threshold))));
        assert_eq!(found.len(), 2);

        let alone = compute_centroid(&single).unwrap();
        let centroid = compute_centroid(&image).unwrap();
        assert!((centroid.x - 35.0).abs() < 1.0, "x = {}", centroid.x);
        assert!((centroid.y - 60.0).abs() < 1.0, "y = {}", centroid.y);
        assert!((centroid.x - alone.x).abs() < 0.05, "{} vs {}", centroid.x, alone.x);
        assert!((centroid.y - alone.y).abs() < 0.05, "{} vs {}", centroid.y, alone.y);
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut mask = Array2::from_elem((4, 4), false);
        mask[(0, 0)] = true;
        mask[(1, 1)] = true;
        mask[(3, 3)] = true;
        let mut areas: Vec<usize> = regions(&mask).iter().map(|r| r.area).collect();
        areas.sort();
        assert_eq!(areas, vec![1, 2]);
    }
}
