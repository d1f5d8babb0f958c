//! Tamper Detector: pixel-level forensic suspicion scoring.
//!
//! Three independent indicators, each normalized to [0,1], are averaged:
//! Laplacian variance outside the plausible band for a genuine scan
//! (over-smoothed or noise-injected), Canny edge-density spread across the
//! four quadrants (localized splicing), and color-histogram bins spiking
//! several multiples above the per-channel mean (re-compression banding).
//! Any internal failure yields the neutral 0.5, never a silent "clean".
//! The rendered overlay is purely illustrative and plays no part in
//! scoring.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{GrayImage, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use tracing::warn;

use crate::config::TamperConfig;
use crate::raster::bound_to;
use crate::types::TamperReport;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const HISTOGRAM_BINS: usize = 64;
const SPIKE_MULTIPLIER: f64 = 4.0;
const SPIKE_DIVISOR: f64 = 20.0;
const OVERLAY_BLUR_SIGMA: f32 = 3.0;
const OVERLAY_ALPHA: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct TamperDetector {
    config: TamperConfig,
}

impl TamperDetector {
    pub fn new(config: TamperConfig) -> Self {
        Self { config }
    }

    /// Total function: any degenerate input degrades to the neutral report.
    pub fn detect(&self, image: &RgbImage) -> TamperReport {
        let bounded = bound_to(image, self.config.max_dimension);
        if bounded.width() < 2 || bounded.height() < 2 {
            warn!("raster too small for forensic indicators");
            return TamperReport::default();
        }
        let gray = image::imageops::grayscale(&bounded);

        let indicators = [
            self.noise_indicator(&gray),
            edge_spread_indicator(&gray),
            histogram_spike_indicator(&bounded),
        ];
        let score =
            (indicators.iter().sum::<f64>() / indicators.len() as f64).clamp(0.0, 1.0);

        let heatmap = render_overlay(&bounded, &gray).unwrap_or_default();

        TamperReport { score, heatmap }
    }

    /// Focus/noise indicator from the variance of the Laplacian response.
    /// Genuine scans sit inside a plausible band; too low means
    /// over-smoothing, too high means injected noise.
    fn noise_indicator(&self, gray: &GrayImage) -> f64 {
        let response = laplacian_filter(gray);
        let n = response.len() as f64;
        if n == 0.0 {
            return 0.5;
        }
        let mean = response.iter().map(|v| *v as f64).sum::<f64>() / n;
        let variance = response
            .iter()
            .map(|v| {
                let d = *v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / n;

        if variance < self.config.variance_floor || variance > self.config.variance_ceiling {
            0.5
        } else {
            0.1
        }
    }
}

/// Edge-density uniformity across the four quadrants. A large spread
/// between the densest and sparsest quadrant suggests localized splicing.
fn edge_spread_indicator(gray: &GrayImage) -> f64 {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let (w, h) = (edges.width(), edges.height());
    let (hw, hh) = (w / 2, h / 2);
    if hw == 0 || hh == 0 {
        return 0.0;
    }

    let density = |x0: u32, y0: u32, x1: u32, y1: u32| -> f64 {
        let mut on = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                if edges.get_pixel(x, y)[0] > 0 {
                    on += 1;
                }
            }
        }
        on as f64 / ((x1 - x0) as u64 * (y1 - y0) as u64) as f64
    };

    let densities = [
        density(0, 0, hw, hh),
        density(hw, 0, w, hh),
        density(0, hh, hw, h),
        density(hw, hh, w, h),
    ];
    let max = densities.iter().cloned().fold(f64::MIN, f64::max);
    let min = densities.iter().cloned().fold(f64::MAX, f64::min);
    ((max - min) * 3.0).min(1.0)
}

/// Counts histogram bins whose population exceeds several multiples of the
/// per-channel mean, over reduced-resolution RGB histograms.
fn histogram_spike_indicator(image: &RgbImage) -> f64 {
    let mut hists = [[0u64; HISTOGRAM_BINS]; 3];
    let bin_width = 256 / HISTOGRAM_BINS;
    for pixel in image.pixels() {
        for (c, hist) in hists.iter_mut().enumerate() {
            hist[pixel[c] as usize / bin_width] += 1;
        }
    }

    let mut spikes = 0u64;
    for hist in &hists {
        let mean = hist.iter().sum::<u64>() as f64 / HISTOGRAM_BINS as f64;
        spikes += hist
            .iter()
            .filter(|&&count| count as f64 > mean * SPIKE_MULTIPLIER)
            .count() as u64;
    }
    (spikes as f64 / SPIKE_DIVISOR).min(1.0)
}

/// Blends a blurred, false-colored Canny edge map over the original at low
/// opacity and returns it as a base64 PNG.
fn render_overlay(image: &RgbImage, gray: &GrayImage) -> Option<String> {
    let edges = canny(gray, CANNY_LOW, CANNY_HIGH);
    let blurred = gaussian_blur_f32(&edges, OVERLAY_BLUR_SIGMA);

    let peak = blurred.iter().copied().max().unwrap_or(0).max(1);
    let mut overlay = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in overlay.enumerate_pixels_mut() {
        let intensity = blurred.get_pixel(x, y)[0] as u16 * 255 / peak as u16;
        let [hr, hg, hb] = jet_color(intensity.min(255) as u8);
        let base = image.get_pixel(x, y);
        let blend = |orig: u8, heat: u8| -> u8 {
            ((orig as f32) * (1.0 - OVERLAY_ALPHA) + (heat as f32) * OVERLAY_ALPHA) as u8
        };
        *pixel = image::Rgb([
            blend(base[0], hr),
            blend(base[1], hg),
            blend(base[2], hb),
        ]);
    }

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(overlay)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(BASE64.encode(buf))
}

/// Classic blue-to-red "jet" ramp for false coloring.
fn jet_color(v: u8) -> [u8; 3] {
    let t = v as f32 / 255.0;
    let r = ((1.5 - (4.0 * t - 3.0).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    let g = ((1.5 - (4.0 * t - 2.0).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    let b = ((1.5 - (4.0 * t - 1.0).abs()).clamp(0.0, 1.0) * 255.0) as u8;
    [r, g, b]
}
