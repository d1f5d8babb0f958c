//! Logo Matcher: correlates the raster against a reference issuer gallery.
//!
//! The candidate image is downscaled to a bounded width and each reference
//! logo is scaled down (never up) to fit inside it before normalized
//! cross-correlation template matching. Scanning stops early once a
//! near-certain match is found; the rest of the gallery adds negligible
//! decision value at that point. An absent or empty gallery is a normal
//! state and produces no matches and no ambiguity flag.

use std::fs;
use std::path::Path;

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use imageproc::template_matching::{match_template, MatchTemplateMethod};
use tracing::{debug, info, warn};

use crate::config::LogoConfig;
use crate::types::{LogoMatch, LogoMatchSet};

const GALLERY_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Read-only reference gallery, loaded once per process and shared
/// immutably across requests.
#[derive(Debug, Default)]
pub struct LogoGallery {
    logos: Vec<(String, GrayImage)>,
}

impl LogoGallery {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads up to `limit` readable grayscale references from a directory.
    /// A missing or empty directory is not an error.
    pub fn load(dir: &Path, limit: usize) -> Self {
        let mut logos = Vec::new();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => {
                info!(dir = %dir.display(), "logo gallery directory absent; matching disabled");
                return Self::empty();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| GALLERY_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        for path in paths {
            if logos.len() >= limit {
                break;
            }
            match image::open(&path) {
                Ok(img) => {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default();
                    logos.push((name, img.to_luma8()));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable reference logo");
                }
            }
        }

        info!(count = logos.len(), "reference logo gallery loaded");
        Self { logos }
    }

    pub fn len(&self) -> usize {
        self.logos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logos.is_empty()
    }

    /// Builds a gallery from already-decoded references.
    pub fn from_images(logos: Vec<(String, GrayImage)>) -> Self {
        Self { logos }
    }
}

#[derive(Debug, Clone)]
pub struct LogoMatcher {
    config: LogoConfig,
}

impl LogoMatcher {
    pub fn new(config: LogoConfig) -> Self {
        Self { config }
    }

    pub fn match_logos(&self, image: &RgbImage, gallery: &LogoGallery) -> LogoMatchSet {
        if gallery.is_empty() {
            return LogoMatchSet::default();
        }

        let candidate = self.bounded_gray(image);
        let mut matches = Vec::new();

        for (name, logo) in &gallery.logos {
            let confidence = correlate(&candidate, logo);
            if confidence >= self.config.match_threshold {
                debug!(logo = %name, confidence, "reference logo matched");
                matches.push(LogoMatch {
                    name: name.clone(),
                    confidence,
                });
                if confidence >= self.config.early_exit_threshold {
                    break;
                }
            }
        }

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let ambiguous = !matches.is_empty()
            && matches.iter().all(|m| m.confidence < self.config.ambiguity_band);

        LogoMatchSet { matches, ambiguous }
    }

    fn bounded_gray(&self, image: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(image);
        let max_w = self.config.max_candidate_width;
        if gray.width() <= max_w {
            return gray;
        }
        let ratio = max_w as f32 / gray.width() as f32;
        let h = ((gray.height() as f32) * ratio).round().max(1.0) as u32;
        imageops::resize(&gray, max_w, h, FilterType::Triangle)
    }
}

/// Peak normalized cross-correlation of `logo` against `candidate`, with the
/// logo scaled down to fit inside the candidate when necessary. Returns a
/// confidence clamped to [0,1].
fn correlate(candidate: &GrayImage, logo: &GrayImage) -> f32 {
    let (cw, ch) = (candidate.width(), candidate.height());
    let (lw, lh) = (logo.width(), logo.height());
    if cw == 0 || ch == 0 || lw == 0 || lh == 0 {
        return 0.0;
    }

    let scaled;
    let template = if lw > cw || lh > ch {
        // Scale down only; a small reference is never inflated to fill a
        // larger target region.
        let scale = (cw as f32 / lw as f32).min(ch as f32 / lh as f32) * 0.9;
        let nw = ((lw as f32) * scale).floor().max(1.0) as u32;
        let nh = ((lh as f32) * scale).floor().max(1.0) as u32;
        scaled = imageops::resize(logo, nw, nh, FilterType::Triangle);
        &scaled
    } else {
        logo
    };

    if template.width() > cw || template.height() > ch {
        return 0.0;
    }

    let result = match_template(
        candidate,
        template,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );
    let peak = result.iter().fold(f32::MIN, |acc, v| acc.max(*v));
    peak.clamp(0.0, 1.0)
}
