//! Configuration types and validation for the analysis pipeline.
//!
//! Every analyzer threshold lives here rather than as a hardcoded constant;
//! `PipelineConfig::validate` rejects combinations the scorer cannot handle.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Rasterization settings for the first-page render.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    /// Render resolution. 200 trades OCR/logo accuracy for throughput.
    pub dpi: u32,
    /// Analyzers operate on a copy bounded to this dimension; the preview
    /// is encoded from the full raster.
    pub analysis_max_dimension: u32,
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            analysis_max_dimension: 1200,
        }
    }
}

/// Field extraction mode. `Simple` short-circuits the pattern cascade and
/// only carries raw recognized text; the scorer treats the resulting empty
/// fields exactly like an extraction that found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Full,
    Simple,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Full,
        }
    }
}

/// QR reachability probing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrConfig {
    /// Single bounded attempt; one redirect hop at most, never retried.
    pub probe_timeout_secs: u64,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 3,
        }
    }
}

/// Logo gallery and template-matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub gallery_dir: PathBuf,
    /// Correlation confidence required to record a match.
    pub match_threshold: f32,
    /// Matches all below this band raise the ambiguity flag.
    pub ambiguity_band: f32,
    /// Scanning stops once a match reaches this confidence.
    pub early_exit_threshold: f32,
    /// Candidate image is downscaled to this width before matching.
    pub max_candidate_width: u32,
    /// At most this many reference logos are loaded.
    pub max_gallery_size: usize,
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            gallery_dir: PathBuf::from("assets/logos"),
            match_threshold: 0.50,
            ambiguity_band: 0.70,
            early_exit_threshold: 0.80,
            max_candidate_width: 800,
            max_gallery_size: 10,
        }
    }
}

/// Tamper detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TamperConfig {
    pub max_dimension: u32,
    /// Plausible Laplacian-variance band for a genuine scan; variance
    /// outside it scores suspicious.
    pub variance_floor: f64,
    pub variance_ceiling: f64,
}

impl Default for TamperConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            variance_floor: 30.0,
            variance_ceiling: 1000.0,
        }
    }
}

/// Per-signal fusion weights. Must sum to 1.0 for the final score to stay
/// in [0,100]; enforced by `validate()`, not inside the scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustWeights {
    pub ocr: f64,
    pub metadata: f64,
    pub qr: f64,
    pub logo: f64,
    pub tamper: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            ocr: 0.20,
            metadata: 0.15,
            qr: 0.20,
            logo: 0.20,
            tamper: 0.25,
        }
    }
}

impl TrustWeights {
    pub fn sum(&self) -> f64 {
        self.ocr + self.metadata + self.qr + self.logo + self.tamper
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub raster: RasterConfig,
    pub extraction: ExtractionConfig,
    pub qr: QrConfig,
    pub logo: LogoConfig,
    pub tamper: TamperConfig,
    pub weights: TrustWeights,
    pub server: ServerConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.raster.dpi == 0 || self.raster.dpi > 600 {
            return Err(Error::Config("DPI must be in 1..=600".into()));
        }
        if (self.weights.sum() - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "Trust weights must sum to 1.0 (got {})",
                self.weights.sum()
            )));
        }
        for (label, v) in [
            ("match_threshold", self.logo.match_threshold),
            ("ambiguity_band", self.logo.ambiguity_band),
            ("early_exit_threshold", self.logo.early_exit_threshold),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("Logo {} must be in [0,1]", label)));
            }
        }
        if self.tamper.variance_floor >= self.tamper.variance_ceiling {
            return Err(Error::Config(
                "Tamper variance band floor must be below ceiling".into(),
            ));
        }
        if self.qr.probe_timeout_secs == 0 {
            return Err(Error::Config("Probe timeout must be at least 1s".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn default_weights_sum_to_one() {
        assert!((TrustWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn skewed_weights_are_rejected() {
        let mut config = PipelineConfig::default();
        config.weights.tamper = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_variance_band_is_rejected() {
        let mut config = PipelineConfig::default();
        config.tamper.variance_floor = 2000.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert!((parsed.weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(parsed.raster.dpi, 200);
    }
}
