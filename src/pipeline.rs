//! Analysis pipeline: decode, fan out the five analyzers, fuse.
//!
//! Decode failure is the only fatal outcome; it aborts before any analyzer
//! runs. The analyzers have no data dependency on one another, so they run
//! concurrently on blocking tasks and the fusion step joins all five. A
//! degraded analyzer (including one whose task panicked) substitutes its
//! documented neutral default so a decodable document always yields a
//! verdict. There is no cancellation: a request runs to completion.

use std::io::Cursor;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::RgbImage;
use tokio::task;
use tracing::{info, instrument, warn};

use crate::analyzer::fields::FieldExtractor;
use crate::analyzer::logo::{LogoGallery, LogoMatcher};
use crate::analyzer::metadata::MetadataAnalyzer;
use crate::analyzer::qr::{detect_code, LinkProbe, QrVerifier};
use crate::analyzer::tamper::TamperDetector;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::raster::{bound_to, Rasterizer};
use crate::recognize::TextRecognizer;
use crate::score::TrustScorer;
use crate::types::{CertificateAnalysis, FieldSet, QrResult, TamperReport};

pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Rasterizer,
    extractor: FieldExtractor,
    metadata: MetadataAnalyzer,
    qr: QrVerifier<Arc<dyn LinkProbe>>,
    logo_matcher: LogoMatcher,
    tamper: TamperDetector,
    scorer: TrustScorer,
    recognizer: Arc<dyn TextRecognizer>,
    gallery: Arc<LogoGallery>,
}

impl Pipeline {
    /// Builds the pipeline from explicitly constructed dependencies. The
    /// recognition engine and logo gallery are owned by the composition
    /// root and injected here; nothing is lazily initialized per request.
    pub fn new(
        config: PipelineConfig,
        recognizer: Arc<dyn TextRecognizer>,
        probe: Arc<dyn LinkProbe>,
        gallery: Arc<LogoGallery>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rasterizer: Rasterizer::new(config.raster.clone()),
            extractor: FieldExtractor::new(config.extraction.clone()),
            metadata: MetadataAnalyzer::new(),
            qr: QrVerifier::new(probe),
            logo_matcher: LogoMatcher::new(config.logo.clone()),
            tamper: TamperDetector::new(config.tamper.clone()),
            scorer: TrustScorer::new(config.weights.clone()),
            recognizer,
            gallery,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full evidence pipeline over one uploaded document.
    #[instrument(skip_all, fields(bytes = bytes.len()))]
    pub async fn analyze(&self, bytes: &[u8]) -> Result<CertificateAnalysis> {
        let raster = self.rasterizer.rasterize(bytes)?;
        let preview = encode_png_base64(&raster).unwrap_or_default();
        let analysis = Arc::new(bound_to(&raster, self.config.raster.analysis_max_dimension));

        let fields_task = task::spawn_blocking({
            let img = Arc::clone(&analysis);
            let recognizer = Arc::clone(&self.recognizer);
            let extractor = self.extractor.clone();
            move || {
                let text = recognizer.recognize(&img);
                extractor.extract(&text)
            }
        });

        let metadata_task = task::spawn_blocking({
            let bytes = bytes.to_vec();
            let analyzer = self.metadata.clone();
            move || analyzer.analyze(&bytes)
        });

        let qr_future = async {
            let detect_task = task::spawn_blocking({
                let img = Arc::clone(&analysis);
                move || {
                    let gray = image::imageops::grayscale(&*img);
                    detect_code(&gray)
                }
            });
            match detect_task.await {
                Ok(Some(content)) => {
                    let validation = self.qr.classify(&content).await;
                    QrResult {
                        found: true,
                        content,
                        validation,
                    }
                }
                Ok(None) => QrResult::default(),
                Err(e) => {
                    warn!(error = %e, "QR detection task failed; degrading to neutral");
                    QrResult::default()
                }
            }
        };

        let logo_task = task::spawn_blocking({
            let img = Arc::clone(&analysis);
            let matcher = self.logo_matcher.clone();
            let gallery = Arc::clone(&self.gallery);
            move || matcher.match_logos(&img, &gallery)
        });

        let tamper_task = task::spawn_blocking({
            let img = Arc::clone(&analysis);
            let detector = self.tamper.clone();
            move || detector.detect(&img)
        });

        let (fields, metadata, qr, logos, tamper) = tokio::join!(
            fields_task,
            metadata_task,
            qr_future,
            logo_task,
            tamper_task
        );

        let fields = fields.unwrap_or_else(|e| {
            warn!(error = %e, "field extraction task failed; degrading to empty fields");
            FieldSet::default()
        });
        let metadata = metadata.unwrap_or_else(|e| {
            warn!(error = %e, "metadata task failed; degrading to empty report");
            Default::default()
        });
        let logos = logos.unwrap_or_else(|e| {
            warn!(error = %e, "logo task failed; degrading to no matches");
            Default::default()
        });
        let tamper = tamper.unwrap_or_else(|e| {
            warn!(error = %e, "tamper task failed; degrading to neutral score");
            TamperReport::default()
        });

        let trust_evaluation = self.scorer.evaluate(&fields, &metadata, &qr, &logos, &tamper);
        info!(
            score = trust_evaluation.trust_score,
            verdict = ?trust_evaluation.verdict,
            "analysis complete"
        );

        Ok(CertificateAnalysis {
            certificate_preview: preview,
            ocr: fields,
            metadata,
            qr,
            logo_detection: logos,
            tamper_report: tamper,
            trust_evaluation,
        })
    }

    /// Recognized text alone, for the content-digest endpoint.
    pub async fn recognize_text(&self, bytes: &[u8]) -> Result<String> {
        let raster = self.rasterizer.rasterize(bytes)?;
        let bounded = bound_to(&raster, self.config.raster.analysis_max_dimension);
        let recognizer = Arc::clone(&self.recognizer);
        let text = task::spawn_blocking(move || recognizer.recognize(&bounded))
            .await
            .unwrap_or_default();
        Ok(text)
    }
}

fn encode_png_base64(image: &RgbImage) -> Option<String> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(BASE64.encode(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::qr::ProbeOutcome;
    use crate::error::Error;
    use crate::recognize::testing::FixedRecognizer;
    use async_trait::async_trait;

    struct UnreachableProbe;

    #[async_trait]
    impl LinkProbe for UnreachableProbe {
        async fn probe(&self, _url: &str) -> ProbeOutcome {
            ProbeOutcome::ConnectFailed
        }
    }

    fn png_certificate() -> Vec<u8> {
        let img = RgbImage::from_pixel(300, 200, image::Rgb([250, 250, 250]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pipeline(transcript: &str) -> Pipeline {
        Pipeline::new(
            PipelineConfig::default(),
            Arc::new(FixedRecognizer(transcript.to_string())),
            Arc::new(UnreachableProbe),
            Arc::new(LogoGallery::empty()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn undecodable_upload_aborts_before_analysis() {
        let p = pipeline("");
        let err = p.analyze(b"garbage").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn decodable_upload_always_yields_a_verdict() {
        let p = pipeline("");
        let report = p.analyze(&png_certificate()).await.unwrap();
        assert!(!report.certificate_preview.is_empty());
        assert!(!report.qr.found);
        assert!(report.logo_detection.matches.is_empty());
        assert!(report.trust_evaluation.trust_score <= 100);
    }

    #[tokio::test]
    async fn pipeline_is_idempotent_on_identical_input() {
        let p = pipeline(
            "This is to certify that Jane Doe has successfully completed \
             Data Science Specialization course issued by Example University \
             on 12/05/2024 Certificate ID: AB-12345",
        );
        let bytes = png_certificate();
        let first = p.analyze(&bytes).await.unwrap();
        let second = p.analyze(&bytes).await.unwrap();
        assert_eq!(first.trust_evaluation, second.trust_evaluation);
        assert_eq!(first.ocr, second.ocr);
        assert_eq!(first.qr, second.qr);
    }

    #[tokio::test]
    async fn invalid_weights_are_rejected_at_construction() {
        let mut config = PipelineConfig::default();
        config.weights.qr = 0.9;
        let result = Pipeline::new(
            config,
            Arc::new(FixedRecognizer(String::new())),
            Arc::new(UnreachableProbe),
            Arc::new(LogoGallery::empty()),
        );
        assert!(result.is_err());
    }
}
