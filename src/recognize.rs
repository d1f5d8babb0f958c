//! Text-recognition capability boundary.
//!
//! The recognition engine is an external collaborator: the pipeline only
//! requires something that maps a pixel buffer to a text string and never
//! panics. The engine instance is constructed once by the composition root
//! and injected, so its one-time initialization cost is amortized without
//! hidden global state.

use image::RgbImage;

/// Maps a raster to recognized text. Implementations must be total:
/// recognition failure is reported as an empty string, never a panic.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage) -> String;

    /// Short identifier for logs.
    fn name(&self) -> &'static str {
        "unnamed"
    }
}

/// Null engine for deployments without an OCR backend ("simple mode"):
/// structured fields stay empty and only raw text evidence is absent.
/// The scorer treats this identically to an extraction that found nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRecognizer;

impl TextRecognizer for DisabledRecognizer {
    fn recognize(&self, _image: &RgbImage) -> String {
        String::new()
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Returns a canned transcript regardless of input; used to exercise
    /// the pipeline without a real recognition engine.
    pub struct FixedRecognizer(pub String);

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _image: &RgbImage) -> String {
            self.0.clone()
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }
}
