//! Multi-signal authenticity analysis for scanned PDF certificates.
//!
//! Provides a pipeline of independent, weak evidence analyzers (recognized
//! text fields, document metadata, embedded QR verification codes, issuer
//! logo similarity, and pixel-level tamper indicators) and a fusion engine
//! that combines them deterministically into a 0-100 trust score, a
//! categorical verdict, and human-readable reasons.

// Configuration and core pipeline
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Stage 0: document decoding
pub mod raster;

// Capability boundaries
pub mod recognize;

// Stage 1: independent evidence analyzers
pub mod analyzer;

// Stage 2: fusion
pub mod score;

// Integrity digests
pub mod hash_utils;

// HTTP surface
pub mod api;

// Re-exports for crate consumers
pub use analyzer::fields::FieldExtractor;
pub use analyzer::logo::{LogoGallery, LogoMatcher};
pub use analyzer::metadata::MetadataAnalyzer;
pub use analyzer::qr::{HttpProbe, LinkProbe, ProbeOutcome, QrVerifier};
pub use analyzer::tamper::TamperDetector;
pub use config::PipelineConfig;
pub use error::{DecodeError, Error, Result};
pub use pipeline::Pipeline;
pub use raster::Rasterizer;
pub use recognize::{DisabledRecognizer, TextRecognizer};
pub use score::TrustScorer;
pub use types::{
    CertificateAnalysis, FieldSet, LogoMatch, LogoMatchSet, MetadataReport, QrResult,
    QrValidation, TamperReport, TrustEvaluation, Verdict,
};
