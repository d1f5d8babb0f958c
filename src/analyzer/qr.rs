//! QR Verifier: locates an embedded verification code and classifies it.
//!
//! Detection runs a three-step cascade, cheapest first, stopping at the
//! first strategy that decodes anything: the unmodified image, a contrast
//! enhanced and sharpened variant, then an adaptively binarized one. When
//! several codes decode, detector-reported order breaks the tie and only
//! the first is validated.
//!
//! Content validation: a reachable HTTP(S) URL is `valid`; a confirmed-dead
//! link is `invalid`; a timeout is `unverifiable`, since "could not
//! determine" must never score as harshly as "definitely broken". Absence
//! of a code is evidence-neutral.

use std::time::Duration;

use async_trait::async_trait;
use image::{GrayImage, RgbImage};
use imageproc::contrast::{adaptive_threshold, equalize_histogram};
use imageproc::filter::sharpen3x3;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{QrResult, QrValidation};

const ADAPTIVE_BLOCK_RADIUS: u32 = 5;

/// Outcome of a single bounded reachability attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Status { code: u16, location: Option<String> },
    Timeout,
    ConnectFailed,
}

/// Reachability capability boundary. A probe performs exactly one bounded
/// attempt per call; redirect following is the verifier's decision.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

#[async_trait]
impl<T: LinkProbe + ?Sized> LinkProbe for std::sync::Arc<T> {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        (**self).probe(url).await
    }
}

/// reqwest-backed probe with a bounded timeout and no automatic redirects.
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Server(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProbe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        match self.client.head(url).send().await {
            Ok(resp) => {
                let location = resp
                    .headers()
                    .get(reqwest::header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                ProbeOutcome::Status {
                    code: resp.status().as_u16(),
                    location,
                }
            }
            Err(e) if e.is_timeout() => ProbeOutcome::Timeout,
            Err(e) => {
                debug!(error = %e, "reachability probe failed");
                ProbeOutcome::ConnectFailed
            }
        }
    }
}

pub struct QrVerifier<P: LinkProbe> {
    probe: P,
}

impl<P: LinkProbe> QrVerifier<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    pub async fn verify(&self, image: &RgbImage) -> QrResult {
        let gray = image::imageops::grayscale(image);
        match detect_code(&gray) {
            Some(content) => {
                let validation = self.classify(&content).await;
                QrResult {
                    found: true,
                    content,
                    validation,
                }
            }
            None => QrResult::default(),
        }
    }

    /// Pure function of (content, reachability outcomes).
    pub async fn classify(&self, content: &str) -> QrValidation {
        let Some(url) = as_http_url(content) else {
            return if content.len() > 10 && content.chars().any(|c| c.is_alphanumeric()) {
                QrValidation::Unverifiable
            } else {
                QrValidation::Invalid
            };
        };

        match self.probe.probe(url.as_str()).await {
            ProbeOutcome::Status { code, location } if (300..400).contains(&code) => {
                // One redirect hop at most, never more.
                let Some(next) = location.and_then(|loc| url.join(&loc).ok()) else {
                    return QrValidation::Invalid;
                };
                match self.probe.probe(next.as_str()).await {
                    ProbeOutcome::Status { code, .. } if (200..300).contains(&code) => {
                        QrValidation::Valid
                    }
                    ProbeOutcome::Timeout => QrValidation::Unverifiable,
                    _ => QrValidation::Invalid,
                }
            }
            ProbeOutcome::Status { code, .. } if (200..300).contains(&code) => QrValidation::Valid,
            ProbeOutcome::Status { .. } => QrValidation::Invalid,
            ProbeOutcome::Timeout => QrValidation::Unverifiable,
            ProbeOutcome::ConnectFailed => QrValidation::Invalid,
        }
    }
}

fn as_http_url(content: &str) -> Option<reqwest::Url> {
    let url = reqwest::Url::parse(content).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Detection cascade over progressively more aggressive preprocessing.
pub fn detect_code(gray: &GrayImage) -> Option<String> {
    if let Some(content) = decode_first(gray.clone()) {
        debug!("QR decoded on unmodified image");
        return Some(content);
    }

    let enhanced = sharpen3x3(&equalize_histogram(gray));
    if let Some(content) = decode_first(enhanced) {
        debug!("QR decoded after contrast enhancement");
        return Some(content);
    }

    let binarized = adaptive_threshold(gray, ADAPTIVE_BLOCK_RADIUS);
    if let Some(content) = decode_first(binarized) {
        debug!("QR decoded after adaptive binarization");
        return Some(content);
    }

    None
}

fn decode_first(img: GrayImage) -> Option<String> {
    let mut prepared = rqrr::PreparedImage::prepare(img);
    for grid in prepared.detect_grids() {
        match grid.decode() {
            Ok((_meta, content)) if !content.is_empty() => return Some(content),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "QR grid failed to decode"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Scripted probe: maps exact URLs to outcomes; anything unknown is a
    /// connection failure.
    struct ScriptedProbe(HashMap<String, ProbeOutcome>);

    #[async_trait]
    impl LinkProbe for ScriptedProbe {
        async fn probe(&self, url: &str) -> ProbeOutcome {
            self.0
                .get(url)
                .cloned()
                .unwrap_or(ProbeOutcome::ConnectFailed)
        }
    }

    fn verifier(script: &[(&str, ProbeOutcome)]) -> QrVerifier<ScriptedProbe> {
        let map = script
            .iter()
            .map(|(u, o)| (u.to_string(), o.clone()))
            .collect();
        QrVerifier::new(ScriptedProbe(map))
    }

    #[tokio::test]
    async fn reachable_url_is_valid() {
        let v = verifier(&[(
            "https://verify.example.edu/c/1",
            ProbeOutcome::Status {
                code: 200,
                location: None,
            },
        )]);
        assert_eq!(
            v.classify("https://verify.example.edu/c/1").await,
            QrValidation::Valid
        );
    }

    #[tokio::test]
    async fn missing_page_is_invalid() {
        let v = verifier(&[(
            "https://verify.example.edu/c/404",
            ProbeOutcome::Status {
                code: 404,
                location: None,
            },
        )]);
        assert_eq!(
            v.classify("https://verify.example.edu/c/404").await,
            QrValidation::Invalid
        );
    }

    #[tokio::test]
    async fn timeout_is_unverifiable_not_invalid() {
        let v = verifier(&[("https://slow.example.edu/", ProbeOutcome::Timeout)]);
        assert_eq!(
            v.classify("https://slow.example.edu/").await,
            QrValidation::Unverifiable
        );
    }

    #[tokio::test]
    async fn connection_failure_is_invalid() {
        let v = verifier(&[]);
        assert_eq!(
            v.classify("https://gone.example.edu/").await,
            QrValidation::Invalid
        );
    }

    #[tokio::test]
    async fn redirect_is_followed_exactly_one_hop() {
        let v = verifier(&[
            (
                "https://a.example.edu/",
                ProbeOutcome::Status {
                    code: 302,
                    location: Some("https://b.example.edu/".into()),
                },
            ),
            (
                "https://b.example.edu/",
                ProbeOutcome::Status {
                    code: 200,
                    location: None,
                },
            ),
        ]);
        assert_eq!(v.classify("https://a.example.edu/").await, QrValidation::Valid);

        let v = verifier(&[
            (
                "https://a.example.edu/",
                ProbeOutcome::Status {
                    code: 302,
                    location: Some("https://b.example.edu/".into()),
                },
            ),
            (
                "https://b.example.edu/",
                ProbeOutcome::Status {
                    code: 302,
                    location: Some("https://c.example.edu/".into()),
                },
            ),
        ]);
        // second redirect is not followed
        assert_eq!(v.classify("https://a.example.edu/").await, QrValidation::Invalid);
    }

    #[tokio::test]
    async fn redirect_without_location_is_invalid() {
        let v = verifier(&[(
            "https://a.example.edu/",
            ProbeOutcome::Status {
                code: 301,
                location: None,
            },
        )]);
        assert_eq!(v.classify("https://a.example.edu/").await, QrValidation::Invalid);
    }

    #[tokio::test]
    async fn non_url_alphanumeric_content_is_unverifiable() {
        let v = verifier(&[]);
        assert_eq!(
            v.classify("CERT-2024-000123").await,
            QrValidation::Unverifiable
        );
    }

    #[tokio::test]
    async fn degenerate_content_is_invalid() {
        let v = verifier(&[]);
        assert_eq!(v.classify("").await, QrValidation::Invalid);
        assert_eq!(v.classify("!!!").await, QrValidation::Invalid);
    }

    #[tokio::test]
    async fn blank_image_reports_no_code_found() {
        let v = verifier(&[]);
        let image = RgbImage::from_pixel(120, 120, image::Rgb([255, 255, 255]));
        let result = v.verify(&image).await;
        assert!(!result.found);
        assert!(result.content.is_empty());
        assert_eq!(result.validation, QrValidation::Unverifiable);
    }

    #[tokio::test]
    async fn http_probe_reports_status_via_local_server() {
        let _m = mockito::mock("HEAD", "/cert").with_status(200).create();
        let probe = HttpProbe::new(Duration::from_secs(3)).unwrap();
        let url = format!("{}/cert", mockito::server_url());
        match probe.probe(&url).await {
            ProbeOutcome::Status { code, .. } => assert_eq!(code, 200),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
