//! Rasterizer: turns uploaded document bytes into one analyzable raster.
//!
//! PDF documents are parsed with lopdf; certificates are almost always a
//! single scanned page, so the first page's largest decodable embedded image
//! is taken as the render, scaled to the configured resolution against the
//! page MediaBox. A vector-only page yields a blank canvas at page size so
//! the request still completes with low evidence. Directly uploaded raster
//! images (PNG/JPEG) are accepted as-is.

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, warn};

use crate::config::RasterConfig;
use crate::error::DecodeError;

const POINTS_PER_INCH: f32 = 72.0;
const DEFAULT_PAGE_PTS: (f32, f32) = (612.0, 792.0); // US Letter

#[derive(Debug, Clone)]
pub struct Rasterizer {
    config: RasterConfig,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    /// Produces exactly one raster for the first page. Pure function of the
    /// input bytes and the configured resolution.
    pub fn rasterize(&self, bytes: &[u8]) -> Result<RgbImage, DecodeError> {
        if bytes.starts_with(b"%PDF") {
            self.rasterize_pdf(bytes)
        } else {
            image::load_from_memory(bytes)
                .map(|img| img.to_rgb8())
                .map_err(|e| DecodeError::Unreadable(e.to_string()))
        }
    }

    fn rasterize_pdf(&self, bytes: &[u8]) -> Result<RgbImage, DecodeError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| DecodeError::Unreadable(e.to_string()))?;

        let pages = doc.get_pages();
        let first_page = *pages
            .values()
            .next()
            .ok_or(DecodeError::EmptyDocument)?;

        let (page_w, page_h) = self.page_size_points(&doc, first_page);
        let scale = self.config.dpi as f32 / POINTS_PER_INCH;
        let target_w = (page_w * scale).round().max(1.0) as u32;
        let target_h = (page_h * scale).round().max(1.0) as u32;

        match self.largest_page_image(&doc, first_page) {
            Some(img) => {
                debug!(width = img.width(), height = img.height(), "extracted page image");
                if img.width() == target_w {
                    Ok(img)
                } else {
                    let ratio = target_w as f32 / img.width() as f32;
                    let h = ((img.height() as f32) * ratio).round().max(1.0) as u32;
                    Ok(imageops::resize(&img, target_w, h, FilterType::Triangle))
                }
            }
            None => {
                warn!("first page carries no decodable image; rendering blank canvas");
                Ok(RgbImage::from_pixel(target_w, target_h, image::Rgb([255, 255, 255])))
            }
        }
    }

    fn page_size_points(&self, doc: &Document, page_id: lopdf::ObjectId) -> (f32, f32) {
        let media_box = doc
            .get_dictionary(page_id)
            .ok()
            .and_then(|dict| dict.get(b"MediaBox").ok())
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
            .and_then(|arr| {
                if arr.len() == 4 {
                    let v: Vec<f32> = arr.iter().filter_map(as_number).collect();
                    (v.len() == 4).then(|| ((v[2] - v[0]).abs(), (v[3] - v[1]).abs()))
                } else {
                    None
                }
            });
        media_box.unwrap_or(DEFAULT_PAGE_PTS)
    }

    /// Scans the first page's XObject resources for image streams and
    /// decodes the one with the largest pixel area.
    fn largest_page_image(&self, doc: &Document, page_id: lopdf::ObjectId) -> Option<RgbImage> {
        let page = doc.get_dictionary(page_id).ok()?;
        let resources = resolve(doc, page.get(b"Resources").ok()?)?.as_dict().ok()?;
        let xobjects = resolve(doc, resources.get(b"XObject").ok()?)?.as_dict().ok()?;

        let mut best: Option<RgbImage> = None;
        for (name, obj) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(doc, obj) else {
                continue;
            };
            if !is_image_stream(&stream.dict) {
                continue;
            }
            match decode_image_stream(stream) {
                Some(img) => {
                    let area = img.width() as u64 * img.height() as u64;
                    let best_area = best
                        .as_ref()
                        .map(|b| b.width() as u64 * b.height() as u64)
                        .unwrap_or(0);
                    if area > best_area {
                        best = Some(img);
                    }
                }
                None => {
                    debug!(name = %String::from_utf8_lossy(name), "skipping undecodable XObject");
                }
            }
        }
        best
    }
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn is_image_stream(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(name)) if name == b"Image")
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| match o {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decodes a single image XObject. DCT streams are handed to the JPEG
/// decoder; flate streams are interpreted as raw 8-bit RGB or grayscale.
fn decode_image_stream(stream: &Stream) -> Option<RgbImage> {
    let filters = filter_names(&stream.dict);

    if filters.iter().any(|f| f == b"DCTDecode") {
        return image::load_from_memory(&stream.content)
            .ok()
            .map(|img| img.to_rgb8());
    }

    let width = dict_u32(&stream.dict, b"Width")?;
    let height = dict_u32(&stream.dict, b"Height")?;
    let bpc = dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bpc != 8 {
        return None;
    }

    let data = if filters.iter().any(|f| f == b"FlateDecode") {
        stream.decompressed_content().ok()?
    } else if filters.is_empty() {
        stream.content.clone()
    } else {
        return None;
    };

    let pixels = (width as usize) * (height as usize);
    if data.len() >= pixels * 3 {
        RgbImage::from_raw(width, height, data[..pixels * 3].to_vec())
    } else if data.len() >= pixels {
        let gray = GrayImage::from_raw(width, height, data[..pixels].to_vec())?;
        let mut rgb = RgbImage::new(width, height);
        for (x, y, p) in gray.enumerate_pixels() {
            rgb.put_pixel(x, y, image::Rgb([p[0], p[0], p[0]]));
        }
        Some(rgb)
    } else {
        None
    }
}

fn dict_u32(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key) {
        Ok(Object::Integer(i)) if *i > 0 => Some(*i as u32),
        _ => None,
    }
}

/// Bounds an image to a maximum dimension, preserving aspect ratio.
/// Returns the input unchanged when already within bounds.
pub fn bound_to(img: &RgbImage, max_dimension: u32) -> RgbImage {
    let (w, h) = (img.width(), img.height());
    let largest = w.max(h);
    if largest <= max_dimension {
        return img.clone();
    }
    let ratio = max_dimension as f32 / largest as f32;
    let nw = ((w as f32) * ratio).round().max(1.0) as u32;
    let nh = ((h as f32) * ratio).round().max(1.0) as u32;
    imageops::resize(img, nw, nh, FilterType::Triangle)
}
