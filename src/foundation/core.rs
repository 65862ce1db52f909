use std::{io::Cursor, sync::Arc, time::Duration};

use anyhow::Context;
use base64::Engine as _;

use crate::foundation::error::{ArcraftError, ArcraftResult};

/// Decoded raster in row-major straight (non-premultiplied) RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub rgba8: Arc<Vec<u8>>,
}

impl Raster {
    pub fn new(width: u32, height: u32, rgba8: Vec<u8>) -> ArcraftResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| ArcraftError::validation("raster size overflow"))?;
        if width == 0 || height == 0 {
            return Err(ArcraftError::validation("raster width/height must be > 0"));
        }
        if rgba8.len() != expected {
            return Err(ArcraftError::validation(
                "raster data must match width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            rgba8: Arc::new(rgba8),
        })
    }

    pub fn solid(width: u32, height: u32, px: [u8; 4]) -> ArcraftResult<Self> {
        Self::new(width, height, px.repeat((width as usize) * (height as usize)))
    }

    pub fn from_image(img: image::RgbaImage) -> ArcraftResult<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn to_image(&self) -> image::RgbaImage {
        // Length is checked in `new`.
        image::RgbaImage::from_raw(self.width, self.height, self.rgba8.as_ref().clone())
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }

    pub fn byte_len(&self) -> usize {
        self.rgba8.len()
    }

    /// Downscale (never upscale) so the raster fits inside `max_w` x `max_h`, keeping aspect.
    pub fn fit_within(&self, max_w: u32, max_h: u32) -> ArcraftResult<Self> {
        if self.width <= max_w && self.height <= max_h {
            return Ok(self.clone());
        }
        let scale = f64::min(
            f64::from(max_w) / f64::from(self.width),
            f64::from(max_h) / f64::from(self.height),
        );
        let w = ((f64::from(self.width) * scale).round() as u32).max(1);
        let h = ((f64::from(self.height) * scale).round() as u32).max(1);
        let resized =
            image::imageops::resize(&self.to_image(), w, h, image::imageops::FilterType::Triangle);
        Self::from_image(resized)
    }

    pub fn encode_png(&self) -> ArcraftResult<Vec<u8>> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(self.to_image())
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .context("encode raster as png")?;
        Ok(buf)
    }
}

/// Self-contained `data:` URI holding an encoded raster.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("data:{mime};base64,{b64}"))
    }

    pub fn png_from_raster(raster: &Raster) -> ArcraftResult<Self> {
        Ok(Self::from_bytes("image/png", &raster.encode_png()?))
    }

    pub fn from_data_uri(uri: impl Into<String>) -> ArcraftResult<Self> {
        let uri = uri.into();
        let img = Self(uri);
        img.split()?;
        Ok(img)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime(&self) -> ArcraftResult<&str> {
        Ok(self.split()?.0)
    }

    pub fn bytes(&self) -> ArcraftResult<Vec<u8>> {
        let (_, payload) = self.split()?;
        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ArcraftError::serde(format!("data uri payload is not base64: {e}")))
    }

    pub fn decode(&self) -> ArcraftResult<Raster> {
        let bytes = self.bytes()?;
        let img = image::load_from_memory(&bytes).context("decode data uri image")?;
        Raster::from_image(img.to_rgba8())
    }

    fn split(&self) -> ArcraftResult<(&str, &str)> {
        let rest = self
            .0
            .strip_prefix("data:")
            .ok_or_else(|| ArcraftError::serde("image payload must be a data: uri"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| ArcraftError::serde("data uri is missing ','"))?;
        let mime = header
            .strip_suffix(";base64")
            .ok_or_else(|| ArcraftError::serde("data uri must be base64 encoded"))?;
        Ok((mime, payload))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Transient user-facing message; auto-dismissed after `duration`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
    pub duration: Duration,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>, duration: Duration) -> Self {
        Self {
            message: message.into(),
            severity,
            duration,
        }
    }
}
