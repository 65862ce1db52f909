//! Image acquisition: every input path converges on [`Acquired`].
//!
//! An [`Acquired`] value only exists after a full decode, so a draft can never hold an image
//! that is marked ready but failed to load.

pub mod camera;
pub mod file;
pub mod remote;

use anyhow::Context;

use crate::{
    foundation::core::Raster,
    foundation::error::{ArcraftError, ArcraftResult},
    model::ImageOrigin,
};

pub use camera::{CameraCapture, CameraDevice, Facing, MediaStream};
pub use file::{DropOutcome, FileInput, acquire_dropped, acquire_file};
pub use remote::{FetchedImage, ImageFetcher, acquire_url};

#[cfg(feature = "http-fetch")]
pub use remote::HttpFetcher;

pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

pub const DEFAULT_SUPPORTED_FORMATS: [&str; 4] =
    ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Fully decoded input image plus its approximate encoded size.
#[derive(Clone, Debug, PartialEq)]
pub struct Acquired {
    pub raster: Raster,
    pub byte_size: u64,
    pub origin: ImageOrigin,
}

/// Limits applied to every acquisition path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePolicy {
    pub max_bytes: u64,
    pub supported_formats: Vec<String>,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            supported_formats: DEFAULT_SUPPORTED_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_width: 800,
            max_height: 600,
        }
    }
}

impl ImagePolicy {
    pub fn allows_mime(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.supported_formats.iter().any(|f| *f == mime)
    }

    pub fn check_size(&self, size: u64) -> ArcraftResult<()> {
        if size > self.max_bytes {
            return Err(ArcraftError::FileTooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(())
    }
}

/// Guess a MIME type from a file name extension.
pub fn sniff_mime(name: &str) -> Option<&'static str> {
    let ext = std::path::Path::new(name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// Decode encoded bytes and fit the result into the editor working size.
pub fn decode_image(bytes: &[u8], policy: &ImagePolicy) -> ArcraftResult<Raster> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let raster = Raster::from_image(dyn_img.to_rgba8())?;
    raster.fit_within(policy.max_width, policy.max_height)
}

/// Built-in placeholder picture: a light grey card with a dark centre square.
pub fn demo_image() -> ArcraftResult<Acquired> {
    const W: u32 = 400;
    const H: u32 = 300;
    const SQUARE: u32 = 120;
    let (x0, y0) = ((W - SQUARE) / 2, (H - SQUARE) / 2);
    let img = image::RgbaImage::from_fn(W, H, |x, y| {
        let inside = (x0..x0 + SQUARE).contains(&x) && (y0..y0 + SQUARE).contains(&y);
        if inside {
            image::Rgba([0x55, 0x55, 0x55, 0xff])
        } else {
            image::Rgba([0xdd, 0xdd, 0xdd, 0xff])
        }
    });
    let raster = Raster::from_image(img)?;
    Ok(Acquired {
        byte_size: raster.byte_len() as u64,
        raster,
        origin: ImageOrigin::Demo,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_image_is_ready_to_edit() {
        let demo = demo_image().unwrap();
        assert_eq!((demo.raster.width, demo.raster.height), (400, 300));
        assert_eq!(demo.origin, ImageOrigin::Demo);
    }

    #[test]
    fn sniff_known_extensions() {
        assert_eq!(sniff_mime("photo.JPG"), Some("image/jpeg"));
        assert_eq!(sniff_mime("a/b/c.webp"), Some("image/webp"));
        assert_eq!(sniff_mime("notes.txt"), None);
        assert_eq!(sniff_mime("noext"), None);
    }

    #[test]
    fn policy_allow_list_and_size() {
        let p = ImagePolicy::default();
        assert!(p.allows_mime("IMAGE/PNG"));
        assert!(!p.allows_mime("image/bmp"));
        assert!(p.check_size(DEFAULT_MAX_IMAGE_BYTES).is_ok());
        assert!(matches!(
            p.check_size(DEFAULT_MAX_IMAGE_BYTES + 1),
            Err(ArcraftError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn decode_garbage_fails() {
        assert!(decode_image(b"definitely not an image", &ImagePolicy::default()).is_err());
    }
}
