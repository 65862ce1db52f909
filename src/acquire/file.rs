use std::path::Path;

use anyhow::Context;

use crate::{
    acquire::{Acquired, ImagePolicy, decode_image, sniff_mime},
    foundation::error::{ArcraftError, ArcraftResult},
    model::ImageOrigin,
};

/// A picked or dropped file. `mime` is what the platform reported, if anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInput {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileInput {
    pub fn new(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.map(str::to_string),
            bytes,
        }
    }

    /// Read a file from disk, refusing to load it when it exceeds `policy.max_bytes`.
    pub fn from_path(path: &Path, policy: &ImagePolicy) -> ArcraftResult<Self> {
        let meta = std::fs::metadata(path)
            .with_context(|| format!("stat image '{}'", path.display()))?;
        policy.check_size(meta.len())?;
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            mime: None,
            bytes,
        })
    }

    pub fn resolved_mime(&self) -> Option<String> {
        self.mime
            .as_deref()
            .map(|m| m.trim().to_ascii_lowercase())
            .filter(|m| !m.is_empty())
            .or_else(|| sniff_mime(&self.name).map(str::to_string))
    }

    fn is_supported(&self, policy: &ImagePolicy) -> bool {
        self.resolved_mime()
            .is_some_and(|m| policy.allows_mime(&m))
    }
}

fn validate_and_decode(
    policy: &ImagePolicy,
    input: FileInput,
    origin: ImageOrigin,
) -> ArcraftResult<Acquired> {
    let Some(mime) = input.resolved_mime() else {
        return Err(ArcraftError::unsupported_format(format!(
            "cannot determine the type of '{}'",
            input.name
        )));
    };
    if !policy.allows_mime(&mime) {
        return Err(ArcraftError::unsupported_format(format!(
            "'{}' is {mime}; supported: {}",
            input.name,
            policy.supported_formats.join(", ")
        )));
    }
    let byte_size = input.bytes.len() as u64;
    policy.check_size(byte_size)?;

    let raster = decode_image(&input.bytes, policy).map_err(|e| {
        ArcraftError::unsupported_format(format!("'{}' could not be decoded: {e}", input.name))
    })?;
    tracing::debug!(
        name = %input.name,
        %mime,
        byte_size,
        width = raster.width,
        height = raster.height,
        "decoded file image"
    );

    Ok(Acquired {
        raster,
        byte_size,
        origin,
    })
}

pub fn acquire_file(policy: &ImagePolicy, input: FileInput) -> ArcraftResult<Acquired> {
    let origin = ImageOrigin::File {
        name: input.name.clone(),
    };
    validate_and_decode(policy, input, origin)
}

/// Result of a drop: the first image was processed, `ignored` more were discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct DropOutcome {
    pub acquired: Acquired,
    pub ignored: usize,
}

/// Process exactly one dropped image. Non-image files are filtered out first.
pub fn acquire_dropped(policy: &ImagePolicy, files: Vec<FileInput>) -> ArcraftResult<DropOutcome> {
    let mut images = files.into_iter().filter(|f| f.is_supported(policy));
    let Some(first) = images.next() else {
        return Err(ArcraftError::unsupported_format(
            "no supported image among the dropped files",
        ));
    };
    let ignored = images.count();
    if ignored > 0 {
        tracing::warn!(ignored, "multiple images dropped; processing only the first");
    }

    let origin = ImageOrigin::DragDrop {
        name: first.name.clone(),
    };
    let acquired = validate_and_decode(policy, first, origin)?;
    Ok(DropOutcome { acquired, ignored })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([30, 60, 90, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn file_png_decodes() {
        let input = FileInput::new("a.png", Some("image/png"), png_bytes(3, 2));
        let acq = acquire_file(&ImagePolicy::default(), input).unwrap();
        assert_eq!((acq.raster.width, acq.raster.height), (3, 2));
        assert_eq!(
            acq.origin,
            ImageOrigin::File {
                name: "a.png".to_string()
            }
        );
    }

    #[test]
    fn reported_mime_wins_over_extension() {
        let input = FileInput::new("a.png", Some("text/plain"), png_bytes(1, 1));
        assert!(matches!(
            acquire_file(&ImagePolicy::default(), input),
            Err(ArcraftError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let policy = ImagePolicy {
            max_bytes: 10,
            ..ImagePolicy::default()
        };
        let input = FileInput::new("a.png", None, png_bytes(4, 4));
        assert!(matches!(
            acquire_file(&policy, input),
            Err(ArcraftError::FileTooLarge { max: 10, .. })
        ));
    }

    #[test]
    fn undecodable_bytes_are_unsupported() {
        let input = FileInput::new("a.jpg", None, b"nope".to_vec());
        assert!(matches!(
            acquire_file(&ImagePolicy::default(), input),
            Err(ArcraftError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn drop_processes_first_image_only() {
        let files = vec![
            FileInput::new("readme.txt", None, b"hello".to_vec()),
            FileInput::new("one.png", None, png_bytes(2, 2)),
            FileInput::new("two.png", None, png_bytes(5, 5)),
            FileInput::new("three.png", None, png_bytes(6, 6)),
        ];
        let out = acquire_dropped(&ImagePolicy::default(), files).unwrap();
        assert_eq!(out.ignored, 2);
        assert_eq!(out.acquired.raster.width, 2);
    }

    #[test]
    fn drop_without_images_fails() {
        let files = vec![FileInput::new("a.txt", None, b"x".to_vec())];
        assert!(acquire_dropped(&ImagePolicy::default(), files).is_err());
        assert!(acquire_dropped(&ImagePolicy::default(), vec![]).is_err());
    }
}
