use crate::{
    foundation::core::Raster,
    foundation::error::{ArcraftError, ArcraftResult},
};

/// Largest accepted edge length; a 4096px RGBA raster is 64 MiB.
pub const MAX_QR_SIZE: u32 = 4096;
const MAX_QR_MARGIN: u32 = 64;

const DARK: [u8; 4] = [0, 0, 0, 255];
const LIGHT: [u8; 4] = [255, 255, 255, 255];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum QrEcLevel {
    L,
    #[default]
    M,
    Q,
    H,
}

impl std::str::FromStr for QrEcLevel {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(Self::L),
            "M" => Ok(Self::M),
            "Q" => Ok(Self::Q),
            "H" => Ok(Self::H),
            _ => Err(ArcraftError::validation(format!(
                "unknown error correction level '{s}' (expected L, M, Q or H)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct QrOptions {
    /// Output edge length in pixels.
    pub size: u32,
    /// Quiet zone in modules.
    pub margin: u32,
    pub ec_level: QrEcLevel,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: 256,
            margin: 2,
            ec_level: QrEcLevel::M,
        }
    }
}

impl QrOptions {
    pub fn validate(&self) -> ArcraftResult<()> {
        if self.size == 0 || self.size > MAX_QR_SIZE {
            return Err(ArcraftError::validation(format!(
                "qr.size must be in 1..={MAX_QR_SIZE}, got {}",
                self.size
            )));
        }
        if self.margin > MAX_QR_MARGIN {
            return Err(ArcraftError::validation(format!(
                "qr.margin must be <= {MAX_QR_MARGIN}, got {}",
                self.margin
            )));
        }
        Ok(())
    }
}

pub trait QrEncoder {
    fn encode(&self, data: &str, opts: &QrOptions) -> ArcraftResult<Raster>;
}

/// Square black-on-white QR raster built with the `qrcode` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct QrCodeEncoder;

impl QrEncoder for QrCodeEncoder {
    fn encode(&self, data: &str, opts: &QrOptions) -> ArcraftResult<Raster> {
        opts.validate()
            .map_err(|e| ArcraftError::qr_generation_failed(e.to_string()))?;
        let level = match opts.ec_level {
            QrEcLevel::L => qrcode::EcLevel::L,
            QrEcLevel::M => qrcode::EcLevel::M,
            QrEcLevel::Q => qrcode::EcLevel::Q,
            QrEcLevel::H => qrcode::EcLevel::H,
        };
        let code = qrcode::QrCode::with_error_correction_level(data.as_bytes(), level)
            .map_err(|e| ArcraftError::qr_generation_failed(format!("encode '{data}': {e}")))?;

        let width = code.width();
        let dark: Vec<bool> = code
            .to_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        let margin = opts.margin as usize;
        let modules = width + 2 * margin;
        let size = opts.size as usize;
        if size < modules {
            return Err(ArcraftError::qr_generation_failed(format!(
                "{size}px is too small for {modules} modules"
            )));
        }

        let len = size
            .checked_mul(size)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| ArcraftError::qr_generation_failed("qr raster size overflow"))?;
        let mut rgba8 = Vec::with_capacity(len);
        for y in 0..size {
            let my = y * modules / size;
            for x in 0..size {
                let mx = x * modules / size;
                let on = mx >= margin
                    && my >= margin
                    && mx < margin + width
                    && my < margin + width
                    && dark[(my - margin) * width + (mx - margin)];
                rgba8.extend_from_slice(if on { &DARK } else { &LIGHT });
            }
        }
        Raster::new(opts.size, opts.size, rgba8)
    }
}

/// Encode `url`. Any failure is reported as `QrGenerationFailed`.
#[tracing::instrument(skip(encoder, opts))]
pub fn request_qr(encoder: &dyn QrEncoder, url: &str, opts: &QrOptions) -> ArcraftResult<Raster> {
    encoder.encode(url, opts).map_err(|e| match e {
        ArcraftError::QrGenerationFailed(_) => e,
        other => ArcraftError::qr_generation_failed(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_raster_has_requested_size_and_quiet_zone() {
        let opts = QrOptions::default();
        let r = QrCodeEncoder
            .encode("https://ar.example/?ar=abc", &opts)
            .unwrap();
        assert_eq!((r.width, r.height), (256, 256));
        assert_eq!(&r.rgba8[0..4], &LIGHT);
        assert!(r.rgba8.chunks_exact(4).any(|px| px == DARK));
    }

    #[test]
    fn too_small_canvas_fails() {
        let opts = QrOptions {
            size: 10,
            ..QrOptions::default()
        };
        assert!(matches!(
            request_qr(&QrCodeEncoder, "https://ar.example/?ar=abc", &opts),
            Err(ArcraftError::QrGenerationFailed(_))
        ));
    }

    #[test]
    fn oversized_canvas_is_rejected_before_allocating() {
        let opts = QrOptions {
            size: u32::MAX,
            ..QrOptions::default()
        };
        assert!(opts.validate().is_err());
        assert!(matches!(
            QrCodeEncoder.encode("https://ar.example/?ar=abc", &opts),
            Err(ArcraftError::QrGenerationFailed(_))
        ));

        let opts = QrOptions {
            size: MAX_QR_SIZE,
            margin: 1000,
            ..QrOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn largest_allowed_size_validates() {
        let opts = QrOptions {
            size: MAX_QR_SIZE,
            ..QrOptions::default()
        };
        opts.validate().unwrap();
    }

    #[test]
    fn oversized_payload_fails() {
        let data = "x".repeat(8000);
        assert!(matches!(
            request_qr(&QrCodeEncoder, &data, &QrOptions::default()),
            Err(ArcraftError::QrGenerationFailed(_))
        ));
    }

    #[test]
    fn ec_level_parses_case_insensitively() {
        assert_eq!("q".parse::<QrEcLevel>().unwrap(), QrEcLevel::Q);
        assert!("Z".parse::<QrEcLevel>().is_err());
    }
}
