use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{
    acquire::{DEFAULT_MAX_IMAGE_BYTES, DEFAULT_SUPPORTED_FORMATS, ImagePolicy},
    foundation::error::{ArcraftError, ArcraftResult},
    model::PlacementDefaults,
    share::QrOptions,
    store::{DEFAULT_INDEX_CAP, OrphanPolicy},
    workflow::EditMode,
};

pub const DEFAULT_SHARE_BASE_URL: &str = "http://localhost:8080/";

/// Wizard settings, read from JSON. Every field is optional in the file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WizardConfig {
    pub max_image_bytes: u64,
    pub supported_formats: Vec<String>,
    pub editor_max_width: u32,
    pub editor_max_height: u32,
    pub index_cap: usize,
    pub orphan_policy: OrphanPolicy,
    pub edit_mode: EditMode,
    /// Page the share link points at; query and fragment are dropped.
    pub share_base_url: String,
    pub qr: QrOptions,
    pub placement_defaults: PlacementDefaults,
    pub notice_duration_ms: u64,
    pub fetch_timeout_secs: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            supported_formats: DEFAULT_SUPPORTED_FORMATS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            editor_max_width: 800,
            editor_max_height: 600,
            index_cap: DEFAULT_INDEX_CAP,
            orphan_policy: OrphanPolicy::default(),
            edit_mode: EditMode::default(),
            share_base_url: DEFAULT_SHARE_BASE_URL.to_string(),
            qr: QrOptions::default(),
            placement_defaults: PlacementDefaults::default(),
            notice_duration_ms: 5000,
            fetch_timeout_secs: 15,
        }
    }
}

impl WizardConfig {
    pub fn from_reader<R: std::io::Read>(r: R) -> ArcraftResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| ArcraftError::validation(format!("parse wizard config JSON: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> ArcraftResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            ArcraftError::validation(format!("open wizard config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> ArcraftResult<()> {
        if self.max_image_bytes == 0 {
            return Err(ArcraftError::validation("max_image_bytes must be > 0"));
        }
        if self.supported_formats.is_empty() {
            return Err(ArcraftError::validation(
                "supported_formats must list at least one MIME type",
            ));
        }
        if let Some(bad) = self
            .supported_formats
            .iter()
            .find(|f| !f.trim().to_ascii_lowercase().starts_with("image/"))
        {
            return Err(ArcraftError::validation(format!(
                "supported format '{bad}' is not an image MIME type"
            )));
        }
        if self.editor_max_width == 0 || self.editor_max_height == 0 {
            return Err(ArcraftError::validation("editor size must be > 0"));
        }
        if self.index_cap == 0 {
            return Err(ArcraftError::validation("index_cap must be > 0"));
        }
        self.qr.validate()?;
        let d = &self.placement_defaults;
        if !d.scale.is_finite() || d.scale <= 0.0 {
            return Err(ArcraftError::validation(
                "placement_defaults.scale must be finite and > 0",
            ));
        }
        if !d.height.is_finite() || !d.rotation.is_finite() {
            return Err(ArcraftError::validation(
                "placement_defaults height/rotation must be finite",
            ));
        }
        self.share_base()?;
        Ok(())
    }

    pub fn share_base(&self) -> ArcraftResult<url::Url> {
        let url = url::Url::parse(&self.share_base_url).map_err(|e| {
            ArcraftError::validation(format!("share_base_url '{}': {e}", self.share_base_url))
        })?;
        if url.cannot_be_a_base() {
            return Err(ArcraftError::validation(format!(
                "share_base_url '{}' must be a hierarchical URL",
                self.share_base_url
            )));
        }
        Ok(url)
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_bytes: self.max_image_bytes,
            supported_formats: self
                .supported_formats
                .iter()
                .map(|f| f.trim().to_ascii_lowercase())
                .collect(),
            max_width: self.editor_max_width,
            max_height: self.editor_max_height,
        }
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
