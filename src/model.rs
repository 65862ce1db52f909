use std::{fmt, str::FromStr};

use chrono::{DateTime, TimeZone, Utc};

use crate::{
    edit::filters::{EffectSet, FilterParams},
    foundation::core::{EncodedImage, Raster},
    foundation::error::{ArcraftError, ArcraftResult},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Marker {
    #[default]
    Hiro,
    Kanji,
    Pattern,
    Barcode,
}

impl Marker {
    pub const ALL: [Marker; 4] = [Self::Hiro, Self::Kanji, Self::Pattern, Self::Barcode];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hiro" => Some(Self::Hiro),
            "kanji" => Some(Self::Kanji),
            "pattern" => Some(Self::Pattern),
            "barcode" => Some(Self::Barcode),
            _ => None,
        }
    }

    /// Unknown or missing values resolve to [`Marker::Hiro`].
    pub fn parse_lenient(s: Option<&str>) -> Self {
        s.and_then(Self::parse).unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hiro => "hiro",
            Self::Kanji => "kanji",
            Self::Pattern => "pattern",
            Self::Barcode => "barcode",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Hiro => "Hiro (default)",
            Self::Kanji => "Kanji",
            Self::Pattern => "Pattern",
            Self::Barcode => "Barcode",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Marker {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            ArcraftError::validation(format!(
                "unknown marker '{s}' (expected hiro, kanji, pattern or barcode)"
            ))
        })
    }
}

impl<'de> serde::Deserialize<'de> for Marker {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::parse_lenient(v.as_str()))
    }
}

/// Opaque experience token, safe to embed in a URL query or path segment.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ExperienceId(String);

impl ExperienceId {
    pub fn parse(s: &str) -> ArcraftResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ArcraftError::validation("experience id must be non-empty"));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ArcraftError::validation(format!(
                "experience id '{s}' contains characters outside [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(s.to_string()))
    }

    /// Caller guarantees `s` only holds `[0-9a-z]`.
    pub(crate) fn from_base36(s: String) -> Self {
        debug_assert!(!s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for ExperienceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct Placement {
    pub marker: Marker,
    pub scale: f32,
    pub height: f32,
    /// Degrees in `[0, 360)`.
    pub rotation: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    pub glow: bool,
    pub shadow: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            marker: Marker::Hiro,
            scale: 1.0,
            height: 0.0,
            rotation: 0.0,
            animation: None,
            glow: false,
            shadow: false,
        }
    }
}

pub fn normalize_rotation(deg: f32) -> f32 {
    let r = deg.rem_euclid(360.0);
    if r >= 360.0 { 0.0 } else { r }
}

/// Values the Configure step starts from.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlacementDefaults {
    pub scale: f32,
    pub height: f32,
    pub rotation: f32,
    pub glow: bool,
    pub shadow: bool,
    /// `None` means the user must pick a marker before sharing.
    pub marker: Option<Marker>,
}

impl Default for PlacementDefaults {
    fn default() -> Self {
        let p = Placement::default();
        Self {
            scale: p.scale,
            height: p.height,
            rotation: p.rotation,
            glow: p.glow,
            shadow: p.shadow,
            marker: None,
        }
    }
}

/// Placement values as entered; only [`PlacementDraft::complete`] validates them.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementDraft {
    pub marker: Option<Marker>,
    pub scale: f32,
    pub height: f32,
    pub rotation: f32,
    pub animation: Option<String>,
    pub glow: bool,
    pub shadow: bool,
}

impl PlacementDraft {
    pub fn seeded(defaults: &PlacementDefaults) -> Self {
        Self {
            marker: defaults.marker,
            scale: defaults.scale,
            height: defaults.height,
            rotation: defaults.rotation,
            animation: None,
            glow: defaults.glow,
            shadow: defaults.shadow,
        }
    }

    pub fn complete(&self) -> ArcraftResult<Placement> {
        let Some(marker) = self.marker else {
            return Err(ArcraftError::missing_prerequisite("no marker selected"));
        };
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ArcraftError::missing_prerequisite(
                "scale must be finite and > 0",
            ));
        }
        if !self.height.is_finite() {
            return Err(ArcraftError::missing_prerequisite("height must be finite"));
        }
        if !self.rotation.is_finite() {
            return Err(ArcraftError::missing_prerequisite("rotation must be finite"));
        }
        Ok(Placement {
            marker,
            scale: self.scale,
            height: self.height,
            rotation: normalize_rotation(self.rotation),
            animation: self
                .animation
                .as_ref()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            glow: self.glow,
            shadow: self.shadow,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.complete().is_ok()
    }
}

impl Default for PlacementDraft {
    fn default() -> Self {
        Self::seeded(&PlacementDefaults::default())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageOrigin {
    File { name: String },
    DragDrop { name: String },
    Camera,
    Url(String),
    Demo,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DraftImage {
    /// Decoded source; filters are always recomputed from here.
    pub source: Raster,
    pub byte_size: u64,
    pub origin: ImageOrigin,
    /// Frozen render produced by the last save.
    pub rendered: Option<EncodedImage>,
}

/// In-progress, mutable state of one workflow pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Draft {
    pub image: Option<DraftImage>,
    pub filters: FilterParams,
    pub effects: EffectSet,
    pub placement: PlacementDraft,
    pub title: String,
    pub description: String,
}

impl Draft {
    pub fn new(defaults: &PlacementDefaults) -> Self {
        Self {
            placement: PlacementDraft::seeded(defaults),
            ..Self::default()
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

pub fn default_title(at: DateTime<Utc>) -> String {
    format!("AR Experience {}", at.format("%Y-%m-%d"))
}

/// Finalized, immutable AR configuration bound to one image.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Experience {
    id: ExperienceId,
    image: EncodedImage,
    placement: Placement,
    metadata: Metadata,
}

impl Experience {
    pub(crate) fn new(
        id: ExperienceId,
        image: EncodedImage,
        placement: Placement,
        metadata: Metadata,
    ) -> Self {
        Self {
            id,
            image,
            placement,
            metadata,
        }
    }

    pub fn id(&self) -> &ExperienceId {
        &self.id
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn summary(&self) -> ExperienceSummary {
        ExperienceSummary {
            id: self.id.clone(),
            title: self.metadata.title.clone(),
            created_at: self.metadata.created_at,
        }
    }
}

/// Index entry; `timestamp` is unix milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExperienceSummary {
    pub id: ExperienceId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlacement {
    #[serde(default)]
    marker: Marker,
    scale: Option<f32>,
    height: Option<f32>,
    rotation: Option<f32>,
    animation: Option<String>,
    glow: Option<bool>,
    shadow: Option<bool>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    title: Option<String>,
    description: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

/// Accepts both the nested layout and the flat one older records were written in.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord {
    id: ExperienceId,
    image: String,
    placement: Option<RawPlacement>,
    metadata: Option<RawMetadata>,
    #[serde(flatten)]
    flat_placement: RawPlacement,
    #[serde(flatten)]
    flat_metadata: RawMetadata,
    timestamp: Option<i64>,
}

impl TryFrom<RawRecord> for Experience {
    type Error = ArcraftError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let image = EncodedImage::from_data_uri(raw.image)?;

        let p = raw.placement.unwrap_or(raw.flat_placement);
        let defaults = Placement::default();
        let scale = p
            .scale
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(defaults.scale);
        let height = p.height.filter(|h| h.is_finite()).unwrap_or(defaults.height);
        let rotation = p
            .rotation
            .filter(|r| r.is_finite())
            .map(normalize_rotation)
            .unwrap_or(defaults.rotation);
        let placement = Placement {
            marker: p.marker,
            scale,
            height,
            rotation,
            animation: p.animation.filter(|a| !a.trim().is_empty()),
            glow: p.glow.unwrap_or(defaults.glow),
            shadow: p.shadow.unwrap_or(defaults.shadow),
        };

        let m = raw.metadata.unwrap_or(raw.flat_metadata);
        let created_at = m
            .created_at
            .or_else(|| raw.timestamp.and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let metadata = Metadata {
            title: m
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| default_title(created_at)),
            description: m.description.unwrap_or_default(),
            created_at,
        };

        Ok(Self::new(raw.id, image, placement, metadata))
    }
}

/// Read a stored record, applying default normalization.
pub fn decode_record(json: &str) -> ArcraftResult<Experience> {
    serde_json::from_str(json).map_err(|e| ArcraftError::serde(format!("experience record: {e}")))
}
