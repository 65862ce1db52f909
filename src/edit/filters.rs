use std::{fmt, str::FromStr};

use crate::foundation::error::ArcraftError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterKind {
    Brightness,
    Contrast,
    Saturation,
    Blur,
    Hue,
    Sepia,
    Grayscale,
    Invert,
}

impl FilterKind {
    pub const ALL: [FilterKind; 8] = [
        Self::Brightness,
        Self::Contrast,
        Self::Saturation,
        Self::Blur,
        Self::Hue,
        Self::Sepia,
        Self::Grayscale,
        Self::Invert,
    ];

    /// Inclusive slider range.
    pub fn range(self) -> (f32, f32) {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturation => (0.0, 200.0),
            Self::Blur => (0.0, 10.0),
            Self::Hue => (-180.0, 180.0),
            Self::Sepia | Self::Grayscale | Self::Invert => (0.0, 100.0),
        }
    }

    pub fn identity(self) -> f32 {
        match self {
            Self::Brightness | Self::Contrast | Self::Saturation => 100.0,
            _ => 0.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Saturation => "saturation",
            Self::Blur => "blur",
            Self::Hue => "hue",
            Self::Sepia => "sepia",
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
        }
    }
}

impl FromStr for FilterKind {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = s.trim().to_ascii_lowercase();
        match kind.as_str() {
            "brightness" => Ok(Self::Brightness),
            "contrast" => Ok(Self::Contrast),
            "saturation" | "saturate" => Ok(Self::Saturation),
            "blur" => Ok(Self::Blur),
            "hue" | "hue-rotate" | "hue_rotate" => Ok(Self::Hue),
            "sepia" => Ok(Self::Sepia),
            "grayscale" | "greyscale" => Ok(Self::Grayscale),
            "invert" => Ok(Self::Invert),
            _ => Err(ArcraftError::validation(format!(
                "unknown filter kind '{kind}'"
            ))),
        }
    }
}

/// Numeric filter sliders. Percent filters use 100 as identity, additive ones 0.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    /// Pixels.
    pub blur: f32,
    /// Degrees.
    pub hue: f32,
    pub sepia: f32,
    pub grayscale: f32,
    pub invert: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
            hue: 0.0,
            sepia: 0.0,
            grayscale: 0.0,
            invert: 0.0,
        }
    }
}

impl FilterParams {
    /// One-shot enhancement used when manual editing is bypassed.
    pub fn auto_enhance() -> Self {
        Self {
            brightness: 105.0,
            contrast: 110.0,
            saturation: 115.0,
            ..Self::default()
        }
    }

    pub fn get(&self, kind: FilterKind) -> f32 {
        match kind {
            FilterKind::Brightness => self.brightness,
            FilterKind::Contrast => self.contrast,
            FilterKind::Saturation => self.saturation,
            FilterKind::Blur => self.blur,
            FilterKind::Hue => self.hue,
            FilterKind::Sepia => self.sepia,
            FilterKind::Grayscale => self.grayscale,
            FilterKind::Invert => self.invert,
        }
    }

    /// Clamp `value` into the slider range and store it. Non-finite input resets to identity.
    pub fn set(&mut self, kind: FilterKind, value: f32) -> f32 {
        let (lo, hi) = kind.range();
        let v = if value.is_finite() {
            value.clamp(lo, hi)
        } else {
            kind.identity()
        };
        let slot = match kind {
            FilterKind::Brightness => &mut self.brightness,
            FilterKind::Contrast => &mut self.contrast,
            FilterKind::Saturation => &mut self.saturation,
            FilterKind::Blur => &mut self.blur,
            FilterKind::Hue => &mut self.hue,
            FilterKind::Sepia => &mut self.sepia,
            FilterKind::Grayscale => &mut self.grayscale,
            FilterKind::Invert => &mut self.invert,
        };
        *slot = v;
        v
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectPreset {
    Vintage,
    Dramatic,
    Cool,
    Warm,
}

impl EffectPreset {
    pub const ALL: [EffectPreset; 4] = [Self::Vintage, Self::Dramatic, Self::Cool, Self::Warm];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vintage => "vintage",
            Self::Dramatic => "dramatic",
            Self::Cool => "cool",
            Self::Warm => "warm",
        }
    }

    /// Fixed filter bundle layered after the numeric sliders.
    pub fn ops(self) -> &'static [FilterOp] {
        match self {
            Self::Vintage => &[
                FilterOp::Sepia(0.5),
                FilterOp::Contrast(1.2),
                FilterOp::Brightness(0.9),
            ],
            Self::Dramatic => &[
                FilterOp::Contrast(1.5),
                FilterOp::Saturate(1.2),
                FilterOp::Brightness(0.9),
            ],
            Self::Cool => &[FilterOp::HueRotate(180.0), FilterOp::Saturate(1.1)],
            Self::Warm => &[
                FilterOp::HueRotate(-30.0),
                FilterOp::Saturate(1.2),
                FilterOp::Brightness(1.1),
            ],
        }
    }
}

impl fmt::Display for EffectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectPreset {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == name)
            .ok_or_else(|| ArcraftError::validation(format!("unknown effect preset '{name}'")))
    }
}

/// Active presets. Several may be on at once; they compose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EffectSet {
    pub vintage: bool,
    pub dramatic: bool,
    pub cool: bool,
    pub warm: bool,
}

impl EffectSet {
    fn slot(&mut self, preset: EffectPreset) -> &mut bool {
        match preset {
            EffectPreset::Vintage => &mut self.vintage,
            EffectPreset::Dramatic => &mut self.dramatic,
            EffectPreset::Cool => &mut self.cool,
            EffectPreset::Warm => &mut self.warm,
        }
    }

    pub fn is_active(&self, preset: EffectPreset) -> bool {
        match preset {
            EffectPreset::Vintage => self.vintage,
            EffectPreset::Dramatic => self.dramatic,
            EffectPreset::Cool => self.cool,
            EffectPreset::Warm => self.warm,
        }
    }

    /// Flip a preset and return its new state.
    pub fn toggle(&mut self, preset: EffectPreset) -> bool {
        let slot = self.slot(preset);
        *slot = !*slot;
        *slot
    }

    pub fn set(&mut self, preset: EffectPreset, on: bool) {
        *self.slot(preset) = on;
    }

    pub fn active(&self) -> impl Iterator<Item = EffectPreset> + '_ {
        EffectPreset::ALL
            .into_iter()
            .filter(move |p| self.is_active(*p))
    }

    pub fn is_empty(&self) -> bool {
        self.active().next().is_none()
    }
}

/// One normalized filter step. Factors are unit-less (1.0 = identity), amounts are 0..=1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    Blur { sigma_px: f32 },
    HueRotate(f32),
    Sepia(f32),
    Grayscale(f32),
    Invert(f32),
}

impl FilterOp {
    pub fn is_identity(&self) -> bool {
        match *self {
            Self::Brightness(v) | Self::Contrast(v) | Self::Saturate(v) => v == 1.0,
            Self::Blur { sigma_px } => sigma_px <= 0.0,
            Self::HueRotate(deg) => deg.rem_euclid(360.0) == 0.0,
            Self::Sepia(a) | Self::Grayscale(a) | Self::Invert(a) => a <= 0.0,
        }
    }

    fn css(&self) -> String {
        match *self {
            Self::Brightness(v) => format!("brightness({}%)", v * 100.0),
            Self::Contrast(v) => format!("contrast({}%)", v * 100.0),
            Self::Saturate(v) => format!("saturate({}%)", v * 100.0),
            Self::Blur { sigma_px } => format!("blur({sigma_px}px)"),
            Self::HueRotate(deg) => format!("hue-rotate({deg}deg)"),
            Self::Sepia(a) => format!("sepia({}%)", a * 100.0),
            Self::Grayscale(a) => format!("grayscale({}%)", a * 100.0),
            Self::Invert(a) => format!("invert({}%)", a * 100.0),
        }
    }
}

/// Ordered filter steps; always rebuilt from parameters, never chained incrementally.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    pub ops: Vec<FilterOp>,
}

impl FilterChain {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// CSS `filter` property value, for renderers that composite in a browser canvas.
    pub fn to_css(&self) -> String {
        if self.ops.is_empty() {
            return "none".to_string();
        }
        self.ops
            .iter()
            .map(FilterOp::css)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn build_chain(params: &FilterParams, effects: &EffectSet) -> FilterChain {
    let numeric = [
        FilterOp::Brightness(params.brightness / 100.0),
        FilterOp::Contrast(params.contrast / 100.0),
        FilterOp::Saturate(params.saturation / 100.0),
        FilterOp::Blur {
            sigma_px: params.blur,
        },
        FilterOp::HueRotate(params.hue),
        FilterOp::Sepia(params.sepia / 100.0),
        FilterOp::Grayscale(params.grayscale / 100.0),
        FilterOp::Invert(params.invert / 100.0),
    ];

    let ops = numeric
        .into_iter()
        .chain(effects.active().flat_map(|p| p.ops().iter().copied()))
        .filter(|op| !op.is_identity())
        .collect();

    FilterChain { ops }
}
