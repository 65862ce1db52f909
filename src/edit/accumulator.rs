use crate::{
    acquire::Acquired,
    edit::engine::FilterEngine,
    edit::filters::{EffectPreset, FilterChain, FilterKind, FilterParams, build_chain},
    foundation::core::{EncodedImage, Raster},
    foundation::error::{ArcraftError, ArcraftResult},
    model::{Draft, DraftImage, Marker, PlacementDefaults},
};

/// Owns the live [`Draft`] and every mutation applied to it before handoff.
///
/// Image filters and placement parameters are independent: filter operations never touch
/// placement and vice versa.
#[derive(Clone, Debug, PartialEq)]
pub struct Accumulator {
    draft: Draft,
}

impl Accumulator {
    pub fn new(defaults: &PlacementDefaults) -> Self {
        Self {
            draft: Draft::new(defaults),
        }
    }

    pub fn from_draft(draft: Draft) -> Self {
        Self { draft }
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn into_draft(self) -> Draft {
        self.draft
    }

    /// Replace the source image. Any earlier render is dropped; filter values are kept.
    pub fn load_image(&mut self, acquired: Acquired) {
        self.draft.image = Some(DraftImage {
            source: acquired.raster,
            byte_size: acquired.byte_size,
            origin: acquired.origin,
            rendered: None,
        });
    }

    pub fn set_filter(&mut self, kind: FilterKind, value: f32) -> f32 {
        self.draft.filters.set(kind, value)
    }

    pub fn set_filters(&mut self, params: FilterParams) {
        for kind in FilterKind::ALL {
            self.draft.filters.set(kind, params.get(kind));
        }
    }

    pub fn toggle_effect(&mut self, preset: EffectPreset) -> bool {
        self.draft.effects.toggle(preset)
    }

    pub fn chain(&self) -> FilterChain {
        build_chain(&self.draft.filters, &self.draft.effects)
    }

    /// Render the source through the current parameters. Always recomputed from the source.
    pub fn apply(&self, engine: &dyn FilterEngine) -> ArcraftResult<Raster> {
        let image = self
            .draft
            .image
            .as_ref()
            .ok_or_else(|| ArcraftError::missing_prerequisite("no image to edit"))?;
        engine.render(&image.source, &self.chain())
    }

    /// Restore identity filters and clear effects. Placement and source are untouched.
    pub fn reset(&mut self) {
        self.draft.filters = FilterParams::default();
        self.draft.effects = Default::default();
    }

    /// Freeze the current render into an encoded payload on the draft image.
    #[tracing::instrument(skip(self, engine))]
    pub fn save(&mut self, engine: &dyn FilterEngine) -> ArcraftResult<&EncodedImage> {
        let rendered = self.apply(engine)?;
        let encoded = EncodedImage::png_from_raster(&rendered)?;
        let image = self
            .draft
            .image
            .as_mut()
            .ok_or_else(|| ArcraftError::missing_prerequisite("no image to save"))?;
        tracing::debug!(bytes = encoded.as_str().len(), "saved edited image");
        let saved: &EncodedImage = image.rendered.insert(encoded);
        Ok(saved)
    }

    /// Forget the last saved render so the unfiltered source is used at handoff.
    pub fn discard_render(&mut self) {
        if let Some(image) = self.draft.image.as_mut() {
            image.rendered = None;
        }
    }

    pub fn set_marker(&mut self, marker: Marker) {
        self.draft.placement.marker = Some(marker);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.draft.placement.scale = scale;
    }

    pub fn set_height(&mut self, height: f32) {
        self.draft.placement.height = height;
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.draft.placement.rotation = rotation;
    }

    pub fn set_animation(&mut self, animation: Option<String>) {
        self.draft.placement.animation = animation;
    }

    pub fn set_glow(&mut self, on: bool) {
        self.draft.placement.glow = on;
    }

    pub fn set_shadow(&mut self, on: bool) {
        self.draft.placement.shadow = on;
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{edit::engine::CpuFilterEngine, model::ImageOrigin};

    fn acquired() -> Acquired {
        let mut data = Vec::new();
        for i in 0..16u8 {
            data.extend_from_slice(&[i * 10, 255 - i * 10, 90, 255]);
        }
        Acquired {
            raster: Raster::new(4, 4, data).unwrap(),
            byte_size: 64,
            origin: ImageOrigin::Demo,
        }
    }

    #[test]
    fn apply_without_image_is_missing_prerequisite() {
        let acc = Accumulator::new(&PlacementDefaults::default());
        assert!(matches!(
            acc.apply(&CpuFilterEngine),
            Err(ArcraftError::MissingPrerequisite(_))
        ));
    }

    #[test]
    fn apply_twice_is_byte_identical() {
        let mut acc = Accumulator::new(&PlacementDefaults::default());
        acc.load_image(acquired());
        acc.set_filter(FilterKind::Contrast, 140.0);
        acc.toggle_effect(EffectPreset::Dramatic);
        let a = acc.apply(&CpuFilterEngine).unwrap();
        let b = acc.apply(&CpuFilterEngine).unwrap();
        assert_eq!(a.rgba8, b.rgba8);
    }

    #[test]
    fn reset_keeps_placement() {
        let mut acc = Accumulator::new(&PlacementDefaults::default());
        acc.load_image(acquired());
        acc.set_filter(FilterKind::Sepia, 60.0);
        acc.toggle_effect(EffectPreset::Warm);
        acc.set_marker(Marker::Pattern);
        acc.set_scale(2.5);

        acc.reset();
        assert!(acc.draft().filters.is_identity());
        assert!(acc.draft().effects.is_empty());
        assert_eq!(acc.draft().placement.marker, Some(Marker::Pattern));
        assert_eq!(acc.draft().placement.scale, 2.5);
        assert!(acc.draft().has_image());
    }

    #[test]
    fn save_stores_rendered_png() {
        let mut acc = Accumulator::new(&PlacementDefaults::default());
        acc.load_image(acquired());
        acc.set_filter(FilterKind::Invert, 100.0);
        let encoded = acc.save(&CpuFilterEngine).unwrap().clone();
        let decoded = encoded.decode().unwrap();
        assert_eq!(decoded, acc.apply(&CpuFilterEngine).unwrap());
        assert_eq!(
            acc.draft().image.as_ref().unwrap().rendered.as_ref(),
            Some(&encoded)
        );
    }

    #[test]
    fn loading_new_image_drops_previous_render() {
        let mut acc = Accumulator::new(&PlacementDefaults::default());
        acc.load_image(acquired());
        acc.save(&CpuFilterEngine).unwrap();
        acc.load_image(acquired());
        assert!(acc.draft().image.as_ref().unwrap().rendered.is_none());
    }
}
