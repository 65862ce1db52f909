//! Viewing mode: resolve an experience id and hand its scene to the AR renderer.

use crate::{
    foundation::core::EncodedImage,
    foundation::error::{ArcraftError, ArcraftResult},
    model::{Experience, ExperienceId, Marker},
    share::extract_experience_id,
    store::{ExperienceStore, KvBackend},
};

pub const STATUS_SEARCHING: &str = "Looking for marker...";
pub const STATUS_FOUND: &str = "Marker found";

/// Scene description handed to the renderer. Vectors are `[x, y, z]`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArScene {
    pub experience_id: ExperienceId,
    pub image: EncodedImage,
    /// Marker preset the tracker anchors to.
    pub marker: Marker,
    pub scale: [f32; 3],
    pub position: [f32; 3],
    /// Degrees; the image plane lies flat on the marker (`x = -90`).
    pub rotation: [f32; 3],
    /// Plane width and height in marker units.
    pub plane: [f32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    pub glow: bool,
    pub shadow: bool,
}

impl ArScene {
    pub fn from_experience(exp: &Experience) -> Self {
        let p = exp.placement();
        Self {
            experience_id: exp.id().clone(),
            image: exp.image().clone(),
            marker: p.marker,
            scale: [p.scale; 3],
            position: [0.0, p.height, 0.0],
            rotation: [-90.0, p.rotation, 0.0],
            plane: [2.0, 2.0],
            animation: p.animation.clone(),
            glow: p.glow,
            shadow: p.shadow,
        }
    }
}

/// Marker tracking and overlay rendering, supplied by the platform.
pub trait ArRenderer {
    fn mount(&mut self, scene: &ArScene) -> ArcraftResult<()>;
    /// Tear the scene down and release the camera feed. Must be idempotent.
    fn stop(&mut self);
}

/// Renderer that only remembers what it was asked to show.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingRenderer {
    pub mounted: Option<ArScene>,
    pub mounts: usize,
    pub stops: usize,
}

impl ArRenderer for RecordingRenderer {
    fn mount(&mut self, scene: &ArScene) -> ArcraftResult<()> {
        self.mounted = Some(scene.clone());
        self.mounts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        if self.mounted.take().is_some() {
            self.stops += 1;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerEvent {
    Found,
    Lost,
}

/// Page-level state toggled while viewing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewportChrome {
    pub scroll_locked: bool,
    pub viewer_visible: bool,
}

struct ActiveView {
    scene: ArScene,
    restore: ViewportChrome,
}

pub struct ArViewer<R: ArRenderer> {
    renderer: R,
    chrome: ViewportChrome,
    active: Option<ActiveView>,
    status: Option<&'static str>,
}

impl<R: ArRenderer> ArViewer<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_chrome(renderer, ViewportChrome::default())
    }

    pub fn with_chrome(renderer: R, chrome: ViewportChrome) -> Self {
        Self {
            renderer,
            chrome,
            active: None,
            status: None,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn chrome(&self) -> ViewportChrome {
        self.chrome
    }

    pub fn is_viewing(&self) -> bool {
        self.active.is_some()
    }

    pub fn scene(&self) -> Option<&ArScene> {
        self.active.as_ref().map(|a| &a.scene)
    }

    pub fn status_text(&self) -> Option<&'static str> {
        self.status
    }

    /// Look an id up in the session cache, then the backend.
    #[tracing::instrument(skip(store))]
    pub fn resolve<B: KvBackend>(
        store: &mut ExperienceStore<B>,
        id: &ExperienceId,
    ) -> ArcraftResult<Experience> {
        store
            .get(id)?
            .ok_or_else(|| ArcraftError::experience_not_found(id.as_str()))
    }

    /// Enter viewing mode. An explicit id wins over one carried by `page_url`.
    ///
    /// On failure nothing is mounted and no chrome is toggled.
    pub fn enter<B: KvBackend>(
        &mut self,
        store: &mut ExperienceStore<B>,
        explicit: Option<&ExperienceId>,
        page_url: Option<&url::Url>,
    ) -> ArcraftResult<&ArScene> {
        let id = match explicit {
            Some(id) => id.clone(),
            None => page_url
                .and_then(extract_experience_id)
                .ok_or_else(|| ArcraftError::experience_not_found("no experience id to view"))?,
        };
        let exp = Self::resolve(store, &id)?;
        let scene = ArScene::from_experience(&exp);

        self.exit();
        self.renderer.mount(&scene)?;
        let restore = self.chrome;
        self.chrome = ViewportChrome {
            scroll_locked: true,
            viewer_visible: true,
        };
        self.status = Some(STATUS_SEARCHING);
        tracing::info!(%id, marker = %scene.marker, "viewer entered");
        Ok(&self.active.insert(ActiveView { scene, restore }).scene)
    }

    /// Leave viewing mode, restoring every toggled side effect. Returns `false` if not viewing.
    pub fn exit(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        self.renderer.stop();
        self.chrome = active.restore;
        self.status = None;
        tracing::debug!(id = %active.scene.experience_id, "viewer exited");
        true
    }

    pub fn on_marker_event(&mut self, event: MarkerEvent) -> Option<&'static str> {
        self.active.as_ref()?;
        let text = match event {
            MarkerEvent::Found => STATUS_FOUND,
            MarkerEvent::Lost => STATUS_SEARCHING,
        };
        self.status = Some(text);
        Some(text)
    }
}
