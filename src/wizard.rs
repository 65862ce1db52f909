//! The wizard coordinator: one value owning the workflow, the store and every collaborator.
//!
//! Callers drive it with [`Intent`]s. A rejected intent leaves state unchanged, queues an
//! error notice and is also returned as `Err`.

use chrono::{DateTime, Utc};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    acquire::{
        Acquired, FileInput, ImageFetcher, ImagePolicy, acquire_dropped, acquire_file,
        acquire_url, demo_image,
    },
    config::WizardConfig,
    edit::{CpuFilterEngine, EffectPreset, FilterEngine, FilterKind, FilterParams},
    foundation::core::{Notice, Severity},
    foundation::error::{ArcraftError, ArcraftResult},
    model::{ExperienceId, Marker},
    share::{
        QrCodeEncoder, QrEncoder, ShareCard, build_share_url, extract_experience_id, finalize,
        request_qr,
    },
    store::{ExperienceStore, KvBackend},
    viewer::{ArRenderer, ArViewer, MarkerEvent, RecordingRenderer},
    workflow::{AdvanceOpts, EditMode, Step, Workflow, WorkflowState},
};

/// Where a new image comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum AcquireRequest {
    File(FileInput),
    Drop(Vec<FileInput>),
    /// A frame already frozen by a [`crate::acquire::CameraCapture`].
    Captured(Acquired),
    Url(String),
    Demo,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Acquire(AcquireRequest),
    SetFilter(FilterKind, f32),
    ToggleEffect(EffectPreset),
    ResetFilters,
    SaveEdit,
    SkipEdit,
    SetMarker(Marker),
    SetScale(f32),
    SetHeight(f32),
    SetRotation(f32),
    SetAnimation(Option<String>),
    SetGlow(bool),
    SetShadow(bool),
    SetTitle(String),
    SetDescription(String),
    GoTo(Step),
    Finalize,
    View(Option<ExperienceId>),
    ExitViewer,
    Reset,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Acquire(_) => "acquire",
            Self::SetFilter(..) => "set_filter",
            Self::ToggleEffect(_) => "toggle_effect",
            Self::ResetFilters => "reset_filters",
            Self::SaveEdit => "save_edit",
            Self::SkipEdit => "skip_edit",
            Self::SetMarker(_) => "set_marker",
            Self::SetScale(_) => "set_scale",
            Self::SetHeight(_) => "set_height",
            Self::SetRotation(_) => "set_rotation",
            Self::SetAnimation(_) => "set_animation",
            Self::SetGlow(_) => "set_glow",
            Self::SetShadow(_) => "set_shadow",
            Self::SetTitle(_) => "set_title",
            Self::SetDescription(_) => "set_description",
            Self::GoTo(_) => "go_to",
            Self::Finalize => "finalize",
            Self::View(_) => "view",
            Self::ExitViewer => "exit_viewer",
            Self::Reset => "reset",
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub struct Wizard<B: KvBackend, R: ArRenderer = RecordingRenderer> {
    config: WizardConfig,
    policy: ImagePolicy,
    share_base: url::Url,
    workflow: Workflow,
    store: ExperienceStore<B>,
    engine: Box<dyn FilterEngine>,
    qr: Box<dyn QrEncoder>,
    fetcher: Option<Box<dyn ImageFetcher>>,
    viewer: ArViewer<R>,
    page_url: Option<url::Url>,
    share_card: Option<ShareCard>,
    rng: StdRng,
    clock: Clock,
}

impl<B: KvBackend, R: ArRenderer> Wizard<B, R> {
    /// Build a wizard over `backend` with the CPU filter engine and the `qrcode` encoder.
    pub fn new(config: WizardConfig, backend: B, renderer: R) -> ArcraftResult<Self> {
        config.validate()?;
        let share_base = config.share_base()?;
        let store = ExperienceStore::open(backend, config.index_cap, config.orphan_policy)?;

        #[cfg(feature = "http-fetch")]
        let fetcher: Option<Box<dyn ImageFetcher>> = Some(Box::new(
            crate::acquire::HttpFetcher::new(config.fetch_timeout()),
        ));
        #[cfg(not(feature = "http-fetch"))]
        let fetcher: Option<Box<dyn ImageFetcher>> = None;

        Ok(Self {
            policy: config.image_policy(),
            share_base,
            workflow: Workflow::new(config.edit_mode, config.notice_duration()),
            store,
            engine: Box::new(CpuFilterEngine),
            qr: Box::new(QrCodeEncoder),
            fetcher,
            viewer: ArViewer::new(renderer),
            page_url: None,
            share_card: None,
            rng: StdRng::from_os_rng(),
            clock: Box::new(Utc::now),
            config,
        })
    }

    pub fn with_engine(mut self, engine: impl FilterEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    pub fn with_qr_encoder(mut self, qr: impl QrEncoder + 'static) -> Self {
        self.qr = Box::new(qr);
        self
    }

    pub fn with_fetcher(mut self, fetcher: impl ImageFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// The page the wizard was opened on; an `ar` id there is used by `View(None)`.
    pub fn with_page_url(mut self, page_url: url::Url) -> Self {
        self.page_url = Some(page_url);
        self
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn state(&self) -> &WorkflowState {
        self.workflow.state()
    }

    pub fn step(&self) -> Step {
        self.workflow.step()
    }

    pub fn store(&self) -> &ExperienceStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ExperienceStore<B> {
        &mut self.store
    }

    pub fn viewer(&self) -> &ArViewer<R> {
        &self.viewer
    }

    pub fn share_card(&self) -> Option<&ShareCard> {
        self.share_card.as_ref()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.workflow.drain_notices()
    }

    /// Warm the session cache and, when the page URL names an experience, enter viewing mode.
    ///
    /// Returns whether viewing mode was entered.
    pub fn start(&mut self) -> bool {
        let loaded = self.store.load_recent();
        tracing::debug!(loaded, "recent experiences loaded");
        let has_link = self
            .page_url
            .as_ref()
            .and_then(extract_experience_id)
            .is_some();
        has_link && self.dispatch(Intent::View(None)).is_ok()
    }

    pub fn on_marker_event(&mut self, event: MarkerEvent) -> Option<&'static str> {
        self.viewer.on_marker_event(event)
    }

    pub fn dispatch(&mut self, intent: Intent) -> ArcraftResult<()> {
        let name = intent.name();
        let result = self.handle(intent);
        if let Err(e) = &result {
            tracing::warn!(intent = name, error = %e, "intent rejected");
            self.workflow.notices().push_error(e);
        }
        result
    }

    fn handle(&mut self, intent: Intent) -> ArcraftResult<()> {
        match intent {
            Intent::Acquire(req) => self.acquire(req),
            Intent::SetFilter(kind, value) => {
                self.edit_accumulator()?.set_filter(kind, value);
                Ok(())
            }
            Intent::ToggleEffect(preset) => {
                self.edit_accumulator()?.toggle_effect(preset);
                Ok(())
            }
            Intent::ResetFilters => {
                self.edit_accumulator()?.reset();
                self.workflow
                    .notices()
                    .push(Severity::Success, "Edits reset");
                Ok(())
            }
            Intent::SaveEdit => self.save_edit(),
            Intent::SkipEdit => self.skip_edit(),
            Intent::SetMarker(m) => self.with_accumulator(|a| a.set_marker(m)),
            Intent::SetScale(v) => self.with_accumulator(|a| a.set_scale(v)),
            Intent::SetHeight(v) => self.with_accumulator(|a| a.set_height(v)),
            Intent::SetRotation(v) => self.with_accumulator(|a| a.set_rotation(v)),
            Intent::SetAnimation(v) => self.with_accumulator(|a| a.set_animation(v)),
            Intent::SetGlow(v) => self.with_accumulator(|a| a.set_glow(v)),
            Intent::SetShadow(v) => self.with_accumulator(|a| a.set_shadow(v)),
            Intent::SetTitle(v) => self.with_accumulator(|a| a.set_title(v)),
            Intent::SetDescription(v) => self.with_accumulator(|a| a.set_description(v)),
            Intent::GoTo(Step::Share) => self.finalize(),
            Intent::GoTo(Step::Configure) if self.step() == Step::Edit => self.save_edit(),
            Intent::GoTo(Step::Configure)
                if self.step() == Step::Upload && self.workflow.edit_mode() != EditMode::Manual =>
            {
                self.leave_upload()
            }
            Intent::GoTo(target) => self
                .workflow
                .advance(target, AdvanceOpts::default())
                .map(|_| ()),
            Intent::Finalize => self.finalize(),
            Intent::View(id) => self.view(id),
            Intent::ExitViewer => {
                self.viewer.exit();
                Ok(())
            }
            Intent::Reset => {
                self.viewer.exit();
                self.share_card = None;
                self.workflow.reset();
                Ok(())
            }
        }
    }

    /// Filters only change on the edit step; later steps carry the saved render.
    fn edit_accumulator(&mut self) -> ArcraftResult<&mut crate::edit::Accumulator> {
        if self.step() != Step::Edit {
            return Err(ArcraftError::missing_prerequisite(
                "filters can only be changed on the edit step",
            ));
        }
        self.workflow.accumulator_mut()
    }

    fn with_accumulator(
        &mut self,
        f: impl FnOnce(&mut crate::edit::Accumulator),
    ) -> ArcraftResult<()> {
        f(self.workflow.accumulator_mut()?);
        Ok(())
    }

    fn acquire_raw(&mut self, req: AcquireRequest) -> ArcraftResult<Acquired> {
        match req {
            AcquireRequest::File(input) => acquire_file(&self.policy, input),
            AcquireRequest::Drop(files) => {
                let out = acquire_dropped(&self.policy, files)?;
                if out.ignored > 0 {
                    self.workflow.notices().push(
                        Severity::Warning,
                        "Only one image can be processed at a time",
                    );
                }
                Ok(out.acquired)
            }
            AcquireRequest::Captured(acquired) => {
                let raster = acquired
                    .raster
                    .fit_within(self.policy.max_width, self.policy.max_height)?;
                Ok(Acquired { raster, ..acquired })
            }
            AcquireRequest::Url(url) => {
                let fetcher = self
                    .fetcher
                    .as_deref()
                    .ok_or_else(|| ArcraftError::source_unavailable("no image fetcher configured"))?;
                acquire_url(fetcher, &self.policy, &url)
            }
            AcquireRequest::Demo => demo_image(),
        }
    }

    fn acquire(&mut self, req: AcquireRequest) -> ArcraftResult<()> {
        let step = self.step();
        if step > Step::Edit {
            return Err(ArcraftError::validation(
                "go back to the upload or edit step to replace the image",
            ));
        }
        let acquired = self.acquire_raw(req)?;
        tracing::info!(
            origin = ?acquired.origin,
            byte_size = acquired.byte_size,
            "image acquired"
        );
        self.workflow
            .load_image(&self.config.placement_defaults, acquired);
        self.workflow
            .notices()
            .push(Severity::Success, "Image loaded");
        if step != Step::Upload {
            return Ok(());
        }
        self.leave_upload()
    }

    /// Move off the upload step the way the configured edit mode prescribes.
    fn leave_upload(&mut self) -> ArcraftResult<()> {
        let moved = match self.workflow.edit_mode() {
            EditMode::Manual => self.workflow.advance(Step::Edit, AdvanceOpts::default()),
            EditMode::Auto => {
                let acc = self.workflow.accumulator_mut()?;
                acc.set_filters(FilterParams::auto_enhance());
                acc.save(self.engine.as_ref())?;
                self.workflow.advance(Step::Configure, AdvanceOpts::default())
            }
            EditMode::Skip => {
                self.workflow.accumulator_mut()?.discard_render();
                self.workflow.advance(Step::Configure, AdvanceOpts::default())
            }
        };
        moved.map(|_| ())
    }

    fn save_edit(&mut self) -> ArcraftResult<()> {
        let from = self.step();
        if from != Step::Edit {
            return Err(ArcraftError::InvalidTransition {
                from: from.number(),
                to: Step::Configure.number(),
            });
        }
        self.workflow
            .accumulator_mut()?
            .save(self.engine.as_ref())?;
        self.workflow
            .advance(Step::Configure, AdvanceOpts::default())?;
        Ok(())
    }

    fn skip_edit(&mut self) -> ArcraftResult<()> {
        let opts = AdvanceOpts { skip_edit: true };
        match self.step() {
            Step::Upload => self.workflow.advance(Step::Configure, opts).map(|_| ()),
            Step::Edit => {
                let acc = self.workflow.accumulator_mut()?;
                acc.reset();
                acc.discard_render();
                self.workflow.advance(Step::Configure, opts).map(|_| ())
            }
            from => Err(ArcraftError::InvalidTransition {
                from: from.number(),
                to: Step::Configure.number(),
            }),
        }
    }

    fn finalize(&mut self) -> ArcraftResult<()> {
        let from = self.step();
        if from != Step::Configure {
            return Err(ArcraftError::InvalidTransition {
                from: from.number(),
                to: Step::Share.number(),
            });
        }
        let draft = self
            .workflow
            .state()
            .draft()
            .ok_or_else(|| ArcraftError::missing_prerequisite("no draft in progress"))?;
        let now = (self.clock)();
        let (exp, outcome) = finalize(draft, &mut self.store, now, &mut self.rng)?;
        self.workflow.advance(Step::Share, AdvanceOpts::default())?;

        if let Some(warning) = &outcome.warning {
            self.workflow.notices().push_error(warning);
        }
        let url = build_share_url(&self.share_base, exp.id());
        let qr = match request_qr(self.qr.as_ref(), url.as_str(), &self.config.qr) {
            Ok(raster) => Some(raster),
            Err(e) => {
                tracing::warn!(error = %e, "qr code unavailable; link still usable");
                self.workflow.notices().push_error(&e);
                None
            }
        };
        self.share_card = Some(ShareCard {
            id: exp.id().clone(),
            url,
            title: exp.metadata().title.clone(),
            qr,
        });
        self.workflow.set_active_experience(exp.id().clone());
        self.workflow
            .notices()
            .push(Severity::Success, "AR experience created");
        Ok(())
    }

    fn view(&mut self, id: Option<ExperienceId>) -> ArcraftResult<()> {
        let id = id
            .or_else(|| self.page_url.as_ref().and_then(extract_experience_id))
            .or_else(|| self.workflow.state().active_experience_id().cloned())
            .ok_or_else(|| ArcraftError::experience_not_found("no experience to view"))?;
        self.viewer.enter(&mut self.store, Some(&id), None)?;
        self.workflow
            .notices()
            .push(Severity::Info, "Point your camera at the marker");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        edit::FilterParams,
        foundation::core::Raster,
        model::ImageOrigin,
        store::MemoryBackend,
    };

    fn wizard(mode: EditMode) -> Wizard<MemoryBackend> {
        let cfg = WizardConfig {
            edit_mode: mode,
            share_base_url: "https://ar.example/app/".to_string(),
            ..WizardConfig::default()
        };
        Wizard::new(cfg, MemoryBackend::new(), RecordingRenderer::default())
            .unwrap()
            .with_seed(42)
    }

    fn photo() -> AcquireRequest {
        AcquireRequest::Captured(Acquired {
            raster: Raster::solid(8, 6, [120, 80, 40, 255]).unwrap(),
            byte_size: 192,
            origin: ImageOrigin::Camera,
        })
    }

    #[test]
    fn manual_flow_end_to_end() {
        let mut w = wizard(EditMode::Manual);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        assert_eq!(w.step(), Step::Edit);
        w.dispatch(Intent::SetFilter(FilterKind::Brightness, 130.0))
            .unwrap();
        w.dispatch(Intent::SaveEdit).unwrap();
        assert_eq!(w.step(), Step::Configure);
        w.dispatch(Intent::SetMarker(Marker::Kanji)).unwrap();
        w.dispatch(Intent::Finalize).unwrap();
        assert_eq!(w.step(), Step::Share);

        let card = w.share_card().unwrap().clone();
        assert!(card.qr.is_some());
        assert_eq!(extract_experience_id(&card.url), Some(card.id.clone()));
        assert_eq!(w.state().active_experience_id(), Some(&card.id));
    }

    #[test]
    fn rejected_intent_leaves_state_and_queues_error() {
        let mut w = wizard(EditMode::Manual);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        w.drain_notices();
        assert!(w.dispatch(Intent::GoTo(Step::Share)).is_err());
        assert_eq!(w.step(), Step::Edit);
        let notices = w.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].severity, Severity::Error);
    }

    #[test]
    fn auto_mode_enhances_and_jumps_to_configure() {
        let mut w = wizard(EditMode::Auto);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        assert_eq!(w.step(), Step::Configure);
        let draft = w.state().draft().unwrap();
        assert_eq!(draft.filters, FilterParams::auto_enhance());
        assert!(draft.image.as_ref().unwrap().rendered.is_some());
    }

    #[test]
    fn skip_mode_keeps_unfiltered_image() {
        let mut w = wizard(EditMode::Skip);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        assert_eq!(w.step(), Step::Configure);
        let draft = w.state().draft().unwrap();
        assert!(draft.filters.is_identity());
        assert!(draft.image.as_ref().unwrap().rendered.is_none());
    }

    #[test]
    fn skip_edit_from_edit_discards_filters() {
        let mut w = wizard(EditMode::Manual);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        w.dispatch(Intent::SetFilter(FilterKind::Sepia, 80.0)).unwrap();
        w.dispatch(Intent::SkipEdit).unwrap();
        assert_eq!(w.step(), Step::Configure);
        assert!(w.state().draft().unwrap().filters.is_identity());
    }

    #[test]
    fn filter_intents_are_rejected_after_the_edit_step() {
        let mut w = wizard(EditMode::Manual);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        w.dispatch(Intent::SetFilter(FilterKind::Brightness, 130.0))
            .unwrap();
        w.dispatch(Intent::SaveEdit).unwrap();
        let before = w.state().draft().cloned();

        assert!(matches!(
            w.dispatch(Intent::SetFilter(FilterKind::Brightness, 40.0)),
            Err(ArcraftError::MissingPrerequisite(_))
        ));
        assert!(w.dispatch(Intent::ToggleEffect(EffectPreset::Vintage)).is_err());
        assert!(w.dispatch(Intent::ResetFilters).is_err());
        assert_eq!(w.step(), Step::Configure);
        assert_eq!(w.state().draft().cloned(), before);
    }

    #[test]
    fn filter_intents_are_rejected_in_skip_mode() {
        let mut w = wizard(EditMode::Skip);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        assert!(
            w.dispatch(Intent::SetFilter(FilterKind::Sepia, 100.0))
                .is_err()
        );
        assert!(w.state().draft().unwrap().filters.is_identity());
    }

    #[test]
    fn goto_configure_from_upload_follows_auto_mode() {
        let mut w = wizard(EditMode::Auto);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        w.dispatch(Intent::GoTo(Step::Upload)).unwrap();
        w.workflow
            .accumulator_mut()
            .unwrap()
            .set_filters(FilterParams::default());
        w.workflow.accumulator_mut().unwrap().discard_render();

        w.dispatch(Intent::GoTo(Step::Configure)).unwrap();
        assert_eq!(w.step(), Step::Configure);
        let draft = w.state().draft().unwrap();
        assert_eq!(draft.filters, FilterParams::auto_enhance());
        assert!(draft.image.as_ref().unwrap().rendered.is_some());
    }

    #[test]
    fn goto_configure_from_upload_needs_an_image() {
        let mut w = wizard(EditMode::Auto);
        assert!(w.dispatch(Intent::GoTo(Step::Configure)).is_err());
        assert_eq!(w.step(), Step::Upload);
    }

    #[test]
    fn view_falls_back_to_active_experience_and_exit_restores() {
        let mut w = wizard(EditMode::Skip);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        w.dispatch(Intent::SetMarker(Marker::Barcode)).unwrap();
        w.dispatch(Intent::Finalize).unwrap();
        w.dispatch(Intent::View(None)).unwrap();
        assert!(w.viewer().is_viewing());
        assert_eq!(w.viewer().scene().unwrap().marker, Marker::Barcode);
        assert_eq!(w.step(), Step::Share);
        w.dispatch(Intent::ExitViewer).unwrap();
        assert!(!w.viewer().is_viewing());
        assert!(!w.viewer().chrome().scroll_locked);
    }

    #[test]
    fn acquisition_failure_keeps_previous_draft() {
        let mut w = wizard(EditMode::Manual);
        w.dispatch(Intent::Acquire(photo())).unwrap();
        let before = w.state().draft().cloned();
        let bad = FileInput::new("notes.txt", None, b"hello".to_vec());
        assert!(matches!(
            w.dispatch(Intent::Acquire(AcquireRequest::File(bad))),
            Err(ArcraftError::UnsupportedFormat(_))
        ));
        assert_eq!(w.state().draft().cloned(), before);
    }

    #[test]
    fn reset_clears_share_card_and_is_idempotent() {
        let mut w = wizard(EditMode::Skip);
        w.dispatch(Intent::Acquire(AcquireRequest::Demo)).unwrap();
        w.dispatch(Intent::SetMarker(Marker::Hiro)).unwrap();
        w.dispatch(Intent::GoTo(Step::Share)).unwrap();
        w.drain_notices();

        w.dispatch(Intent::Reset).unwrap();
        assert_eq!(w.step(), Step::Upload);
        assert!(w.share_card().is_none());
        assert_eq!(w.drain_notices().len(), 1);
        w.dispatch(Intent::Reset).unwrap();
        assert!(w.drain_notices().is_empty());
    }
}
