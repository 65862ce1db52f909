//! Step sequencer: Upload -> Edit -> Configure -> Share, with data gates on every move.

use std::{collections::VecDeque, fmt, str::FromStr, time::Duration};

use crate::{
    acquire::Acquired,
    edit::Accumulator,
    foundation::core::{Notice, Severity},
    foundation::error::{ArcraftError, ArcraftResult},
    model::{Draft, ExperienceId, PlacementDefaults},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Step {
    #[default]
    Upload = 1,
    Edit = 2,
    Configure = 3,
    Share = 4,
}

impl Step {
    pub const ALL: [Step; 4] = [Self::Upload, Self::Edit, Self::Configure, Self::Share];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Edit => "edit",
            Self::Configure => "configure",
            Self::Share => "share",
        }
    }

    fn entered_message(self) -> &'static str {
        match self {
            Self::Upload => "Choose an image to start",
            Self::Edit => "Adjust your image",
            Self::Configure => "Configure the AR placement",
            Self::Share => "Your AR experience is ready to share",
        }
    }
}

impl TryFrom<u8> for Step {
    type Error = ArcraftError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|s| s.number() == n)
            .ok_or_else(|| ArcraftError::validation(format!("step must be in 1..=4, got {n}")))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

impl FromStr for Step {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Self::try_from(n);
        }
        Self::ALL
            .into_iter()
            .find(|step| step.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArcraftError::validation(format!("unknown step '{s}'")))
    }
}

/// Whether the Edit step is shown after acquisition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
    /// Edit is shown; it is skipped only on explicit request.
    #[default]
    Manual,
    /// An automatic enhance pass is rendered and Edit is skipped.
    Auto,
    /// Edit is skipped and the unfiltered image is used.
    Skip,
}

impl FromStr for EditMode {
    type Err = ArcraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "auto" => Ok(Self::Auto),
            "skip" => Ok(Self::Skip),
            _ => Err(ArcraftError::validation(format!(
                "unknown edit mode '{s}' (expected manual, auto or skip)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvanceOpts {
    pub skip_edit: bool,
}

/// Transient user notices, oldest first.
#[derive(Clone, Debug)]
pub struct NoticeQueue {
    items: VecDeque<Notice>,
    duration: Duration,
}

impl NoticeQueue {
    pub fn new(duration: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            duration,
        }
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.items
            .push_back(Notice::new(severity, message, self.duration));
    }

    pub fn push_error(&mut self, err: &ArcraftError) {
        self.push(err.severity(), err.to_string());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        self.items.drain(..).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowState {
    step: Step,
    accumulator: Option<Accumulator>,
    active_experience_id: Option<ExperienceId>,
}

impl WorkflowState {
    pub fn step(&self) -> Step {
        self.step
    }

    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.accumulator.as_ref()
    }

    pub fn draft(&self) -> Option<&Draft> {
        self.accumulator.as_ref().map(Accumulator::draft)
    }

    pub fn active_experience_id(&self) -> Option<&ExperienceId> {
        self.active_experience_id.as_ref()
    }

    fn has_image(&self) -> bool {
        self.draft().is_some_and(Draft::has_image)
    }

    fn is_pristine(&self) -> bool {
        self.step() == Step::Upload
            && self.accumulator.is_none()
            && self.active_experience_id.is_none()
    }
}

pub struct Workflow {
    state: WorkflowState,
    edit_mode: EditMode,
    notices: NoticeQueue,
}

impl Workflow {
    pub fn new(edit_mode: EditMode, notice_duration: Duration) -> Self {
        Self {
            state: WorkflowState::default(),
            edit_mode,
            notices: NoticeQueue::new(notice_duration),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step()
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn notices(&mut self) -> &mut NoticeQueue {
        &mut self.notices
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Put a freshly acquired image into the draft, creating the draft if needed.
    ///
    /// Filter and placement values of an existing draft are kept.
    pub fn load_image(&mut self, defaults: &PlacementDefaults, acquired: Acquired) {
        self.state
            .accumulator
            .get_or_insert_with(|| Accumulator::new(defaults))
            .load_image(acquired);
    }

    pub fn accumulator_mut(&mut self) -> ArcraftResult<&mut Accumulator> {
        self.state
            .accumulator
            .as_mut()
            .ok_or_else(|| ArcraftError::missing_prerequisite("no draft in progress"))
    }

    pub fn set_active_experience(&mut self, id: ExperienceId) {
        self.state.active_experience_id = Some(id);
    }

    fn check_move(&self, target: Step, opts: AdvanceOpts) -> ArcraftResult<()> {
        let from = self.step();
        let skip_allowed = opts.skip_edit || self.edit_mode != EditMode::Manual;
        let valid = target.number() == from.number() + 1
            || target < from
            || (from == Step::Upload && target == Step::Configure && skip_allowed);
        if !valid {
            return Err(ArcraftError::InvalidTransition {
                from: from.number(),
                to: target.number(),
            });
        }

        match target {
            Step::Upload => Ok(()),
            Step::Edit | Step::Configure if !self.state.has_image() => Err(
                ArcraftError::missing_prerequisite("an image is required for this step"),
            ),
            Step::Edit | Step::Configure => Ok(()),
            Step::Share => match self.state.draft() {
                Some(draft) if draft.has_image() => draft.placement.complete().map(|_| ()),
                _ => Err(ArcraftError::missing_prerequisite(
                    "an image is required for this step",
                )),
            },
        }
    }

    /// Move to `target`. On error the state is unchanged.
    pub fn advance(&mut self, target: Step, opts: AdvanceOpts) -> ArcraftResult<Step> {
        let from = self.step();
        self.check_move(target, opts)?;
        self.state.step = target;
        tracing::debug!(from = from.number(), to = target.number(), "workflow step changed");
        self.notices
            .push(Severity::Info, target.entered_message());
        Ok(target)
    }

    /// Back to Upload with no draft and no active experience. Returns `false` when already
    /// there, in which case nothing is emitted.
    pub fn reset(&mut self) -> bool {
        if self.state.is_pristine() {
            return false;
        }
        self.state = WorkflowState::default();
        tracing::info!("workflow reset");
        self.notices.push(Severity::Success, "Started a new experience");
        true
    }
}
