//! arcraft turns a photo into a shareable, marker-based AR experience.
//!
//! The crate is the workflow core of a four-step wizard:
//!
//! - acquire an image (file, drag-drop, camera frame, remote URL) into a [`Raster`]
//! - edit it through a deterministic filter chain ([`edit`])
//! - configure the AR placement and finalize it into an immutable [`Experience`]
//! - share a link plus QR code that opens the [`viewer`] on another device
//!
//! Platform capabilities (camera, network, AR rendering, share sheets, persistence) sit behind
//! traits. [`Wizard`] owns the whole thing and is driven with [`Intent`]s.
#![forbid(unsafe_code)]

mod foundation;

pub mod acquire;
pub mod config;
pub mod edit;
pub mod model;
pub mod share;
pub mod store;
pub mod viewer;
pub mod wizard;
pub mod workflow;

pub use crate::foundation::core::{EncodedImage, Notice, Raster, Severity};
pub use crate::foundation::error::{ArcraftError, ArcraftResult};

pub use crate::acquire::{
    Acquired, CameraCapture, CameraDevice, Facing, FileInput, ImageFetcher, ImagePolicy,
    MediaStream,
};
pub use crate::config::WizardConfig;
pub use crate::edit::{
    Accumulator, CpuFilterEngine, EffectPreset, FilterEngine, FilterKind, FilterParams,
};
pub use crate::model::{Draft, Experience, ExperienceId, ExperienceSummary, Marker, Placement};
pub use crate::share::{QrCodeEncoder, QrEncoder, QrOptions, ShareCard, ShareIntent, ShareTarget};
pub use crate::store::{ExperienceStore, FileBackend, KvBackend, MemoryBackend, OrphanPolicy};
pub use crate::viewer::{ArRenderer, ArScene, ArViewer, MarkerEvent, RecordingRenderer};
pub use crate::wizard::{AcquireRequest, Intent, Wizard};
pub use crate::workflow::{AdvanceOpts, EditMode, Step};
