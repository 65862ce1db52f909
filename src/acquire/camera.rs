use crate::{
    acquire::{Acquired, ImagePolicy},
    foundation::core::Raster,
    foundation::error::{ArcraftError, ArcraftResult},
    model::ImageOrigin,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Facing {
    #[default]
    Environment,
    User,
}

impl Facing {
    pub fn flipped(self) -> Self {
        match self {
            Self::Environment => Self::User,
            Self::User => Self::Environment,
        }
    }
}

/// A live device video stream.
pub trait MediaStream {
    /// Freeze the current frame.
    fn capture_frame(&mut self) -> ArcraftResult<Raster>;
    /// Stop every track of the stream. Must be idempotent.
    fn stop(&mut self);
}

/// Platform camera access (permission prompt, device selection).
pub trait CameraDevice {
    fn open(&mut self, facing: Facing) -> ArcraftResult<Box<dyn MediaStream>>;
}

struct Session {
    stream: Box<dyn MediaStream>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stream.stop();
    }
}

/// Exclusive, single-instance camera session.
///
/// At most one stream is held at a time. The stream is released on capture, cancel, facing
/// switch, error and drop.
pub struct CameraCapture<D: CameraDevice> {
    device: D,
    facing: Facing,
    session: Option<Session>,
}

impl<D: CameraDevice> CameraCapture<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            facing: Facing::default(),
            session: None,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Open the preview stream, releasing any previous one first.
    pub fn start(&mut self) -> ArcraftResult<()> {
        self.release();
        let stream = self.device.open(self.facing).map_err(|e| {
            tracing::warn!(error = %e, facing = ?self.facing, "camera open failed");
            ArcraftError::source_unavailable(format!("camera unavailable: {e}"))
        })?;
        self.session = Some(Session { stream });
        tracing::debug!(facing = ?self.facing, "camera started");
        Ok(())
    }

    /// Freeze one frame. The stream is released whether or not the capture succeeds.
    pub fn capture(&mut self, policy: &ImagePolicy) -> ArcraftResult<Acquired> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| ArcraftError::missing_prerequisite("camera is not started"))?;
        let frame = session.stream.capture_frame();
        drop(session);

        let frame = frame
            .map_err(|e| ArcraftError::source_unavailable(format!("camera capture failed: {e}")))?;
        let raster = frame.fit_within(policy.max_width, policy.max_height)?;
        Ok(Acquired {
            byte_size: raster.byte_len() as u64,
            raster,
            origin: ImageOrigin::Camera,
        })
    }

    pub fn cancel(&mut self) {
        self.release();
    }

    /// Toggle front/back camera and reopen the stream.
    pub fn switch_facing(&mut self) -> ArcraftResult<()> {
        self.release();
        self.facing = self.facing.flipped();
        self.start()
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!("camera stream released");
        }
    }
}
