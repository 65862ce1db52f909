use std::{cell::Cell, io::Cursor, rc::Rc};

use arcraft::{
    AcquireRequest, ArcraftError, ArcraftResult, CameraCapture, CameraDevice, Facing, FileInput,
    ImagePolicy, Intent, MediaStream, MemoryBackend, Raster, RecordingRenderer, Severity, Step,
    Wizard, WizardConfig,
    acquire::{FetchedImage, ImageFetcher},
};

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(w, h, image::Rgba([30, 140, 220, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

fn wizard() -> Wizard<MemoryBackend> {
    Wizard::new(
        WizardConfig::default(),
        MemoryBackend::new(),
        RecordingRenderer::default(),
    )
    .unwrap()
}

#[test]
fn dropping_three_files_processes_only_the_first() {
    let mut w = wizard();
    let files = vec![
        FileInput::new("first.png", None, png_bytes(12, 8)),
        FileInput::new("second.png", None, png_bytes(4, 4)),
        FileInput::new("third.png", None, png_bytes(5, 5)),
    ];
    w.dispatch(Intent::Acquire(AcquireRequest::Drop(files)))
        .unwrap();
    assert_eq!(w.step(), Step::Edit);

    let image = w.state().draft().unwrap().image.as_ref().unwrap();
    assert_eq!((image.source.width, image.source.height), (12, 8));

    let notices = w.drain_notices();
    assert!(
        notices
            .iter()
            .any(|n| n.severity == Severity::Warning && n.message.contains("one image"))
    );
}

#[test]
fn drop_without_images_is_unsupported_and_keeps_step() {
    let mut w = wizard();
    let files = vec![FileInput::new("notes.txt", Some("text/plain"), b"hi".to_vec())];
    let err = w
        .dispatch(Intent::Acquire(AcquireRequest::Drop(files)))
        .unwrap_err();
    assert!(matches!(err, ArcraftError::UnsupportedFormat(_)));
    assert_eq!(w.step(), Step::Upload);
}

#[test]
fn oversized_file_on_disk_is_rejected_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("big.png");
    std::fs::write(&path, png_bytes(16, 16)).unwrap();

    let policy = ImagePolicy {
        max_bytes: 10,
        ..ImagePolicy::default()
    };
    assert!(matches!(
        FileInput::from_path(&path, &policy),
        Err(ArcraftError::FileTooLarge { max: 10, .. })
    ));
    assert!(FileInput::from_path(&path, &ImagePolicy::default()).is_ok());
}

struct CountingStream {
    active: Rc<Cell<usize>>,
    live: bool,
    fail: bool,
}

impl MediaStream for CountingStream {
    fn capture_frame(&mut self) -> ArcraftResult<Raster> {
        if self.fail {
            return Err(ArcraftError::source_unavailable("sensor glitch"));
        }
        Raster::solid(1280, 960, [10, 20, 30, 255])
    }

    fn stop(&mut self) {
        if self.live {
            self.live = false;
            self.active.set(self.active.get() - 1);
        }
    }
}

struct CountingDevice {
    active: Rc<Cell<usize>>,
    fail_capture: bool,
    deny: bool,
}

impl CameraDevice for CountingDevice {
    fn open(&mut self, _facing: Facing) -> ArcraftResult<Box<dyn MediaStream>> {
        if self.deny {
            return Err(ArcraftError::source_unavailable("permission denied"));
        }
        self.active.set(self.active.get() + 1);
        Ok(Box::new(CountingStream {
            active: Rc::clone(&self.active),
            live: true,
            fail: self.fail_capture,
        }))
    }
}

fn camera(fail_capture: bool, deny: bool) -> (CameraCapture<CountingDevice>, Rc<Cell<usize>>) {
    let active = Rc::new(Cell::new(0));
    let cam = CameraCapture::new(CountingDevice {
        active: Rc::clone(&active),
        fail_capture,
        deny,
    });
    (cam, active)
}

#[test]
fn camera_leaves_no_active_tracks() {
    let policy = ImagePolicy::default();

    let (mut cam, active) = camera(false, false);
    cam.start().unwrap();
    cam.switch_facing().unwrap();
    assert_eq!(active.get(), 1);
    let shot = cam.capture(&policy).unwrap();
    assert_eq!(active.get(), 0);
    assert!(shot.raster.width <= 800 && shot.raster.height <= 600);

    let (mut cam, active) = camera(false, false);
    cam.start().unwrap();
    cam.cancel();
    assert_eq!(active.get(), 0);

    let (mut cam, active) = camera(true, false);
    cam.start().unwrap();
    assert!(cam.capture(&policy).is_err());
    assert_eq!(active.get(), 0);

    let (mut cam, active) = camera(false, true);
    assert!(matches!(cam.start(), Err(ArcraftError::SourceUnavailable(_))));
    assert_eq!(active.get(), 0);

    let (mut cam, active) = camera(false, false);
    cam.start().unwrap();
    drop(cam);
    assert_eq!(active.get(), 0);
}

#[test]
fn captured_frame_feeds_the_wizard() {
    let (mut cam, active) = camera(false, false);
    cam.start().unwrap();
    let shot = cam.capture(&ImagePolicy::default()).unwrap();
    assert_eq!(active.get(), 0);

    let mut w = wizard();
    w.dispatch(Intent::Acquire(AcquireRequest::Captured(shot)))
        .unwrap();
    assert_eq!(w.step(), Step::Edit);
}

struct FixedFetcher(Vec<u8>);

impl ImageFetcher for FixedFetcher {
    fn fetch(&self, _url: &url::Url, _max_bytes: u64) -> ArcraftResult<FetchedImage> {
        Ok(FetchedImage {
            bytes: self.0.clone(),
            content_type: Some("image/png".to_string()),
        })
    }
}

#[test]
fn url_acquisition_uses_the_installed_fetcher() {
    let mut w = wizard().with_fetcher(FixedFetcher(png_bytes(6, 6)));
    w.dispatch(Intent::Acquire(AcquireRequest::Url(
        "https://images.example/cat.png".to_string(),
    )))
    .unwrap();
    assert_eq!(w.step(), Step::Edit);

    let mut w = wizard().with_fetcher(FixedFetcher(png_bytes(6, 6)));
    let err = w
        .dispatch(Intent::Acquire(AcquireRequest::Url(
            "ftp://images.example/cat.png".to_string(),
        )))
        .unwrap_err();
    assert!(matches!(err, ArcraftError::SourceUnavailable(_)));
    assert_eq!(w.step(), Step::Upload);
}
