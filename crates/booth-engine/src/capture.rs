use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::crop::{crop_to_portrait_data_uri, PORTRAIT_HEIGHT, PORTRAIT_WIDTH};

/// Which way the camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    User,
    Environment,
}

impl Facing {
    pub fn opposite(self) -> Self {
        match self {
            Facing::User => Facing::Environment,
            Facing::Environment => Facing::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::User => "user",
            Facing::Environment => "environment",
        }
    }
}

/// One rung of the constraint ladder handed to the platform camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintProfile {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub facing: Option<Facing>,
}

/// The four acquisition strategies, tried strictly in order: ideal portrait
/// dimensions with the preferred facing, the opposite facing, dimensions
/// only, then a bare video request.
pub fn constraint_ladder(preferred: Facing) -> [ConstraintProfile; 4] {
    let dims = (Some(PORTRAIT_WIDTH), Some(PORTRAIT_HEIGHT));
    [
        ConstraintProfile {
            width: dims.0,
            height: dims.1,
            facing: Some(preferred),
        },
        ConstraintProfile {
            width: dims.0,
            height: dims.1,
            facing: Some(preferred.opposite()),
        },
        ConstraintProfile {
            width: dims.0,
            height: dims.1,
            facing: None,
        },
        ConstraintProfile {
            width: None,
            height: None,
            facing: None,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No device, no permission, or no platform support. Recoverable via the
    /// upload fallback.
    Unavailable,
    /// A frame was requested before the feed reported its dimensions.
    NotReady,
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::Unavailable => {
                write!(f, "camera unavailable; check permissions or upload a photo")
            }
            CameraError::NotReady => write!(f, "camera not ready; wait a moment and retry"),
        }
    }
}

impl std::error::Error for CameraError {}

/// A live video feed. Exclusively owned by whichever screen acquired it.
pub trait CameraFeed {
    /// Reported frame dimensions; `None` until the feed's metadata settles.
    fn dimensions(&self) -> Option<(u32, u32)>;
    /// One encoded still from the feed.
    fn read_frame(&mut self) -> Result<Vec<u8>>;
    /// Stops every track. Safe to call more than once.
    fn release(&mut self);
}

/// The platform camera capability. External collaborator: the negotiator
/// only assumes `open` either yields a feed or fails per profile.
pub trait CameraBackend {
    /// Whether the platform has camera capability at all.
    fn supported(&self) -> bool;
    fn open(&mut self, profile: &ConstraintProfile) -> Result<Box<dyn CameraFeed>>;
}

const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Walks the constraint ladder sequentially until the platform accepts a
/// profile. Never holds two feeds at once; on exhaustion no feed stays open.
pub struct CaptureNegotiator {
    backend: Box<dyn CameraBackend>,
    facing: Facing,
    initial_facing: Facing,
    ready_timeout: Duration,
}

impl CaptureNegotiator {
    pub fn new(backend: Box<dyn CameraBackend>, facing: Facing) -> Self {
        Self {
            backend,
            facing,
            initial_facing: facing,
            ready_timeout: DEFAULT_READY_TIMEOUT,
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn toggle_facing(&mut self) {
        self.facing = self.facing.opposite();
    }

    pub fn reset_facing(&mut self) {
        self.facing = self.initial_facing;
    }

    /// Tries each profile in order, waiting (bounded) for the accepted feed
    /// to report dimensions. A metadata timeout degrades gracefully: the
    /// feed is still returned.
    pub fn acquire(&mut self) -> Result<Box<dyn CameraFeed>, CameraError> {
        if !self.backend.supported() {
            return Err(CameraError::Unavailable);
        }
        for profile in constraint_ladder(self.facing) {
            let Ok(feed) = self.backend.open(&profile) else {
                continue;
            };
            self.wait_for_dimensions(&*feed);
            return Ok(feed);
        }
        Err(CameraError::Unavailable)
    }

    fn wait_for_dimensions(&self, feed: &dyn CameraFeed) {
        let deadline = Instant::now() + self.ready_timeout;
        while feed.dimensions().is_none() && Instant::now() < deadline {
            thread::sleep(READY_POLL_INTERVAL);
        }
    }
}

/// Countdown-to-capture timer. Cooperative: the owner calls `tick` once per
/// second; at most one countdown is live per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

pub const COUNTDOWN_SECONDS: u32 = 5;

impl Countdown {
    pub fn new(seconds: u32) -> Self {
        Self { remaining: seconds }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Decrements; returns true when the countdown fires.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }
}

/// Session-scoped capture state: at most one live feed, at most one live
/// countdown, and the canonical captured still.
pub struct CaptureSession {
    negotiator: CaptureNegotiator,
    feed: Option<Box<dyn CameraFeed>>,
    countdown: Option<Countdown>,
    captured_image: Option<String>,
}

impl CaptureSession {
    pub fn new(negotiator: CaptureNegotiator) -> Self {
        Self {
            negotiator,
            feed: None,
            countdown: None,
            captured_image: None,
        }
    }

    pub fn facing(&self) -> Facing {
        self.negotiator.facing()
    }

    pub fn has_feed(&self) -> bool {
        self.feed.is_some()
    }

    pub fn captured_image(&self) -> Option<&str> {
        self.captured_image.as_deref()
    }

    /// Releases any held feed, then re-runs the full negotiation.
    pub fn start_camera(&mut self) -> Result<(), CameraError> {
        self.release_feed();
        let feed = self.negotiator.acquire()?;
        self.feed = Some(feed);
        Ok(())
    }

    /// Toggles the stored facing preference and re-negotiates from the top
    /// of the ladder.
    pub fn switch_camera(&mut self) -> Result<(), CameraError> {
        self.negotiator.toggle_facing();
        self.start_camera()
    }

    /// Synchronously releases the feed and clears any pending countdown.
    pub fn stop_camera(&mut self) {
        self.cancel_countdown();
        self.release_feed();
    }

    pub fn start_countdown(&mut self) {
        self.countdown = Some(Countdown::new(COUNTDOWN_SECONDS));
    }

    pub fn cancel_countdown(&mut self) {
        self.countdown = None;
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.countdown
    }

    /// Advances the live countdown by one second; returns true when it fires
    /// (and clears it).
    pub fn tick_countdown(&mut self) -> bool {
        let Some(countdown) = self.countdown.as_mut() else {
            return false;
        };
        if countdown.tick() {
            self.countdown = None;
            return true;
        }
        false
    }

    /// Grabs one frame, center-crops it to the canonical portrait, stores it
    /// as the session's captured image, and stops the camera.
    pub fn capture_photo(&mut self) -> Result<&str> {
        let feed = self.feed.as_mut().ok_or(CameraError::NotReady)?;
        if feed.dimensions().is_none() {
            return Err(CameraError::NotReady.into());
        }
        let frame = feed.read_frame()?;
        let data_uri = crop_to_portrait_data_uri(&frame)?;
        self.captured_image = Some(data_uri);
        self.stop_camera();
        Ok(self.captured_image.as_deref().unwrap_or_default())
    }

    /// Upload fallback: an already-encoded image replaces the camera path.
    /// The upload is cropped through the same canonical pipeline.
    pub fn accept_upload(&mut self, bytes: &[u8]) -> Result<&str> {
        let data_uri = crop_to_portrait_data_uri(bytes)?;
        self.stop_camera();
        self.captured_image = Some(data_uri);
        Ok(self.captured_image.as_deref().unwrap_or_default())
    }

    pub fn clear_capture(&mut self) {
        self.captured_image = None;
    }

    /// Full reset: feed released, countdown cancelled, capture cleared,
    /// facing back to the session default.
    pub fn reset(&mut self) {
        self.stop_camera();
        self.negotiator.reset_facing();
        self.captured_image = None;
    }

    fn release_feed(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.release();
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release_feed();
    }
}

/// File-backed camera for kiosk sessions without real capture hardware: a
/// still image on disk plays the role of the device, accepted under any
/// constraint profile.
pub struct StillImageBackend {
    path: PathBuf,
}

impl StillImageBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CameraBackend for StillImageBackend {
    fn supported(&self) -> bool {
        self.path.is_file()
    }

    fn open(&mut self, _profile: &ConstraintProfile) -> Result<Box<dyn CameraFeed>> {
        let bytes =
            fs::read(&self.path).with_context(|| format!("failed reading {}", self.path.display()))?;
        let decoded = image::load_from_memory(&bytes)
            .with_context(|| format!("{} is not a decodable image", self.path.display()))?;
        Ok(Box::new(StillImageFeed {
            bytes: Some(bytes),
            dimensions: (decoded.width(), decoded.height()),
        }))
    }
}

struct StillImageFeed {
    bytes: Option<Vec<u8>>,
    dimensions: (u32, u32),
}

impl CameraFeed for StillImageFeed {
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.bytes.as_ref().map(|_| self.dimensions)
    }

    fn read_frame(&mut self) -> Result<Vec<u8>> {
        self.bytes
            .clone()
            .ok_or_else(|| anyhow::anyhow!("feed already released"))
    }

    fn release(&mut self) {
        self.bytes = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::bail;
    use image::{DynamicImage, RgbImage};

    use super::{
        constraint_ladder, CameraBackend, CameraError, CameraFeed, CaptureNegotiator,
        CaptureSession, ConstraintProfile, Facing, COUNTDOWN_SECONDS,
    };

    struct ScriptedFeed {
        dimensions: Option<(u32, u32)>,
        frame: Vec<u8>,
        live: Arc<AtomicUsize>,
        released: bool,
    }

    impl ScriptedFeed {
        fn new(dimensions: Option<(u32, u32)>, frame: Vec<u8>, live: Arc<AtomicUsize>) -> Self {
            live.fetch_add(1, Ordering::SeqCst);
            Self {
                dimensions,
                frame,
                live,
                released: false,
            }
        }
    }

    impl CameraFeed for ScriptedFeed {
        fn dimensions(&self) -> Option<(u32, u32)> {
            self.dimensions
        }

        fn read_frame(&mut self) -> anyhow::Result<Vec<u8>> {
            Ok(self.frame.clone())
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Fails the first `failures` open attempts, then yields feeds.
    struct ScriptedBackend {
        supported: bool,
        failures: usize,
        opened_profiles: Vec<ConstraintProfile>,
        dimensions: Option<(u32, u32)>,
        live: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(failures: usize) -> Self {
            Self {
                supported: true,
                failures,
                opened_profiles: Vec::new(),
                dimensions: Some((640, 480)),
                live: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn frame() -> Vec<u8> {
            let mut out = Vec::new();
            DynamicImage::ImageRgb8(RgbImage::new(64, 48))
                .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)
                .expect("encode test frame");
            out
        }
    }

    impl CameraBackend for ScriptedBackend {
        fn supported(&self) -> bool {
            self.supported
        }

        fn open(&mut self, profile: &ConstraintProfile) -> anyhow::Result<Box<dyn CameraFeed>> {
            self.opened_profiles.push(*profile);
            if self.opened_profiles.len() <= self.failures {
                bail!("permission denied");
            }
            Ok(Box::new(ScriptedFeed::new(
                self.dimensions,
                Self::frame(),
                Arc::clone(&self.live),
            )))
        }
    }

    #[test]
    fn ladder_orders_profiles_as_specified() {
        let ladder = constraint_ladder(Facing::User);
        assert_eq!(ladder[0].facing, Some(Facing::User));
        assert_eq!(ladder[1].facing, Some(Facing::Environment));
        assert_eq!(ladder[2].facing, None);
        assert_eq!(ladder[2].width, Some(720));
        assert_eq!(ladder[3], ConstraintProfile { width: None, height: None, facing: None });
    }

    #[test]
    fn unsupported_platform_short_circuits() {
        let mut backend = ScriptedBackend::new(0);
        backend.supported = false;
        let mut negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User);
        assert_eq!(negotiator.acquire().err(), Some(CameraError::Unavailable));
    }

    #[test]
    fn falls_through_to_third_profile_after_permission_failures() {
        let live = {
            let backend = ScriptedBackend::new(2);
            let live = Arc::clone(&backend.live);
            let mut negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User);
            let mut feed = negotiator.acquire().expect("third profile succeeds");
            assert_eq!(live.load(Ordering::SeqCst), 1);
            feed.release();
            live
        };
        // Profiles 1-2 never produced a stream; the returned one is the only
        // live feed and release drops it to zero.
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_ladder_leaves_no_open_feed() {
        let backend = ScriptedBackend::new(4);
        let live = Arc::clone(&backend.live);
        let mut negotiator = CaptureNegotiator::new(Box::new(backend), Facing::Environment);
        assert_eq!(negotiator.acquire().err(), Some(CameraError::Unavailable));
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn metadata_timeout_still_accepts_the_feed() {
        let mut backend = ScriptedBackend::new(0);
        backend.dimensions = None;
        let mut negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User)
            .with_ready_timeout(Duration::from_millis(10));
        let feed = negotiator.acquire().expect("feed accepted despite timeout");
        assert_eq!(feed.dimensions(), None);
    }

    #[test]
    fn switch_camera_releases_before_reacquiring() {
        let backend = ScriptedBackend::new(0);
        let live = Arc::clone(&backend.live);
        let negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User);
        let mut session = CaptureSession::new(negotiator);

        session.start_camera().expect("camera starts");
        assert_eq!(live.load(Ordering::SeqCst), 1);
        session.switch_camera().expect("switch succeeds");
        assert_eq!(live.load(Ordering::SeqCst), 1);
        assert_eq!(session.facing(), Facing::Environment);
        session.stop_camera();
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn capture_before_metadata_is_not_ready() {
        let mut backend = ScriptedBackend::new(0);
        backend.dimensions = None;
        let negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User)
            .with_ready_timeout(Duration::from_millis(10));
        let mut session = CaptureSession::new(negotiator);
        session.start_camera().expect("camera starts");

        let err = session.capture_photo().expect_err("frame not ready");
        assert_eq!(
            err.downcast_ref::<CameraError>(),
            Some(&CameraError::NotReady)
        );
        assert!(session.has_feed());
    }

    #[test]
    fn capture_stores_canonical_image_and_stops_camera() {
        let backend = ScriptedBackend::new(0);
        let live = Arc::clone(&backend.live);
        let negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User);
        let mut session = CaptureSession::new(negotiator);
        session.start_camera().expect("camera starts");
        session.start_countdown();

        let data_uri = session.capture_photo().expect("capture succeeds").to_string();
        assert!(data_uri.starts_with("data:image/jpeg;base64,"));
        assert!(!session.has_feed());
        assert_eq!(session.countdown(), None);
        assert_eq!(live.load(Ordering::SeqCst), 0);
        assert_eq!(session.captured_image(), Some(data_uri.as_str()));
    }

    #[test]
    fn countdown_ticks_down_and_fires_once() {
        let negotiator = CaptureNegotiator::new(Box::new(ScriptedBackend::new(0)), Facing::User);
        let mut session = CaptureSession::new(negotiator);
        session.start_countdown();
        for _ in 0..COUNTDOWN_SECONDS - 1 {
            assert!(!session.tick_countdown());
        }
        assert!(session.tick_countdown());
        assert_eq!(session.countdown(), None);
        assert!(!session.tick_countdown());
    }

    #[test]
    fn still_image_backend_stands_in_for_the_camera() {
        use super::StillImageBackend;

        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("guest.jpg");
        std::fs::write(&path, ScriptedBackend::frame()).expect("write still");

        let missing = StillImageBackend::new(temp.path().join("absent.jpg"));
        assert!(!missing.supported());
        assert!(CaptureNegotiator::new(Box::new(missing), Facing::User)
            .acquire()
            .is_err());

        let negotiator =
            CaptureNegotiator::new(Box::new(StillImageBackend::new(&path)), Facing::User);
        let mut session = CaptureSession::new(negotiator);
        session.start_camera().expect("still image opens");
        let data_uri = session.capture_photo().expect("capture succeeds");
        assert!(data_uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn reset_clears_capture_and_feed() {
        let backend = ScriptedBackend::new(0);
        let live = Arc::clone(&backend.live);
        let negotiator = CaptureNegotiator::new(Box::new(backend), Facing::User);
        let mut session = CaptureSession::new(negotiator);
        session.start_camera().expect("camera starts");
        session.switch_camera().expect("switch succeeds");
        session.capture_photo().expect("capture succeeds");
        session.reset();
        assert_eq!(session.captured_image(), None);
        assert_eq!(session.facing(), Facing::User);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }
}
