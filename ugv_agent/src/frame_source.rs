//! Background camera acquisition with a latest-value frame slot.
//!
//! One worker thread per running source reads the MJPEG stream, decodes
//! complete images and replaces the slot contents. Readers clone the slot
//! and never wait on the stream.

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::mjpeg::MjpegParser;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use ugv_cam_lib::{decode_jpeg, Frame};

const CONNECTION_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Anything that can be opened as a continuous MJPEG byte stream
pub trait VideoSource: Send + Sync {
    fn open(&self) -> Result<Box<dyn Read + Send>>;

    /// Human-readable name for logs
    fn describe(&self) -> String {
        "video source".to_string()
    }
}

/// MJPEG over HTTP GET, as served by the TimerCam
pub struct HttpVideoSource {
    client: reqwest::blocking::Client,
    url: String,
    connect_timeout: Duration,
}

impl HttpVideoSource {
    /// No whole-request timeout: the response body is the endless stream
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| AgentError::from_reqwest(&url, connect_timeout, e))?;

        Ok(Self {
            client,
            url,
            connect_timeout,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(config.stream_url(), config.stream_connect_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl VideoSource for HttpVideoSource {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| AgentError::from_reqwest(&self.url, self.connect_timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(Box::new(response))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceStatus {
    /// Not started, or stopped
    Idle,
    Connecting,
    Connected,
    /// Connection failed or the stream ended
    Disconnected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameSourceStats {
    pub frames_decoded: u64,
    /// Complete images that failed to decode
    pub frames_dropped: u64,
    pub bytes_read: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSourceSettings {
    pub chunk_size: usize,
    pub max_buffer_bytes: usize,
    pub stop_timeout: Duration,
}

impl Default for FrameSourceSettings {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

impl From<&AgentConfig> for FrameSourceSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            max_buffer_bytes: config.max_buffer_bytes,
            stop_timeout: config.stop_timeout(),
        }
    }
}

/// State touched by both the worker and readers
struct Shared {
    slot: Mutex<Option<Frame>>,
    status: Mutex<SourceStatus>,
    frames_decoded: AtomicU64,
    frames_dropped: AtomicU64,
    bytes_read: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: Arc<AtomicBool>,
    // Disconnects when the worker thread exits
    done: flume::Receiver<()>,
}

pub struct FrameSource {
    source: Arc<dyn VideoSource>,
    settings: FrameSourceSettings,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl FrameSource {
    pub fn new(source: impl VideoSource + 'static, settings: FrameSourceSettings) -> Self {
        Self {
            source: Arc::new(source),
            settings,
            shared: Arc::new(Shared {
                slot: Mutex::new(None),
                status: Mutex::new(SourceStatus::Idle),
                frames_decoded: AtomicU64::new(0),
                frames_dropped: AtomicU64::new(0),
                bytes_read: AtomicU64::new(0),
            }),
            worker: None,
        }
    }

    /// Source reading `config.stream_url()`
    pub fn http(config: &AgentConfig) -> Result<Self> {
        Ok(Self::new(
            HttpVideoSource::from_config(config)?,
            FrameSourceSettings::from(config),
        ))
    }

    /// Launch the acquisition worker. No-op while a worker is running.
    pub fn start(&mut self) -> Result<()> {
        if let Some(worker) = &self.worker {
            if !worker.handle.is_finished() {
                warn!("Frame source for {} is already running", self.source.describe());
                return Ok(());
            }
        }
        if let Some(finished) = self.worker.take() {
            if finished.handle.join().is_err() {
                warn!("Previous frame source worker panicked");
            }
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = flume::bounded::<()>(1);
        *lock(&self.shared.status) = SourceStatus::Connecting;

        let acquisition = Acquisition {
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            cancel: Arc::clone(&cancel),
            settings: self.settings,
        };

        // The worker logs through the subscriber active where it was started
        let dispatch = tracing::dispatcher::get_default(|current| current.clone());

        let spawned = thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || {
                let _done = done_tx;
                tracing::dispatcher::with_default(&dispatch, || acquisition.run());
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                *lock(&self.shared.status) = SourceStatus::Disconnected;
                return Err(AgentError::Io(e));
            }
        };

        info!("Started video acquisition from {}", self.source.describe());
        self.worker = Some(Worker {
            handle,
            cancel,
            done: done_rx,
        });
        Ok(())
    }

    /// Cancel the worker and wait up to the stop timeout for it to exit.
    /// A worker stuck in a blocking read is detached.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        worker.cancel.store(true, Ordering::Release);

        match worker.done.recv_timeout(self.settings.stop_timeout) {
            Ok(()) | Err(flume::RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    warn!("Frame source worker panicked");
                }
            }
            Err(flume::RecvTimeoutError::Timeout) => {
                warn!(
                    "Frame source worker did not stop within {:?}, detaching it",
                    self.settings.stop_timeout
                );
            }
        }

        *lock(&self.shared.status) = SourceStatus::Idle;
        info!("Stopped video acquisition");
    }

    /// Most recent decoded frame. Never blocks on the stream.
    pub fn latest_frame(&self) -> Option<Frame> {
        lock(&self.shared.slot).clone()
    }

    pub fn status(&self) -> SourceStatus {
        *lock(&self.shared.status)
    }

    pub fn is_connected(&self) -> bool {
        self.status() == SourceStatus::Connected
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Wait until the connection attempt settles, at most `timeout`.
    /// Returns whether the source is connected.
    pub fn wait_for_connection(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            let status = self.status();
            if status != SourceStatus::Connecting {
                return status == SourceStatus::Connected;
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return false;
            }
            thread::sleep(CONNECTION_POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    pub fn stats(&self) -> FrameSourceStats {
        FrameSourceStats {
            frames_decoded: self.shared.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.shared.frames_dropped.load(Ordering::Relaxed),
            bytes_read: self.shared.bytes_read.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything one worker run needs, moved onto its thread
struct Acquisition {
    source: Arc<dyn VideoSource>,
    shared: Arc<Shared>,
    cancel: Arc<AtomicBool>,
    settings: FrameSourceSettings,
}

impl Acquisition {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    // A cancelled run may outlive stop() and overlap a restart, so it
    // leaves shared state alone
    fn set_status(&self, status: SourceStatus) {
        let mut current = lock(&self.shared.status);
        if !self.cancelled() {
            *current = status;
        }
    }

    fn publish(&self, frame: Frame) {
        let mut slot = lock(&self.shared.slot);
        if !self.cancelled() {
            // Drain then insert: only the newest frame is ever held
            slot.take();
            *slot = Some(frame);
        }
    }

    fn run(&self) {
        let describe = self.source.describe();

        let mut reader = match self.source.open() {
            Ok(reader) => reader,
            Err(e) => {
                warn!("Failed to open video stream at {}: {}", describe, e);
                self.set_status(SourceStatus::Disconnected);
                return;
            }
        };

        self.set_status(SourceStatus::Connected);
        info!("Connected to video stream at {}", describe);

        let mut parser = MjpegParser::new(self.settings.max_buffer_bytes);
        let mut chunk = vec![0u8; self.settings.chunk_size.max(1)];

        while !self.cancelled() {
            let n = match reader.read(&mut chunk) {
                Ok(0) => {
                    info!("Video stream at {} ended", describe);
                    break;
                }
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Video stream read failed: {}", e);
                    break;
                }
            };

            // Counters belong to whichever run is current
            if self.cancelled() {
                break;
            }
            self.shared.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
            parser.push(&chunk[..n]);

            while let Some(jpeg) = parser.next_image() {
                if self.cancelled() {
                    break;
                }
                match decode_frame(&jpeg) {
                    Ok(image) => {
                        let frame_id = self.shared.frames_decoded.fetch_add(1, Ordering::Relaxed) + 1;
                        debug!("Frame {} decoded ({}x{})", frame_id, image.width(), image.height());
                        self.publish(Frame::new(frame_id, image));
                    }
                    Err(e) => {
                        self.shared.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        debug!("Dropping frame: {}", e);
                    }
                }
            }
        }

        self.set_status(SourceStatus::Disconnected);
    }
}

fn decode_frame(jpeg: &[u8]) -> Result<image::RgbImage> {
    decode_jpeg(jpeg).map_err(AgentError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn settings() -> FrameSourceSettings {
        FrameSourceSettings {
            chunk_size: 64,
            max_buffer_bytes: 1024 * 1024,
            stop_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_no_frame_before_start() {
        let source = FrameSource::new(ScriptedSource::new(vec![jpeg_fixture([0, 0, 255])]), settings());

        assert!(source.latest_frame().is_none());
        assert_eq!(source.status(), SourceStatus::Idle);
        assert!(!source.wait_for_connection(Duration::from_millis(50)));
        assert_eq!(source.stats(), FrameSourceStats::default());
    }

    #[test]
    fn test_latest_frame_is_sticky() {
        let red = jpeg_fixture([255, 0, 0]);
        let green = jpeg_fixture([0, 255, 0]);
        let mut source = FrameSource::new(ScriptedSource::new(vec![red, green]), settings());

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || source.status() == SourceStatus::Disconnected));

        let stats = source.stats();
        assert_eq!(stats.frames_decoded, 2);
        assert_eq!(stats.frames_dropped, 0);

        // Stream ended, the last frame stays readable
        for _ in 0..3 {
            let frame = source.latest_frame().unwrap();
            assert_eq!(frame.frame_id, 2);
            assert_eq!((frame.width(), frame.height()), (32, 24));
            let pixel = frame.image.get_pixel(16, 12);
            assert!(pixel[1] > 150 && pixel[0] < 100, "unexpected pixel {:?}", pixel);
        }

        source.stop();
        assert_eq!(source.status(), SourceStatus::Idle);
        assert!(source.latest_frame().is_some());
    }

    #[test]
    fn test_unreachable_source_disconnects() {
        let mut source = FrameSource::new(UnreachableSource, settings());

        source.start().unwrap();
        assert!(!source.wait_for_connection(Duration::from_secs(5)));
        assert_eq!(source.status(), SourceStatus::Disconnected);
        assert!(source.latest_frame().is_none());
    }

    #[test]
    fn test_corrupt_frame_dropped() {
        let corrupt = vec![0xFF, 0xD8, 0x00, 0x01, 0x02, 0xFF, 0xD9];
        let mut stream = b"--frame\r\n\r\n".to_vec();
        stream.extend_from_slice(&corrupt);
        stream.extend_from_slice(b"\r\n--frame\r\n\r\n");
        stream.extend_from_slice(&jpeg_fixture([0, 0, 255]));

        let scripted = ScriptedSource::new(vec![stream.clone()]);
        let mut source = FrameSource::new(scripted, settings());

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || source.status() == SourceStatus::Disconnected));

        let stats = source.stats();
        assert_eq!(stats.frames_dropped, 1);
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.bytes_read, stream.len() as u64);
        assert_eq!(source.latest_frame().unwrap().frame_id, 1);
    }

    #[test]
    fn test_start_is_idempotent_and_restartable() {
        let scripted = ScriptedSource::new(vec![jpeg_fixture([9, 9, 9])])
            .stalling(Duration::from_millis(300));
        let opens = scripted.opens();
        let mut source = FrameSource::new(scripted, settings());

        source.start().unwrap();
        source.start().unwrap();
        assert!(source.wait_for_connection(Duration::from_secs(5)));
        assert!(source.is_connected());
        assert_eq!(opens.load(Ordering::SeqCst), 1);

        source.stop();
        source.stop();
        assert!(!source.is_running());

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || source.stats().frames_decoded == 2));
        assert_eq!(opens.load(Ordering::SeqCst), 2);
        assert_eq!(source.latest_frame().unwrap().frame_id, 2);
    }

    #[test]
    fn test_stop_is_bounded_with_blocked_reader() {
        let scripted = ScriptedSource::new(vec![jpeg_fixture([1, 2, 3])])
            .stalling(Duration::from_secs(3));
        let mut source = FrameSource::new(
            scripted,
            FrameSourceSettings {
                stop_timeout: Duration::from_millis(100),
                ..settings()
            },
        );

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || source.latest_frame().is_some()));

        let start = Instant::now();
        source.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(source.status(), SourceStatus::Idle);
        assert!(source.latest_frame().is_some());
    }

    #[test]
    fn test_worker_logs_reach_caller_subscriber() {
        let (_guard, logs) = capture_logs();
        let mut source = FrameSource::new(UnreachableSource, settings());

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || source.status() == SourceStatus::Disconnected));

        let output = logs.contents();
        assert!(output.contains("Failed to open video stream"), "{}", output);
        assert!(output.contains("camera offline"), "{}", output);
    }

    #[test]
    fn test_detached_worker_does_not_touch_stats() {
        let jpeg = jpeg_fixture([40, 40, 200]);
        let scripted = ScriptedSource::new(vec![jpeg.clone()]).leading(Duration::from_millis(300));
        let mut source = FrameSource::new(
            scripted,
            FrameSourceSettings {
                stop_timeout: Duration::from_millis(50),
                ..settings()
            },
        );

        source.start().unwrap();
        assert!(source.wait_for_connection(Duration::from_secs(5)));
        // The first run is still waiting on its first read and gets detached
        source.stop();
        source.start().unwrap();

        assert!(wait_until(Duration::from_secs(5), || source.status() == SourceStatus::Disconnected));
        // Give the detached run time to wake up and bail out
        std::thread::sleep(Duration::from_millis(300));

        let stats = source.stats();
        assert_eq!(stats.frames_decoded, 1);
        assert_eq!(stats.bytes_read, jpeg.len() as u64);
        assert_eq!(source.latest_frame().unwrap().frame_id, 1);
    }

    #[test]
    fn test_restart_after_worker_panic() {
        let (_guard, logs) = capture_logs();
        let mut source = FrameSource::new(PanickingSource, settings());

        source.start().unwrap();
        assert!(wait_until(Duration::from_secs(5), || !source.is_running()));

        source.start().unwrap();
        let output = logs.contents();
        assert!(output.contains("Previous frame source worker panicked"), "{}", output);
    }

    #[test]
    fn test_http_stream() {
        let mut body = Vec::new();
        for color in [[255, 0, 0], [0, 0, 255]] {
            body.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
            body.extend_from_slice(&jpeg_fixture(color));
            body.extend_from_slice(b"\r\n");
        }
        let server = HttpStub::start();
        server.mount(Mock::given(method("GET")).and(path("/stream")).respond_with(mjpeg_response(body)));

        let config = AgentConfig::new(refused_url(), server.url());
        let mut source = FrameSource::http(&config).unwrap();
        source.start().unwrap();

        assert!(wait_until(Duration::from_secs(5), || source.stats().frames_decoded == 2));
        let frame = source.latest_frame().unwrap();
        assert_eq!(frame.frame_id, 2);
        assert!(frame.image.get_pixel(16, 12)[2] > 150);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url.path(), "/stream");
    }

    #[test]
    fn test_http_stream_error_status() {
        let server = HttpStub::serving(ResponseTemplate::new(404));
        let config = AgentConfig::new(refused_url(), server.url());
        let mut source = FrameSource::http(&config).unwrap();

        source.start().unwrap();
        assert!(!source.wait_for_connection(Duration::from_secs(5)));
        assert_eq!(source.status(), SourceStatus::Disconnected);
    }
}
