//! Fixtures shared by the agent tests: JPEG images, scripted video sources,
//! a wiremock server and log capture.

use crate::error::{AgentError, Result};
use crate::frame_source::VideoSource;
use image::{Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::subscriber::DefaultGuard;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub fn jpeg_fixture(color: [u8; 3]) -> Vec<u8> {
    let image = RgbImage::from_pixel(32, 24, Rgb(color));
    ugv_cam_lib::encode_jpeg(&image, 90).unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Reader yielding preset chunks, optionally stalling before or after them
pub struct ChunkReader {
    chunks: VecDeque<Vec<u8>>,
    lead: Option<Duration>,
    stall: Option<Duration>,
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(lead) = self.lead.take() {
            thread::sleep(lead);
        }
        let Some(mut chunk) = self.chunks.pop_front() else {
            if let Some(stall) = self.stall {
                thread::sleep(stall);
            }
            return Ok(0);
        };

        if chunk.len() > buf.len() {
            let rest = chunk.split_off(buf.len());
            self.chunks.push_front(rest);
        }
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}

/// In-memory `VideoSource` replaying the same chunks on every open
pub struct ScriptedSource {
    chunks: Vec<Vec<u8>>,
    lead: Option<Duration>,
    stall: Option<Duration>,
    opens: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            lead: None,
            stall: None,
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Block for `stall` on the read after the last chunk
    pub fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    /// Block for `lead` on the first read
    pub fn leading(mut self, lead: Duration) -> Self {
        self.lead = Some(lead);
        self
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

impl VideoSource for ScriptedSource {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ChunkReader {
            chunks: self.chunks.iter().cloned().collect(),
            lead: self.lead,
            stall: self.stall,
        }))
    }

    fn describe(&self) -> String {
        "scripted source".to_string()
    }
}

/// Source whose connection always fails
pub struct UnreachableSource;

impl VideoSource for UnreachableSource {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        Err(AgentError::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "camera offline",
        )))
    }
}

/// Source that takes its worker down with it
pub struct PanickingSource;

impl VideoSource for PanickingSource {
    fn open(&self) -> Result<Box<dyn Read + Send>> {
        panic!("camera driver crashed");
    }
}

/// Mock HTTP server driven from synchronous tests.
///
/// The blocking reqwest client must not run inside a tokio context, so the
/// runtime is only entered to mount mocks and read back requests.
pub struct HttpStub {
    server: MockServer,
    runtime: tokio::runtime::Runtime,
}

impl HttpStub {
    pub fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    /// Stub answering every request with `response`
    pub fn serving(response: ResponseTemplate) -> Self {
        let stub = Self::start();
        stub.mount(Mock::given(any()).respond_with(response));
        stub
    }

    pub fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.runtime
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }
}

pub fn json_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "application/json")
}

pub fn mjpeg_response(body: Vec<u8>) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "multipart/x-mixed-replace; boundary=frame")
}

/// Address nothing listens on
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Log output captured from a thread-default subscriber
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Route this thread's logs into a buffer until the guard drops
pub fn capture_logs() -> (DefaultGuard, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}
