//! Incremental splitter for motion-JPEG byte streams.
//!
//! The camera serves concatenated JPEG images. Multipart boundaries and
//! headers between images are skipped since only the bytes from a start
//! marker through the next end marker are kept.

use tracing::warn;
use ugv_cam_lib::{JPEG_EOI, JPEG_SOI};

pub const DEFAULT_MAX_BUFFER_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug)]
pub struct MjpegParser {
    buffer: Vec<u8>,
    max_buffer_bytes: usize,
    overflows: u64,
}

impl Default for MjpegParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUFFER_BYTES)
    }
}

impl MjpegParser {
    pub fn new(max_buffer_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_buffer_bytes,
            overflows: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete `FF D8 .. FF D9` image, if one is buffered
    pub fn next_image(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find_marker(&self.buffer, &JPEG_SOI, 0) else {
            // Keep a trailing 0xFF, it may be the first half of a start marker
            let keep = usize::from(self.buffer.last() == Some(&JPEG_SOI[0]));
            let len = self.buffer.len();
            self.buffer.drain(..len - keep);
            return None;
        };
        self.buffer.drain(..start);

        if let Some(end) = find_marker(&self.buffer, &JPEG_EOI, JPEG_SOI.len()) {
            return Some(self.buffer.drain(..end + JPEG_EOI.len()).collect());
        }

        if self.buffer.len() > self.max_buffer_bytes {
            warn!(
                "MJPEG buffer exceeded {} bytes without an end marker, dropping partial image",
                self.max_buffer_bytes
            );
            self.buffer.clear();
            self.overflows += 1;
        }

        None
    }

    /// Bytes currently held for an incomplete image
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(marker.len())
        .position(|window| window == marker)
        .map(|position| position + from)
}
