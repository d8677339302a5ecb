//! Splits a raw MJPEG byte stream into individual JPEG images.
//!
//! rpicam-vid writes concatenated JPEGs with no container. Each image starts
//! with an SOI marker and ends with an EOI marker; entropy-coded data never
//! contains an unescaped `FF D9`, so scanning for markers is enough.

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Upper bound on buffered bytes while waiting for an end marker
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Incremental JPEG frame splitter
#[derive(Debug)]
pub struct JpegSplitter {
    buf: Vec<u8>,
    /// Offset the end marker search resumes from; earlier bytes of the
    /// buffered frame are known not to hold one
    scanned: usize,
    max_frame_bytes: usize,
}

impl Default for JpegSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl JpegSplitter {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_frame_bytes,
        }
    }

    /// Append bytes read from the stream
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes buffered and not yet returned
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Take the next complete frame, if one is buffered.
    ///
    /// Bytes before the first start marker are discarded. A partial frame
    /// that grows past the size limit is dropped so a corrupt stream cannot
    /// grow the buffer without bound.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = match find(&self.buf, &SOI, 0) {
            Some(start) => start,
            None => {
                // keep a trailing 0xFF, it may be the first half of a marker
                let keep = usize::from(self.buf.last() == Some(&0xFF));
                self.buf.drain(..self.buf.len() - keep);
                self.scanned = 0;
                return None;
            }
        };
        if start > 0 {
            self.buf.drain(..start);
            self.scanned = 0;
        }

        match find(&self.buf, &EOI, self.scanned.max(SOI.len())) {
            Some(end) => {
                let frame: Vec<u8> = self.buf.drain(..end + EOI.len()).collect();
                self.scanned = 0;
                Some(frame)
            }
            None => {
                if self.buf.len() > self.max_frame_bytes {
                    self.buf.clear();
                    self.scanned = 0;
                } else {
                    // the last byte may be the first half of an end marker
                    self.scanned = self.buf.len().saturating_sub(1);
                }
                None
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}
