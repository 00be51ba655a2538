use bytes::Bytes;
use rand::Rng;

/// multipart/form-data framing for a single file part.
///
/// The part is named `file`, carries the segment's base name, and is typed
/// `application/octet-stream`. Total content length is exact and known before
/// any bytes are sent, as required for a fixed `Content-Length` header.
#[derive(Debug, Clone)]
pub struct MultipartEncoding {
    boundary: String,
    prologue: Bytes,
    epilogue: Bytes,
}

impl MultipartEncoding {
    pub fn for_file(file_name: &str) -> Self {
        let boundary = format!(
            "----ClipRelayBoundary{}",
            rand::thread_rng().gen_range(10000..100000)
        );
        Self::with_boundary(file_name, boundary)
    }

    /// Fixed-boundary constructor for deterministic tests.
    pub fn with_boundary(file_name: &str, boundary: String) -> Self {
        let prologue = format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        );
        let epilogue = format!("\r\n--{boundary}--\r\n");
        Self {
            boundary,
            prologue: Bytes::from(prologue),
            epilogue: Bytes::from(epilogue),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn prologue(&self) -> &[u8] {
        &self.prologue
    }

    pub fn epilogue(&self) -> &[u8] {
        &self.epilogue
    }

    /// Exact body length for a file of `file_len` bytes.
    pub fn content_length(&self, file_len: u64) -> u64 {
        self.prologue.len() as u64 + file_len + self.epilogue.len() as u64
    }
}
