use crate::body::ResponseBody;
use bytes::BytesMut;
use http::{HeaderMap, Response, StatusCode};
use tracing::warn;

/// Buffers the response of one request until the mux sends it.
///
/// The status line is committed by the first [`write_header`](ResponseWriter::write_header)
/// or [`write`](ResponseWriter::write); later status changes are ignored.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self { status: StatusCode::OK, headers: HeaderMap::new(), body: BytesMut::new(), committed: false }
    }
}

impl ResponseWriter {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            warn!(current = %self.status, ignored = %status, "response already committed");
            return;
        }
        self.status = status;
        self.committed = true;
    }

    /// Appends to the body, committing `200 OK` if no status was written yet.
    pub fn write(&mut self, bytes: &[u8]) {
        if !self.committed {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Discards status, headers and body, leaving the writer uncommitted.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }

    /// Moves the buffered response out, leaving the writer reset.
    pub(crate) fn take(&mut self) -> Response<ResponseBody> {
        let mut response = Response::new(ResponseBody::once(self.body.split().freeze()));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.reset();
        response
    }
}
