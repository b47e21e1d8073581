//! Multipart (`multipart/x-mixed-replace`) framing

use bytes::{BufMut, Bytes, BytesMut};

use crate::buffer::Frame;

/// Boundary token used when none is configured
pub const DEFAULT_BOUNDARY: &str = "frame";

/// `Content-Type` header value for the response
pub fn content_type(boundary: &str) -> String {
    format!("multipart/x-mixed-replace; boundary={boundary}")
}

/// Encode one frame as a multipart part
///
/// ```text
/// --frame\r\n
/// Content-Type: image/jpeg\r\n
/// Content-Length: <n>\r\n
/// \r\n
/// <jpeg bytes>\r\n
/// ```
pub fn encode_part(boundary: &str, frame: &Frame) -> Bytes {
    let header = format!(
        "--{boundary}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        frame.len()
    );

    let mut buf = BytesMut::with_capacity(header.len() + frame.len() + 2);
    buf.put_slice(header.as_bytes());
    buf.put_slice(&frame.data);
    buf.put_slice(b"\r\n");
    buf.freeze()
}
