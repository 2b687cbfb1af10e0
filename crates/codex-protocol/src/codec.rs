use std::io::{Read, Write};

use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{Request, Response, MAX_REQUEST_SIZE};

/// JSON codec for the stdio protocol: one request document in, one
/// response document out. Whitespace and newlines are insignificant.
pub struct JsonCodec;

impl JsonCodec {
    /// Read the whole input stream and decode a single request.
    pub fn read_request<R: Read>(reader: R) -> ProtocolResult<Request> {
        let mut buf = Vec::new();
        reader
            .take(MAX_REQUEST_SIZE as u64 + 1)
            .read_to_end(&mut buf)?;
        if buf.len() > MAX_REQUEST_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                max: MAX_REQUEST_SIZE,
            });
        }
        Self::decode_request(&buf)
    }

    pub fn decode_request(data: &[u8]) -> ProtocolResult<Request> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::MalformedRequest("empty request".into()));
        }
        let request: Request = serde_json::from_slice(data)
            .map_err(|e| ProtocolError::MalformedRequest(e.to_string()))?;
        debug!(command = %request.command, "request decoded");
        Ok(request)
    }

    /// Encode a request (orchestrator side).
    pub fn encode_request(request: &Request) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(request).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Write a single response followed by a newline and flush.
    pub fn write_response<W: Write>(mut writer: W, response: &Response) -> ProtocolResult<()> {
        serde_json::to_writer(&mut writer, response)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Decode a response (orchestrator side).
    pub fn decode_response(data: &[u8]) -> ProtocolResult<Response> {
        serde_json::from_slice(data).map_err(|e| ProtocolError::MalformedRequest(e.to_string()))
    }
}
