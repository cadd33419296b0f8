use std::fmt::Write;
use std::str;

use crate::error::{Error, Result, OVERFLOW};
use crate::message::{RequestId, RequestState, StartLine, StartLineKind, Version};
use crate::stream::TextStream;

// "MRCP/2.0 " precedes the fixed-width message-length field.
const LENGTH_FIELD_OFFSET: usize = 9;

/// Width of the zero-padded message-length field. Ten decimal digits
/// cover any 32-bit message length, so back-patching the real value
/// never shifts the bytes that follow.
const LENGTH_FIELD_WIDTH: usize = 10;

/// Parse one start line. Consumes through the terminating CRLF; when no
/// terminator is in view the stream is consumed to its end and
/// [`Error::UnexpectedEnd`] is returned for the break policy to classify.
pub(crate) fn parse(stream: &mut TextStream) -> Result<StartLine> {
    let line = stream.read_line()?;
    let line = str::from_utf8(line)?;

    let mut tokens = line.split_ascii_whitespace();
    let first = tokens.next().ok_or(Error::StartLine)?;

    let start_line = match Version::from_proto(first) {
        Some(Version::V2) => parse_v2(&mut tokens)?,
        // A line leading with the version token is a v1 response; v1
        // requests and events carry the version as their last token.
        Some(Version::V1) => parse_v1_response(&mut tokens)?,
        None => parse_v1_named(first, &mut tokens)?,
    };

    if tokens.next().is_some() {
        return Err(Error::StartLine);
    }
    Ok(start_line)
}

fn parse_v2<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<StartLine> {
    let length = tokens
        .next()
        .ok_or(Error::StartLine)?
        .parse()
        .map_err(|_| Error::StartLine)?;

    let token = tokens.next().ok_or(Error::StartLine)?;
    if is_numeric(token) {
        // MRCP/2.0 <length> <request-id> <status-code> <request-state>
        let request_id = parse_request_id(token)?;
        let status_code = parse_status_code(tokens.next().ok_or(Error::StartLine)?)?;
        let request_state = RequestState::from_token(tokens.next().ok_or(Error::StartLine)?)?;
        return Ok(StartLine {
            version: Version::V2,
            length,
            request_id,
            kind: StartLineKind::Response {
                status_code,
                request_state,
            },
        });
    }

    // MRCP/2.0 <length> <name> <request-id> [<request-state>]
    let name = token;
    let request_id = parse_request_id(tokens.next().ok_or(Error::StartLine)?)?;
    let kind = match tokens.next() {
        None => StartLineKind::Request {
            method_name: name.to_string(),
            method_id: None,
        },
        Some(state) => StartLineKind::Event {
            event_name: name.to_string(),
            event_id: None,
            request_state: RequestState::from_token(state)?,
        },
    };
    Ok(StartLine {
        version: Version::V2,
        length,
        request_id,
        kind,
    })
}

fn parse_v1_response<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Result<StartLine> {
    // MRCP/1.0 <request-id> <status-code> <request-state>
    let request_id = parse_request_id(tokens.next().ok_or(Error::StartLine)?)?;
    let status_code = parse_status_code(tokens.next().ok_or(Error::StartLine)?)?;
    let request_state = RequestState::from_token(tokens.next().ok_or(Error::StartLine)?)?;
    Ok(StartLine {
        version: Version::V1,
        length: 0,
        request_id,
        kind: StartLineKind::Response {
            status_code,
            request_state,
        },
    })
}

fn parse_v1_named<'a>(name: &str, tokens: &mut impl Iterator<Item = &'a str>) -> Result<StartLine> {
    // <method-name> <request-id> MRCP/1.0
    // <event-name> <request-id> <request-state> MRCP/1.0
    let request_id = parse_request_id(tokens.next().ok_or(Error::StartLine)?)?;
    let token = tokens.next().ok_or(Error::StartLine)?;
    let kind = match Version::from_proto(token) {
        Some(Version::V1) => StartLineKind::Request {
            method_name: name.to_string(),
            method_id: None,
        },
        Some(Version::V2) => return Err(Error::Version),
        None => {
            let request_state = RequestState::from_token(token)?;
            let trailer = tokens.next().ok_or(Error::StartLine)?;
            if Version::from_proto(trailer) != Some(Version::V1) {
                return Err(Error::Version);
            }
            StartLineKind::Event {
                event_name: name.to_string(),
                event_id: None,
                request_state,
            }
        }
    };
    Ok(StartLine {
        version: Version::V1,
        length: 0,
        request_id,
        kind,
    })
}

/// Serialize a start line. The V2 message-length field is written as
/// zeros and patched by [`finalize`] once the real length is known.
pub(crate) fn generate(start_line: &StartLine, stream: &mut TextStream) -> Result<()> {
    let request_id = start_line.request_id;
    let mut w = stream.writer();
    match start_line.version {
        Version::V2 => {
            write!(w, "MRCP/2.0 {:0width$} ", 0, width = LENGTH_FIELD_WIDTH).or(OVERFLOW)?;
            match &start_line.kind {
                StartLineKind::Request { method_name, .. } => {
                    write!(w, "{} {}\r\n", method_name, request_id)
                }
                StartLineKind::Response {
                    status_code,
                    request_state,
                } => write!(
                    w,
                    "{} {} {}\r\n",
                    request_id,
                    status_code,
                    request_state.as_str()
                ),
                StartLineKind::Event {
                    event_name,
                    request_state,
                    ..
                } => write!(
                    w,
                    "{} {} {}\r\n",
                    event_name,
                    request_id,
                    request_state.as_str()
                ),
            }
            .or(OVERFLOW)
        }
        Version::V1 => match &start_line.kind {
            StartLineKind::Request { method_name, .. } => {
                write!(w, "{} {} MRCP/1.0\r\n", method_name, request_id).or(OVERFLOW)
            }
            StartLineKind::Response {
                status_code,
                request_state,
            } => write!(
                w,
                "MRCP/1.0 {} {} {}\r\n",
                request_id,
                status_code,
                request_state.as_str()
            )
            .or(OVERFLOW),
            StartLineKind::Event {
                event_name,
                request_state,
                ..
            } => write!(
                w,
                "{} {} {} MRCP/1.0\r\n",
                event_name,
                request_id,
                request_state.as_str()
            )
            .or(OVERFLOW),
        },
    }
}

/// Patch the message-length field of an already-written V2 start line
/// with the total message length: everything from the start of the line
/// through the end of the body. `line_start` is the stream offset the
/// line was written at; the header section must be fully written, the
/// body not yet.
pub(crate) fn finalize(
    start_line: &mut StartLine,
    line_start: usize,
    body_len: usize,
    stream: &mut TextStream,
) -> Result<()> {
    if start_line.version != Version::V2 {
        return Ok(());
    }
    let total = stream.pos() - line_start + body_len;
    let field = format!("{:0width$}", total, width = LENGTH_FIELD_WIDTH);
    if field.len() != LENGTH_FIELD_WIDTH {
        return Err(Error::StartLine);
    }
    start_line.length = total;
    stream.patch(line_start + LENGTH_FIELD_OFFSET, field.as_bytes());
    Ok(())
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn parse_request_id(token: &str) -> Result<RequestId> {
    token.parse().map_err(|_| Error::RequestId)
}

fn parse_status_code(token: &str) -> Result<u16> {
    token.parse().map_err(|_| Error::StatusCode)
}
