use crate::codec::StreamResult;
use crate::message::Message;
use crate::stream::TextStream;

/// Copy body bytes from the stream into the message until the declared
/// content length is reached. Resumable: each call moves as many bytes
/// as the stream has left.
pub(crate) fn read(message: &mut Message, stream: &mut TextStream) -> StreamResult {
    let target = message.header.generic.content_length.unwrap_or(0);
    let missing = target.saturating_sub(message.body.len());
    let n = missing.min(stream.remaining());

    message.body.extend_from_slice(&stream.rest()[..n]);
    stream.advance(n);

    if message.body.len() < target {
        StreamResult::Truncated
    } else {
        StreamResult::Complete
    }
}

/// Start the body phase of a parse. Without a declared content length
/// there is no body and the phase completes without touching the stream.
pub(crate) fn parse(message: &mut Message, stream: &mut TextStream) -> StreamResult {
    match message.header.generic.content_length {
        Some(length) if length > 0 => {
            message.body.reserve(length);
            read(message, stream)
        }
        _ => StreamResult::Complete,
    }
}

/// Copy body bytes from the message into the stream, `sent` tracking how
/// far previous calls got. Resumable: each call moves as many bytes as
/// the stream has room for.
pub(crate) fn write(message: &Message, sent: &mut usize, stream: &mut TextStream) -> StreamResult {
    let pending = &message.body[*sent..];
    let n = pending.len().min(stream.remaining());

    // Room was checked; the copy cannot overflow.
    let _ = stream.write_bytes(&pending[..n]);
    *sent += n;

    if *sent < message.body.len() {
        StreamResult::Truncated
    } else {
        StreamResult::Complete
    }
}

/// Start the body phase of a generate.
pub(crate) fn generate(
    message: &Message,
    sent: &mut usize,
    stream: &mut TextStream,
) -> StreamResult {
    *sent = 0;
    match message.header.generic.content_length {
        Some(length) if length > 0 => write(message, sent, stream),
        _ => StreamResult::Complete,
    }
}
