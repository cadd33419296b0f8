use log::{debug, warn};

use crate::body;
use crate::channel_id;
use crate::header;
use crate::message::{Message, Version};
use crate::resource::ResourceFactory;
use crate::start_line;
use crate::stream::TextStream;

/// Outcome of one [`Parser::run`] or [`Generator::run`] call. The three
/// variants are exhaustive: a whole message moved, the stream ran out
/// mid-message, or the message cannot be parsed/serialized at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamResult {
    /// A whole message was parsed or emitted.
    Complete,
    /// Ran out of input or output bytes mid-message. Feed more bytes
    /// (parse) or supply more room (generate) and call `run` again.
    Truncated,
    /// The input does not form a valid message, the named resource is
    /// unknown, or validation failed.
    Invalid,
}

/// Progress of the in-flight message. Truncation before the body phase
/// restarts the message from scratch on the next run; truncation inside
/// the body resumes the transfer alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initial,
    Body,
}

/// Incremental parser turning a byte stream into [`Message`]s.
///
/// One parser owns one direction of one connection. Bytes may arrive in
/// arbitrarily sized chunks; whenever `run` returns
/// [`StreamResult::Truncated`] the caller scrolls the stream, feeds more
/// bytes and runs again.
pub struct Parser<'a> {
    factory: &'a ResourceFactory,
    resource_name: Option<String>,
    phase: Phase,
    last: StreamResult,
    checkpoint: usize,
    message: Option<Message>,
}

impl<'a> Parser<'a> {
    /// New parser resolving resources against `factory`.
    pub fn new(factory: &'a ResourceFactory) -> Parser<'a> {
        Parser {
            factory,
            resource_name: None,
            phase: Phase::Initial,
            last: StreamResult::Invalid,
            checkpoint: 0,
            message: None,
        }
    }

    /// Preset the resource name for V1 parsing, where the wire carries no
    /// channel identifier. Must be set before the first `run`.
    pub fn resource_name_set(&mut self, resource_name: impl Into<String>) {
        self.resource_name = Some(resource_name.into());
    }

    /// The message the last `run` worked on: complete after
    /// [`StreamResult::Complete`], partially filled after a mid-body
    /// truncation, `None` otherwise.
    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    /// Hand out the parsed message after a [`StreamResult::Complete`]
    /// run.
    pub fn take_message(&mut self) -> Option<Message> {
        if self.last == StreamResult::Complete {
            self.message.take()
        } else {
            None
        }
    }

    /// Consume as much of the stream as needed to produce one message.
    ///
    /// On a mid-header truncation the cursor is rewound to where the
    /// message started, so the caller can scroll the stream, append more
    /// bytes and retry from scratch; on a mid-body truncation the
    /// partially filled message is retained and the next `run` resumes
    /// the body transfer alone.
    pub fn run(&mut self, stream: &mut TextStream) -> StreamResult {
        if self.phase == Phase::Body {
            // Continuation data for a partially filled body.
            if let Some(message) = self.message.as_mut() {
                self.last = body::read(message, stream);
                if self.last == StreamResult::Complete {
                    self.phase = Phase::Initial;
                }
                return self.last;
            }
            self.phase = Phase::Initial;
        }

        self.message = None;
        self.checkpoint = stream.pos();

        let start_line = match start_line::parse(stream) {
            Ok(start_line) => start_line,
            Err(_) => return self.stream_break(stream),
        };
        let mut message = Message::new(start_line);
        if let Some(resource_name) = &self.resource_name {
            message.channel_id.resource_name = resource_name.clone();
        }

        if message.start_line.version == Version::V2 {
            match channel_id::parse(stream) {
                Ok(channel_id) => message.channel_id = channel_id,
                Err(_) => return self.stream_break(stream),
            }
        }

        if self.factory.resourcify_by_name(&mut message).is_err() {
            // Structural failure, not stream exhaustion: no rewind.
            self.last = StreamResult::Invalid;
            return self.last;
        }

        if header::parse(&mut message.header, stream).is_err() {
            return self.stream_break(stream);
        }

        self.last = body::parse(&mut message, stream);
        if self.last == StreamResult::Truncated {
            self.phase = Phase::Body;
        }
        self.message = Some(message);
        self.last
    }

    /// Failed to parse a start line, channel identifier or header. At the
    /// end of the stream this is genuine truncation: rewind to the
    /// checkpoint and let the caller retry with more bytes. Mid-buffer it
    /// is malformed input.
    fn stream_break(&mut self, stream: &mut TextStream) -> StreamResult {
        self.last = if stream.is_at_end() {
            stream.set_pos(self.checkpoint);
            StreamResult::Truncated
        } else {
            StreamResult::Invalid
        };
        self.message = None;
        self.last
    }
}

/// Incremental generator serializing a [`Message`] into caller-provided
/// buffers that may be too small to hold the whole message.
pub struct Generator<'a> {
    factory: &'a ResourceFactory,
    phase: Phase,
    last: StreamResult,
    checkpoint: usize,
    message: Option<Message>,
    body_sent: usize,
}

impl<'a> Generator<'a> {
    /// New generator resolving resources against `factory`.
    pub fn new(factory: &'a ResourceFactory) -> Generator<'a> {
        Generator {
            factory,
            phase: Phase::Initial,
            last: StreamResult::Invalid,
            checkpoint: 0,
            message: None,
            body_sent: 0,
        }
    }

    /// Set the message to serialize. Resets any in-flight progress.
    pub fn message_set(&mut self, message: Message) {
        self.message = Some(message);
        self.phase = Phase::Initial;
        self.body_sent = 0;
    }

    /// Serialize into the stream, as far as it has room.
    ///
    /// Without room for the start line, channel identifier and headers
    /// nothing is kept: the cursor is rewound and the next `run` starts
    /// the message over, so the caller should supply a larger or emptier
    /// buffer. Once the body phase is reached, each `run` drains as many
    /// body bytes as fit and resumes where it left off.
    pub fn run(&mut self, stream: &mut TextStream) -> StreamResult {
        let Some(mut message) = self.message.take() else {
            self.last = StreamResult::Invalid;
            return self.last;
        };
        let result = self.generate(&mut message, stream);
        self.message = Some(message);
        self.last = result;
        self.last
    }

    fn generate(&mut self, message: &mut Message, stream: &mut TextStream) -> StreamResult {
        if self.phase == Phase::Body {
            // Continuation of a partially written body.
            let result = body::write(message, &mut self.body_sent, stream);
            if result == StreamResult::Complete {
                self.phase = Phase::Initial;
            }
            return result;
        }

        if self.factory.resourcify_by_id(message).is_err() {
            return StreamResult::Invalid;
        }
        if message.validate().is_err() {
            return StreamResult::Invalid;
        }

        self.checkpoint = stream.pos();

        if start_line::generate(&message.start_line, stream).is_err() {
            return self.stream_break(stream);
        }
        if message.start_line.version == Version::V2
            && channel_id::generate(&message.channel_id, stream).is_err()
        {
            return self.stream_break(stream);
        }
        if header::generate(&message.header, stream).is_err() {
            return self.stream_break(stream);
        }

        // The header section is in place; patch the real message length
        // into the start line before the body goes out.
        let body_len = message.body.len();
        if start_line::finalize(&mut message.start_line, self.checkpoint, body_len, stream).is_err()
        {
            return StreamResult::Invalid;
        }

        let result = body::generate(message, &mut self.body_sent, stream);
        if result == StreamResult::Truncated {
            self.phase = Phase::Body;
        }
        result
    }

    fn stream_break(&mut self, stream: &mut TextStream) -> StreamResult {
        if stream.is_at_end() {
            stream.set_pos(self.checkpoint);
            StreamResult::Truncated
        } else {
            StreamResult::Invalid
        }
    }
}

/// Drive `parser` over the stream, invoking `handler` once per outcome,
/// [`StreamResult::Invalid`] included. Complete messages pipeline until
/// the stream drains; on truncation the walk stops so the caller can
/// feed more bytes. Afterwards the stream is scrolled (tail kept) or
/// reset, ready for [`TextStream::fill`].
///
/// Returns false if the handler aborted the walk.
pub fn stream_walk<H>(parser: &mut Parser, stream: &mut TextStream, mut handler: H) -> bool
where
    H: FnMut(Option<&Message>, StreamResult) -> bool,
{
    let mut result;
    loop {
        result = parser.run(stream);
        match result {
            StreamResult::Complete => debug!("parsed mrcp message [{}]", stream.pos()),
            StreamResult::Truncated => debug!("truncated mrcp message [{}]", stream.pos()),
            StreamResult::Invalid => warn!("failed to parse mrcp message"),
        }

        if !handler(parser.message(), result) {
            return false;
        }
        if stream.is_at_end() || result == StreamResult::Truncated {
            break;
        }
    }

    // Prepare the stream for further input.
    if result == StreamResult::Truncated {
        if stream.scroll() {
            debug!("scroll mrcp stream [{}]", stream.pos());
        } else {
            stream.reset();
        }
    } else {
        stream.reset();
    }
    true
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::message::StartLineKind;

    const SPEAK_WIRE: &[u8] = b"MRCP/2.0 0000000092 SPEAK 1\r\n\
        Channel-Identifier: abc@speechsynth\r\n\
        Content-Length: 5\r\n\
        \r\n\
        hello";

    const STOP_WIRE: &[u8] = b"MRCP/2.0 0000000067 STOP 2\r\n\
        Channel-Identifier: abc@speechsynth\r\n\
        \r\n";

    fn parse_all(factory: &ResourceFactory, wire: &[u8]) -> Message {
        let mut buf = wire.to_vec();
        let mut stream = TextStream::new(&mut buf);
        let mut parser = Parser::new(factory);
        assert_eq!(parser.run(&mut stream), StreamResult::Complete);
        assert!(stream.is_at_end());
        parser.take_message().unwrap()
    }

    fn speak_message() -> Message {
        let mut message = Message::request(Version::V2, "SPEAK", 1);
        message.set_channel_id("abc", "speechsynth");
        message.set_body(&b"hello"[..]);
        message
    }

    #[test]
    fn test_parse_v2_request() {
        let factory = ResourceFactory::with_default_resources();
        let message = parse_all(&factory, SPEAK_WIRE);

        assert_eq!(message.method_name(), Some("SPEAK"));
        assert_eq!(message.request_id(), 1);
        assert_eq!(message.start_line.length, 92);
        assert_eq!(message.channel_id.session_id, "abc");
        assert_eq!(message.channel_id.resource_name, "speechsynth");
        assert_eq!(message.header.generic.content_length, Some(5));
        assert_eq!(message.body, b"hello");
        assert_eq!(
            message.start_line.kind,
            StartLineKind::Request {
                method_name: "SPEAK".to_string(),
                method_id: Some(2),
            }
        );
    }

    #[test]
    fn test_generate_v2_request() {
        let factory = ResourceFactory::with_default_resources();
        let mut generator = Generator::new(&factory);
        generator.message_set(speak_message());

        let mut buf = [0; 1024];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
        assert_eq!(stream.written(), SPEAK_WIRE);
    }

    #[test]
    fn test_round_trip_is_a_fixpoint() {
        let factory = ResourceFactory::with_default_resources();
        let first = parse_all(&factory, SPEAK_WIRE);

        let mut generator = Generator::new(&factory);
        generator.message_set(first.clone());
        let mut buf = [0; 1024];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
        let wire = stream.written().to_vec();
        assert_eq!(wire, SPEAK_WIRE);

        let second = parse_all(&factory, &wire);
        assert_eq!(second, first);
    }

    #[test]
    fn test_chunked_parse_matches_one_shot() {
        let factory = ResourceFactory::with_default_resources();
        let expected = parse_all(&factory, SPEAK_WIRE);

        let mut backing = [0; 256];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);
        let mut seen = Vec::new();

        for chunk in SPEAK_WIRE.chunks(2) {
            assert_eq!(stream.fill(chunk), chunk.len());
            stream_walk(&mut parser, &mut stream, |message, result| {
                if result == StreamResult::Complete {
                    seen.push(message.cloned());
                }
                true
            });
        }

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].as_ref(), Some(&expected));
    }

    #[test]
    fn test_header_truncation_rewinds() {
        let factory = ResourceFactory::with_default_resources();
        let mut backing = [0; 256];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);

        stream.fill(&SPEAK_WIRE[..30]);
        assert_eq!(parser.run(&mut stream), StreamResult::Truncated);
        assert_eq!(stream.pos(), 0);
        assert!(parser.message().is_none());

        stream.fill(&SPEAK_WIRE[30..]);
        assert_eq!(parser.run(&mut stream), StreamResult::Complete);
        assert_eq!(parser.message().unwrap().body, b"hello");
    }

    #[test]
    fn test_body_truncation_resumes() {
        let factory = ResourceFactory::with_default_resources();
        let mut backing = [0; 256];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);

        stream.fill(&SPEAK_WIRE[..SPEAK_WIRE.len() - 2]);
        assert_eq!(parser.run(&mut stream), StreamResult::Truncated);
        let message = parser.message().unwrap();
        assert_eq!(message.body, b"hel");

        stream.reset();
        stream.fill(b"lo");
        assert_eq!(parser.run(&mut stream), StreamResult::Complete);
        assert_eq!(parser.message().unwrap().body, b"hello");
    }

    #[test]
    fn test_invalid_resource() {
        let factory = ResourceFactory::with_default_resources();
        let mut buf = b"MRCP/2.0 0000000062 SPEAK 1\r\n\
            Channel-Identifier: abc@bogus-resource\r\n\
            \r\n"
            .to_vec();
        let mut stream = TextStream::new(&mut buf);
        let mut parser = Parser::new(&factory);

        assert_eq!(parser.run(&mut stream), StreamResult::Invalid);
        assert!(parser.message().is_none());
        assert!(parser.take_message().is_none());
    }

    #[test]
    fn test_malformed_start_line_mid_buffer_is_invalid() {
        let factory = ResourceFactory::with_default_resources();
        let mut buf = b"MRCP/2.0 nonsense\r\nmore bytes follow".to_vec();
        let mut stream = TextStream::new(&mut buf);
        let mut parser = Parser::new(&factory);

        assert_eq!(parser.run(&mut stream), StreamResult::Invalid);
        assert!(parser.message().is_none());
    }

    #[test]
    fn test_v1_round_trip_with_preset_resource() {
        const WIRE: &[u8] = b"SPEAK 543257 MRCP/1.0\r\nContent-Length: 5\r\n\r\nhello";

        let factory = ResourceFactory::with_default_resources();
        let mut buf = WIRE.to_vec();
        let mut stream = TextStream::new(&mut buf);
        let mut parser = Parser::new(&factory);
        parser.resource_name_set("speechsynth");

        assert_eq!(parser.run(&mut stream), StreamResult::Complete);
        let message = parser.take_message().unwrap();
        assert_eq!(message.start_line.version, Version::V1);
        assert_eq!(message.channel_id.resource_name, "speechsynth");
        assert_eq!(message.body, b"hello");

        let mut generator = Generator::new(&factory);
        generator.message_set(message);
        let mut buf = [0; 256];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
        assert_eq!(stream.written(), WIRE);
    }

    #[test]
    fn test_chunked_generate_matches_one_shot() {
        let factory = ResourceFactory::with_default_resources();
        let mut message = speak_message();
        message.set_body(&b"0123456789abcdefghij"[..]);

        let mut generator = Generator::new(&factory);
        generator.message_set(message.clone());
        let mut buf = [0; 1024];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
        let one_shot = stream.written().to_vec();

        let mut generator = Generator::new(&factory);
        generator.message_set(message);
        let mut chunked = Vec::new();
        let mut buf = [0; 100];
        loop {
            let mut stream = TextStream::new(&mut buf);
            let result = generator.run(&mut stream);
            chunked.extend_from_slice(stream.written());
            match result {
                StreamResult::Complete => break,
                StreamResult::Truncated => continue,
                StreamResult::Invalid => panic!("generate failed"),
            }
        }

        assert_eq!(chunked, one_shot);
    }

    #[test]
    fn test_generate_header_truncation_restarts() {
        let factory = ResourceFactory::with_default_resources();
        let mut generator = Generator::new(&factory);
        generator.message_set(speak_message());

        // Too small for the header section: nothing is kept.
        let mut buf = [0; 50];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Truncated);
        assert_eq!(stream.pos(), 0);

        // A large enough buffer produces the whole message from scratch.
        let mut buf = [0; 1024];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
        assert_eq!(stream.written(), SPEAK_WIRE);
    }

    #[test]
    fn test_generate_without_message_is_invalid() {
        let factory = ResourceFactory::with_default_resources();
        let mut generator = Generator::new(&factory);
        let mut buf = [0; 64];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Invalid);
    }

    #[test]
    fn test_generate_unresolvable_message_is_invalid() {
        let factory = ResourceFactory::with_default_resources();
        let mut message = Message::request(Version::V2, "RECOGNIZE", 1);
        message.set_channel_id("abc", "speechsynth");

        let mut generator = Generator::new(&factory);
        generator.message_set(message);
        let mut buf = [0; 256];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Invalid);
        assert_eq!(stream.pos(), 0);
    }

    #[test]
    fn test_generate_record_requires_media_type() {
        use crate::header::{RecorderHeader, ResourceHeader};

        let factory = ResourceFactory::with_default_resources();
        let mut message = Message::request(Version::V2, "RECORD", 1);
        message.set_channel_id("abc", "recorder");

        let mut generator = Generator::new(&factory);
        generator.message_set(message.clone());
        let mut buf = [0; 256];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Invalid);

        message.header.resource = Some(ResourceHeader::Recorder(RecorderHeader {
            media_type: Some("audio/basic".to_string()),
            ..RecorderHeader::default()
        }));
        generator.message_set(message);
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generator.run(&mut stream), StreamResult::Complete);
    }

    #[test]
    fn test_walk_pipelines_messages() {
        let factory = ResourceFactory::with_default_resources();
        let mut backing = [0; 512];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);

        let mut wire = SPEAK_WIRE.to_vec();
        wire.extend_from_slice(STOP_WIRE);
        stream.fill(&wire);

        let mut seen = Vec::new();
        let completed = stream_walk(&mut parser, &mut stream, |message, result| {
            assert_eq!(result, StreamResult::Complete);
            seen.push(message.unwrap().clone());
            true
        });

        assert!(completed);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].method_name(), Some("SPEAK"));
        assert_eq!(seen[1].method_name(), Some("STOP"));
        assert_eq!(seen[1].request_id(), 2);
        assert!(stream.is_empty());
    }

    #[test]
    fn test_walk_handler_aborts() {
        let factory = ResourceFactory::with_default_resources();
        let mut backing = [0; 512];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);

        let mut wire = SPEAK_WIRE.to_vec();
        wire.extend_from_slice(STOP_WIRE);
        stream.fill(&wire);

        let mut calls = 0;
        let completed = stream_walk(&mut parser, &mut stream, |_, _| {
            calls += 1;
            false
        });

        assert!(!completed);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_walk_surfaces_invalid() {
        let factory = ResourceFactory::with_default_resources();
        let mut backing = [0; 256];
        let mut stream = TextStream::empty(&mut backing);
        let mut parser = Parser::new(&factory);

        stream.fill(
            b"MRCP/2.0 0000000062 SPEAK 1\r\n\
            Channel-Identifier: abc@bogus-resource\r\n\
            \r\n",
        );

        let mut outcomes = Vec::new();
        let completed = stream_walk(&mut parser, &mut stream, |message, result| {
            assert!(message.is_none());
            outcomes.push(result);
            // A session would tear down here.
            false
        });

        assert!(!completed);
        assert_eq!(outcomes, vec![StreamResult::Invalid]);
    }
}
