//! Sans-IO codec for the MRCP media resource control protocol.
//!
//! This crate implements the streaming layer of MRCP v1/v2 without
//! considering transport: an incremental [`Parser`] that turns bytes
//! arriving in arbitrarily sized chunks into [`Message`] values, and a
//! [`Generator`] that serializes a message into a caller-provided buffer
//! that may be too small to hold the whole message. Both sides suspend
//! by returning [`StreamResult::Truncated`] and resume on the next `run`
//! once the caller has supplied more bytes or more room.
//!
//! # In scope:
//!
//! * Request, response and event messages in both protocol versions
//! * Resumable parse and generate state machines over caller-owned buffers
//! * Resource resolution: method/event names to ids, per-resource header
//!   schemas
//! * Back-patching of the fixed-width message-length field during
//!   generation
//!
//! # Out of scope:
//!
//! * Opening/closing sockets, TLS, connection lifecycle
//! * Session negotiation (SDP) and media transport
//! * Interpretation of message bodies (SSML, grammars etc)
//!
//! # Example
//!
//! ```
//! use mrcp_codec::{Generator, Message, Parser, ResourceFactory};
//! use mrcp_codec::{StreamResult, TextStream, Version};
//!
//! let factory = ResourceFactory::with_default_resources();
//!
//! let mut message = Message::request(Version::V2, "SPEAK", 1);
//! message.set_channel_id("32AECB23", "speechsynth");
//! message.set_body(&b"hello"[..]);
//!
//! let mut buf = [0u8; 1024];
//! let mut stream = TextStream::new(&mut buf);
//! let mut generator = Generator::new(&factory);
//! generator.message_set(message);
//! assert_eq!(generator.run(&mut stream), StreamResult::Complete);
//!
//! let mut wire = stream.written().to_vec();
//! let mut stream = TextStream::new(&mut wire);
//! let mut parser = Parser::new(&factory);
//! assert_eq!(parser.run(&mut stream), StreamResult::Complete);
//! assert_eq!(parser.message().unwrap().body, b"hello");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::uninlined_format_args)]
#![deny(missing_docs)]

mod error;
pub use error::{Error, Result};

mod stream;
pub use stream::TextStream;

mod message;
pub use message::{ChannelId, Message, RequestId, RequestState, StartLine, StartLineKind, Version};

mod channel_id;
mod start_line;

mod header;
pub use header::{
    GenericHeader, MessageHeader, RecognizerHeader, RecorderHeader, ResourceHeader,
    SynthesizerHeader, VerifierHeader,
};

mod resource;
pub use resource::{Resource, ResourceFactory, ResourceKind};

mod body;

mod codec;
pub use codec::{stream_walk, Generator, Parser, StreamResult};
