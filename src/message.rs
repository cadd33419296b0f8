use crate::error::{Error, Result};
use crate::header::MessageHeader;

/// Client-assigned identifier correlating requests, responses and events.
pub type RequestId = u64;

/// Protocol version of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    /// MRCPv1. The channel identifier is not carried on the wire; the
    /// resource is implied by the transport channel.
    V1,
    /// MRCPv2.
    #[default]
    V2,
}

impl Version {
    pub(crate) fn from_proto(token: &str) -> Option<Version> {
        match token {
            "MRCP/1.0" => Some(Version::V1),
            "MRCP/2.0" => Some(Version::V2),
            _ => None,
        }
    }
}

/// State of the request an event or response refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// The request is being processed.
    #[default]
    InProgress,
    /// Processing has not started yet.
    Pending,
    /// Processing is finished; this is the last message for the request.
    Complete,
}

impl RequestState {
    pub(crate) fn from_token(token: &str) -> Result<RequestState> {
        match token {
            "IN-PROGRESS" => Ok(RequestState::InProgress),
            "PENDING" => Ok(RequestState::Pending),
            "COMPLETE" => Ok(RequestState::Complete),
            _ => Err(Error::RequestState),
        }
    }

    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            RequestState::InProgress => "IN-PROGRESS",
            RequestState::Pending => "PENDING",
            RequestState::Complete => "COMPLETE",
        }
    }
}

/// Identifies the control channel a message belongs to.
///
/// Serialized as `Channel-Identifier: <session-id>@<resource-name>` in V2
/// messages. V1 carries no channel identifier; the resource name is
/// injected into the parser out-of-band and the session id stays empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelId {
    /// Session the channel belongs to.
    pub session_id: String,
    /// Name of the resource the channel controls (e.g. `speechsynth`).
    pub resource_name: String,
}

/// First line of a message.
#[derive(Debug, Clone, PartialEq)]
pub struct StartLine {
    /// Protocol version the line was read in or will be written in.
    pub version: Version,
    /// Total message length as carried in the fixed-width V2 field,
    /// start line through body inclusive. Read as-is during parsing and
    /// back-patched during generation; always 0 for V1.
    pub length: usize,
    /// Identifier correlating this message with its request.
    pub request_id: RequestId,
    /// The shape of the line.
    pub kind: StartLineKind,
}

/// The three shapes a start line can take.
#[derive(Debug, Clone, PartialEq)]
pub enum StartLineKind {
    /// A client-to-server request.
    Request {
        /// Method name, e.g. `SPEAK`.
        method_name: String,
        /// Index of the method in the resolved resource's method table;
        /// assigned during resourcify.
        method_id: Option<usize>,
    },
    /// A server-to-client answer to a request.
    Response {
        /// Outcome of the request.
        status_code: u16,
        /// State of the request after this response.
        request_state: RequestState,
    },
    /// A server-to-client notification about an in-progress request.
    Event {
        /// Event name, e.g. `SPEAK-COMPLETE`.
        event_name: String,
        /// Index of the event in the resolved resource's event table;
        /// assigned during resourcify.
        event_id: Option<usize>,
        /// State of the request after this event.
        request_state: RequestState,
    },
}

/// A protocol message: request, response or event.
///
/// A message owns every buffer it references; dropping it releases the
/// start-line tokens, header values and body in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// First line of the message.
    pub start_line: StartLine,
    /// Control channel the message belongs to.
    pub channel_id: ChannelId,
    /// Header section, split into generic and resource substructures.
    pub header: MessageHeader,
    /// Opaque payload of `Content-Length` bytes.
    pub body: Vec<u8>,
}

impl Message {
    pub(crate) fn new(start_line: StartLine) -> Message {
        Message {
            start_line,
            channel_id: ChannelId::default(),
            header: MessageHeader::default(),
            body: Vec::new(),
        }
    }

    /// New request message.
    pub fn request(
        version: Version,
        method_name: impl Into<String>,
        request_id: RequestId,
    ) -> Message {
        Message::new(StartLine {
            version,
            length: 0,
            request_id,
            kind: StartLineKind::Request {
                method_name: method_name.into(),
                method_id: None,
            },
        })
    }

    /// New response message.
    pub fn response(
        version: Version,
        request_id: RequestId,
        status_code: u16,
        request_state: RequestState,
    ) -> Message {
        Message::new(StartLine {
            version,
            length: 0,
            request_id,
            kind: StartLineKind::Response {
                status_code,
                request_state,
            },
        })
    }

    /// New event message.
    pub fn event(
        version: Version,
        event_name: impl Into<String>,
        request_id: RequestId,
        request_state: RequestState,
    ) -> Message {
        Message::new(StartLine {
            version,
            length: 0,
            request_id,
            kind: StartLineKind::Event {
                event_name: event_name.into(),
                event_id: None,
                request_state,
            },
        })
    }

    /// New response answering `request`: version, request id and channel
    /// identifier are carried over.
    pub fn response_to(request: &Message, status_code: u16, request_state: RequestState) -> Message {
        let mut response = Message::response(
            request.start_line.version,
            request.start_line.request_id,
            status_code,
            request_state,
        );
        response.channel_id = request.channel_id.clone();
        response
    }

    /// Set the channel identifier.
    pub fn set_channel_id(
        &mut self,
        session_id: impl Into<String>,
        resource_name: impl Into<String>,
    ) {
        self.channel_id = ChannelId {
            session_id: session_id.into(),
            resource_name: resource_name.into(),
        };
    }

    /// Set the body and the `Content-Length` header to match.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.header.generic.content_length = if self.body.is_empty() {
            None
        } else {
            Some(self.body.len())
        };
    }

    /// Method name, if this is a request.
    pub fn method_name(&self) -> Option<&str> {
        match &self.start_line.kind {
            StartLineKind::Request { method_name, .. } => Some(method_name),
            _ => None,
        }
    }

    /// Event name, if this is an event.
    pub fn event_name(&self) -> Option<&str> {
        match &self.start_line.kind {
            StartLineKind::Event { event_name, .. } => Some(event_name),
            _ => None,
        }
    }

    /// Status code, if this is a response.
    pub fn status_code(&self) -> Option<u16> {
        match &self.start_line.kind {
            StartLineKind::Response { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Request id of the message.
    pub fn request_id(&self) -> RequestId {
        self.start_line.request_id
    }

    /// Structural check run by the generator before serialization: the
    /// method or event id must be resolved, the resource must be named,
    /// the headers the method requires must be filled and the declared
    /// content length must match the body.
    pub fn validate(&self) -> Result<()> {
        if self.channel_id.resource_name.is_empty() {
            return Err(Error::MissingResourceName);
        }
        match &self.start_line.kind {
            StartLineKind::Request {
                method_name,
                method_id,
            } => {
                if method_id.is_none() {
                    return Err(Error::NotResolved);
                }
                self.header.validate_required(method_name)?;
            }
            StartLineKind::Event { event_id: None, .. } => return Err(Error::NotResolved),
            _ => {}
        }
        let declared = self.header.generic.content_length.unwrap_or(0);
        if declared != self.body.len() {
            return Err(Error::ContentLengthMismatch);
        }
        Ok(())
    }
}
