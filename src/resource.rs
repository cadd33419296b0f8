use log::warn;

use crate::error::{Error, Result};
use crate::header::ResourceHeader;
use crate::message::{Message, StartLineKind};

/// Classes of media resource a server can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// Speech synthesizer (`speechsynth`).
    Synthesizer,
    /// Speech recognizer (`speechrecog`).
    Recognizer,
    /// Audio recorder (`recorder`).
    Recorder,
    /// Speaker verifier (`speakverify`).
    Verifier,
}

/// One media resource: its wire name and the method and event names that
/// are legal under it. Method and event ids are indices into these
/// tables.
#[derive(Debug, Clone)]
pub struct Resource {
    name: String,
    kind: ResourceKind,
    methods: Vec<String>,
    events: Vec<String>,
}

impl Resource {
    /// Define a resource.
    pub fn new(
        name: impl Into<String>,
        kind: ResourceKind,
        methods: &[&str],
        events: &[&str],
    ) -> Resource {
        Resource {
            name: name.into(),
            kind,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            events: events.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Wire name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class of the resource.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Id of a method name, if legal for this resource.
    pub fn method_id(&self, name: &str) -> Option<usize> {
        self.methods.iter().position(|m| m == name)
    }

    /// Name of a method id, if legal for this resource.
    pub fn method_name(&self, id: usize) -> Option<&str> {
        self.methods.get(id).map(String::as_str)
    }

    /// Id of an event name, if legal for this resource.
    pub fn event_id(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e == name)
    }

    /// Name of an event id, if legal for this resource.
    pub fn event_name(&self, id: usize) -> Option<&str> {
        self.events.get(id).map(String::as_str)
    }
}

/// Lookup table from resource names to resource definitions.
#[derive(Debug, Clone, Default)]
pub struct ResourceFactory {
    resources: Vec<Resource>,
}

impl ResourceFactory {
    /// Empty factory.
    pub fn new() -> ResourceFactory {
        ResourceFactory::default()
    }

    /// Factory pre-populated with the four standard resources.
    pub fn with_default_resources() -> ResourceFactory {
        let mut factory = ResourceFactory::new();
        factory.register(Resource::new(
            "speechsynth",
            ResourceKind::Synthesizer,
            &[
                "SET-PARAMS",
                "GET-PARAMS",
                "SPEAK",
                "STOP",
                "PAUSE",
                "RESUME",
                "BARGE-IN-OCCURRED",
                "CONTROL",
                "DEFINE-LEXICON",
            ],
            &["SPEECH-MARKER", "SPEAK-COMPLETE"],
        ));
        factory.register(Resource::new(
            "speechrecog",
            ResourceKind::Recognizer,
            &[
                "SET-PARAMS",
                "GET-PARAMS",
                "DEFINE-GRAMMAR",
                "RECOGNIZE",
                "INTERPRET",
                "GET-RESULT",
                "START-INPUT-TIMERS",
                "STOP",
            ],
            &[
                "START-OF-INPUT",
                "RECOGNITION-COMPLETE",
                "INTERPRETATION-COMPLETE",
            ],
        ));
        factory.register(Resource::new(
            "recorder",
            ResourceKind::Recorder,
            &[
                "SET-PARAMS",
                "GET-PARAMS",
                "RECORD",
                "STOP",
                "START-INPUT-TIMERS",
            ],
            &["START-OF-INPUT", "RECORD-COMPLETE"],
        ));
        factory.register(Resource::new(
            "speakverify",
            ResourceKind::Verifier,
            &[
                "SET-PARAMS",
                "GET-PARAMS",
                "START-SESSION",
                "END-SESSION",
                "QUERY-VOICEPRINT",
                "DELETE-VOICEPRINT",
                "VERIFY",
                "VERIFY-FROM-BUFFER",
                "VERIFY-ROLLBACK",
                "STOP",
                "CLEAR-BUFFER",
                "START-INPUT-TIMERS",
            ],
            &["VERIFICATION-COMPLETE", "START-OF-INPUT"],
        ));
        factory
    }

    /// Add a resource definition.
    pub fn register(&mut self, resource: Resource) {
        self.resources.push(resource);
    }

    /// Look up a resource by wire name.
    pub fn find(&self, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resolve a parsed message under the resource named by its channel
    /// identifier: translate the textual method or event name in the
    /// start line into an id and attach the resource's header schema.
    pub fn resourcify_by_name(&self, message: &mut Message) -> Result<()> {
        let resource = self.lookup(message)?;
        match &mut message.start_line.kind {
            StartLineKind::Request {
                method_name,
                method_id,
            } => {
                *method_id = Some(resource.method_id(method_name).ok_or(Error::UnknownMethod)?);
            }
            StartLineKind::Event {
                event_name,
                event_id,
                ..
            } => {
                *event_id = Some(resource.event_id(event_name).ok_or(Error::UnknownEvent)?);
            }
            StartLineKind::Response { .. } => {}
        }
        attach_schema(message, resource);
        Ok(())
    }

    /// The reverse of [`ResourceFactory::resourcify_by_name`], run before
    /// serialization: attach the name belonging to a numeric id (or the
    /// id belonging to a name the application filled in) and the header
    /// schema.
    pub fn resourcify_by_id(&self, message: &mut Message) -> Result<()> {
        let resource = self.lookup(message)?;
        match &mut message.start_line.kind {
            StartLineKind::Request {
                method_name,
                method_id,
            } => match method_id {
                Some(id) => {
                    *method_name = resource
                        .method_name(*id)
                        .ok_or(Error::UnknownMethod)?
                        .to_string();
                }
                None => {
                    *method_id =
                        Some(resource.method_id(method_name).ok_or(Error::UnknownMethod)?);
                }
            },
            StartLineKind::Event {
                event_name,
                event_id,
                ..
            } => match event_id {
                Some(id) => {
                    *event_name = resource
                        .event_name(*id)
                        .ok_or(Error::UnknownEvent)?
                        .to_string();
                }
                None => {
                    *event_id = Some(resource.event_id(event_name).ok_or(Error::UnknownEvent)?);
                }
            },
            StartLineKind::Response { .. } => {}
        }
        attach_schema(message, resource);
        Ok(())
    }

    fn lookup(&self, message: &Message) -> Result<&Resource> {
        let name = &message.channel_id.resource_name;
        if name.is_empty() {
            return Err(Error::MissingResourceName);
        }
        self.find(name).ok_or_else(|| {
            warn!("unknown resource {:?}", name);
            Error::UnknownResource
        })
    }
}

fn attach_schema(message: &mut Message, resource: &Resource) {
    // Keep an already attached schema of the right kind; reparsing a
    // resolved message must not drop its resource headers.
    let keep = message
        .header
        .resource
        .as_ref()
        .is_some_and(|h| h.kind() == resource.kind);
    if !keep {
        message.header.resource = Some(ResourceHeader::new(resource.kind));
    }
}
