use std::fmt::{self, Write};
use std::str;

use log::debug;

use crate::error::{Error, Result, OVERFLOW};
use crate::resource::ResourceKind;
use crate::stream::TextStream;

/// Upper bound on header fields per message.
const MAX_HEADERS: usize = 64;

/// Headers defined for every resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GenericHeader {
    /// `Content-Id`.
    pub content_id: Option<String>,
    /// `Content-Type`.
    pub content_type: Option<String>,
    /// `Content-Base`.
    pub content_base: Option<String>,
    /// `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// `Content-Length`: declared body length in bytes.
    pub content_length: Option<usize>,
}

impl GenericHeader {
    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        if name.eq_ignore_ascii_case("content-id") {
            self.content_id = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            self.content_type = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-base") {
            self.content_base = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-encoding") {
            self.content_encoding = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-length") {
            self.content_length = Some(value.parse().map_err(|_| Error::ContentLength)?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        write_opt(stream, "Content-Id", &self.content_id)?;
        write_opt(stream, "Content-Type", &self.content_type)?;
        write_opt(stream, "Content-Base", &self.content_base)?;
        write_opt(stream, "Content-Encoding", &self.content_encoding)?;
        if let Some(length) = self.content_length {
            write_field(stream, "Content-Length", length)?;
        }
        Ok(())
    }
}

/// Headers of the `speechsynth` resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SynthesizerHeader {
    /// `Voice-Name`.
    pub voice_name: Option<String>,
    /// `Voice-Gender`.
    pub voice_gender: Option<String>,
    /// `Voice-Age`.
    pub voice_age: Option<u16>,
    /// `Speech-Language`.
    pub speech_language: Option<String>,
    /// `Prosody-Rate`.
    pub prosody_rate: Option<String>,
    /// `Prosody-Volume`.
    pub prosody_volume: Option<String>,
    /// `Kill-On-Barge-In`.
    pub kill_on_barge_in: Option<bool>,
}

impl SynthesizerHeader {
    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        if name.eq_ignore_ascii_case("voice-name") {
            self.voice_name = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("voice-gender") {
            self.voice_gender = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("voice-age") {
            self.voice_age = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("speech-language") {
            self.speech_language = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("prosody-rate") {
            self.prosody_rate = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("prosody-volume") {
            self.prosody_volume = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("kill-on-barge-in") {
            self.kill_on_barge_in = Some(parse_bool(value)?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        write_opt(stream, "Voice-Name", &self.voice_name)?;
        write_opt(stream, "Voice-Gender", &self.voice_gender)?;
        if let Some(age) = self.voice_age {
            write_field(stream, "Voice-Age", age)?;
        }
        write_opt(stream, "Speech-Language", &self.speech_language)?;
        write_opt(stream, "Prosody-Rate", &self.prosody_rate)?;
        write_opt(stream, "Prosody-Volume", &self.prosody_volume)?;
        write_bool(stream, "Kill-On-Barge-In", self.kill_on_barge_in)?;
        Ok(())
    }
}

/// Headers of the `speechrecog` resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognizerHeader {
    /// `Confidence-Threshold`.
    pub confidence_threshold: Option<f32>,
    /// `Sensitivity-Level`.
    pub sensitivity_level: Option<f32>,
    /// `No-Input-Timeout` in milliseconds.
    pub no_input_timeout: Option<u64>,
    /// `Recognition-Timeout` in milliseconds.
    pub recognition_timeout: Option<u64>,
    /// `Start-Input-Timers`.
    pub start_input_timers: Option<bool>,
    /// `Speech-Language`.
    pub speech_language: Option<String>,
}

impl RecognizerHeader {
    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        if name.eq_ignore_ascii_case("confidence-threshold") {
            self.confidence_threshold = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("sensitivity-level") {
            self.sensitivity_level = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("no-input-timeout") {
            self.no_input_timeout = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("recognition-timeout") {
            self.recognition_timeout = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("start-input-timers") {
            self.start_input_timers = Some(parse_bool(value)?);
        } else if name.eq_ignore_ascii_case("speech-language") {
            self.speech_language = Some(value.to_string());
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        if let Some(threshold) = self.confidence_threshold {
            write_field(stream, "Confidence-Threshold", threshold)?;
        }
        if let Some(level) = self.sensitivity_level {
            write_field(stream, "Sensitivity-Level", level)?;
        }
        if let Some(timeout) = self.no_input_timeout {
            write_field(stream, "No-Input-Timeout", timeout)?;
        }
        if let Some(timeout) = self.recognition_timeout {
            write_field(stream, "Recognition-Timeout", timeout)?;
        }
        write_bool(stream, "Start-Input-Timers", self.start_input_timers)?;
        write_opt(stream, "Speech-Language", &self.speech_language)?;
        Ok(())
    }
}

/// Headers of the `recorder` resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecorderHeader {
    /// `Record-URI`.
    pub record_uri: Option<String>,
    /// `Media-Type`.
    pub media_type: Option<String>,
    /// `Max-Time` in milliseconds.
    pub max_time: Option<u64>,
    /// `Final-Silence` in milliseconds.
    pub final_silence: Option<u64>,
    /// `Capture-On-Speech`.
    pub capture_on_speech: Option<bool>,
}

impl RecorderHeader {
    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        if name.eq_ignore_ascii_case("record-uri") {
            self.record_uri = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("media-type") {
            self.media_type = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("max-time") {
            self.max_time = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("final-silence") {
            self.final_silence = Some(value.parse()?);
        } else if name.eq_ignore_ascii_case("capture-on-speech") {
            self.capture_on_speech = Some(parse_bool(value)?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        write_opt(stream, "Record-URI", &self.record_uri)?;
        write_opt(stream, "Media-Type", &self.media_type)?;
        if let Some(time) = self.max_time {
            write_field(stream, "Max-Time", time)?;
        }
        if let Some(silence) = self.final_silence {
            write_field(stream, "Final-Silence", silence)?;
        }
        write_bool(stream, "Capture-On-Speech", self.capture_on_speech)?;
        Ok(())
    }
}

/// Headers of the `speakverify` resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerifierHeader {
    /// `Repository-URI`.
    pub repository_uri: Option<String>,
    /// `Voiceprint-Identifier`.
    pub voiceprint_identifier: Option<String>,
    /// `Verification-Mode`.
    pub verification_mode: Option<String>,
    /// `Adapt-Model`.
    pub adapt_model: Option<bool>,
    /// `Min-Verification-Score`.
    pub min_verification_score: Option<f32>,
}

impl VerifierHeader {
    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        if name.eq_ignore_ascii_case("repository-uri") {
            self.repository_uri = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("voiceprint-identifier") {
            self.voiceprint_identifier = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("verification-mode") {
            self.verification_mode = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("adapt-model") {
            self.adapt_model = Some(parse_bool(value)?);
        } else if name.eq_ignore_ascii_case("min-verification-score") {
            self.min_verification_score = Some(value.parse()?);
        } else {
            return Ok(false);
        }
        Ok(true)
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        write_opt(stream, "Repository-URI", &self.repository_uri)?;
        write_opt(stream, "Voiceprint-Identifier", &self.voiceprint_identifier)?;
        write_opt(stream, "Verification-Mode", &self.verification_mode)?;
        write_bool(stream, "Adapt-Model", self.adapt_model)?;
        if let Some(score) = self.min_verification_score {
            write_field(stream, "Min-Verification-Score", score)?;
        }
        Ok(())
    }
}

/// Resource-specific header schema, one variant per resource. The
/// variant is chosen when the message is resourcified, after the start
/// line and channel identifier are known.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceHeader {
    /// `speechsynth` headers.
    Synthesizer(SynthesizerHeader),
    /// `speechrecog` headers.
    Recognizer(RecognizerHeader),
    /// `recorder` headers.
    Recorder(RecorderHeader),
    /// `speakverify` headers.
    Verifier(VerifierHeader),
}

impl ResourceHeader {
    pub(crate) fn new(kind: ResourceKind) -> ResourceHeader {
        match kind {
            ResourceKind::Synthesizer => ResourceHeader::Synthesizer(SynthesizerHeader::default()),
            ResourceKind::Recognizer => ResourceHeader::Recognizer(RecognizerHeader::default()),
            ResourceKind::Recorder => ResourceHeader::Recorder(RecorderHeader::default()),
            ResourceKind::Verifier => ResourceHeader::Verifier(VerifierHeader::default()),
        }
    }

    /// Which resource this schema belongs to.
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceHeader::Synthesizer(_) => ResourceKind::Synthesizer,
            ResourceHeader::Recognizer(_) => ResourceKind::Recognizer,
            ResourceHeader::Recorder(_) => ResourceKind::Recorder,
            ResourceHeader::Verifier(_) => ResourceKind::Verifier,
        }
    }

    fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        match self {
            ResourceHeader::Synthesizer(h) => h.set(name, value),
            ResourceHeader::Recognizer(h) => h.set(name, value),
            ResourceHeader::Recorder(h) => h.set(name, value),
            ResourceHeader::Verifier(h) => h.set(name, value),
        }
    }

    fn generate(&self, stream: &mut TextStream) -> Result<()> {
        match self {
            ResourceHeader::Synthesizer(h) => h.generate(stream),
            ResourceHeader::Recognizer(h) => h.generate(stream),
            ResourceHeader::Recorder(h) => h.generate(stream),
            ResourceHeader::Verifier(h) => h.generate(stream),
        }
    }

    /// Of the fields carried here, the protocol mandates `Media-Type` on
    /// a recorder RECORD request and `Verification-Mode` on a verifier
    /// START-SESSION; everything else is optional.
    fn validate_required(&self, method_name: &str) -> Result<()> {
        match self {
            ResourceHeader::Recorder(h) => {
                if method_name == "RECORD" && h.media_type.is_none() {
                    return Err(Error::MissingRequiredHeader);
                }
            }
            ResourceHeader::Verifier(h) => {
                if method_name == "START-SESSION" && h.verification_mode.is_none() {
                    return Err(Error::MissingRequiredHeader);
                }
            }
            ResourceHeader::Synthesizer(_) | ResourceHeader::Recognizer(_) => {}
        }
        Ok(())
    }
}

/// Header section of a message, split at parse time into the generic
/// substructure, the resource substructure and any fields known to
/// neither, which are kept verbatim and re-emitted on generation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageHeader {
    /// Fields defined for every resource.
    pub generic: GenericHeader,
    /// Fields of the resolved resource. Attached during resourcify;
    /// `None` until the message is resolved.
    pub resource: Option<ResourceHeader>,
    /// Fields outside both schemas, in arrival order.
    pub extensions: Vec<(String, String)>,
}

impl MessageHeader {
    /// Check that the headers the resolved request method requires are
    /// filled.
    pub(crate) fn validate_required(&self, method_name: &str) -> Result<()> {
        match &self.resource {
            Some(resource) => resource.validate_required(method_name),
            None => Ok(()),
        }
    }

    fn set_field(&mut self, name: &str, value: &str) -> Result<()> {
        if self.generic.set(name, value)? {
            return Ok(());
        }
        if let Some(resource) = self.resource.as_mut() {
            if resource.set(name, value)? {
                return Ok(());
            }
        }
        debug!("unrecognized header {:?}", name);
        self.extensions.push((name.to_string(), value.to_string()));
        Ok(())
    }
}

/// Parse the header section, consuming through the blank line. When the
/// terminator is not in view the stream is consumed to its end and
/// [`Error::UnexpectedEnd`] is returned; on a malformed section the
/// cursor still moves past it, so a stream walk makes progress.
pub(crate) fn parse(header: &mut MessageHeader, stream: &mut TextStream) -> Result<()> {
    let Some(end) = section_end(stream.rest()) else {
        stream.set_pos(stream.len());
        return Err(Error::UnexpectedEnd);
    };

    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let outcome = (|| -> Result<()> {
        let section = &stream.rest()[..end];
        let fields = match httparse::parse_headers(section, &mut headers)? {
            httparse::Status::Complete((_, fields)) => fields,
            // A section bounded by its terminator always parses to
            // completion.
            httparse::Status::Partial => return Err(Error::NewLine),
        };
        for field in fields {
            let value = str::from_utf8(field.value)?;
            header.set_field(field.name, value.trim())?;
        }
        Ok(())
    })();
    stream.advance(end);
    outcome
}

/// Serialize the header section including the terminating blank line.
pub(crate) fn generate(header: &MessageHeader, stream: &mut TextStream) -> Result<()> {
    header.generic.generate(stream)?;
    if let Some(resource) = &header.resource {
        resource.generate(stream)?;
    }
    for (name, value) in &header.extensions {
        write_field(stream, name, value)?;
    }
    stream.write_bytes(b"\r\n")
}

/// Offset one past the blank line ending the header section, if in view.
fn section_end(b: &[u8]) -> Option<usize> {
    if b.starts_with(b"\r\n") {
        return Some(2);
    }
    b.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

fn write_field<D: fmt::Display>(stream: &mut TextStream, name: &str, value: D) -> Result<()> {
    write!(stream.writer(), "{}: {}\r\n", name, value).or(OVERFLOW)
}

fn write_opt(stream: &mut TextStream, name: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(value) => write_field(stream, name, value),
        None => Ok(()),
    }
}

fn write_bool(stream: &mut TextStream, name: &str, value: Option<bool>) -> Result<()> {
    match value {
        Some(value) => write_field(stream, name, if value { "true" } else { "false" }),
        None => Ok(()),
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::HeaderValue),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn synth_header() -> MessageHeader {
        MessageHeader {
            resource: Some(ResourceHeader::new(ResourceKind::Synthesizer)),
            ..MessageHeader::default()
        }
    }

    #[test]
    fn test_parse_splits_schemas() {
        let mut buf =
            *b"Content-Type: application/ssml+xml\r\nVoice-Name: alice\r\nX-Custom: 1\r\n\r\nbody";
        let mut stream = TextStream::new(&mut buf);
        let mut header = synth_header();
        parse(&mut header, &mut stream).unwrap();

        assert_eq!(
            header.generic.content_type.as_deref(),
            Some("application/ssml+xml")
        );
        let ResourceHeader::Synthesizer(synth) = header.resource.as_ref().unwrap() else {
            panic!("wrong schema");
        };
        assert_eq!(synth.voice_name.as_deref(), Some("alice"));
        assert_eq!(header.extensions, vec![("X-Custom".to_string(), "1".to_string())]);
        assert_eq!(stream.rest(), b"body");
    }

    #[test]
    fn test_parse_empty_section() {
        let mut buf = *b"\r\nbody";
        let mut stream = TextStream::new(&mut buf);
        let mut header = MessageHeader::default();
        parse(&mut header, &mut stream).unwrap();
        assert_eq!(header, MessageHeader::default());
        assert_eq!(stream.rest(), b"body");
    }

    #[test]
    fn test_parse_without_terminator_consumes_stream() {
        let mut buf = *b"Content-Length: 5\r\nVoice-";
        let mut stream = TextStream::new(&mut buf);
        let mut header = synth_header();
        assert_eq!(parse(&mut header, &mut stream), Err(Error::UnexpectedEnd));
        assert!(stream.is_at_end());
    }

    #[test]
    fn test_parse_bad_content_length_advances_past_section() {
        let mut buf = *b"Content-Length: nope\r\n\r\nrest";
        let mut stream = TextStream::new(&mut buf);
        let mut header = MessageHeader::default();
        assert_eq!(parse(&mut header, &mut stream), Err(Error::ContentLength));
        assert_eq!(stream.rest(), b"rest");
    }

    #[test]
    fn test_generate_round_trip() {
        let mut header = synth_header();
        header.generic.content_type = Some("text/plain".to_string());
        header.generic.content_length = Some(5);
        if let Some(ResourceHeader::Synthesizer(synth)) = header.resource.as_mut() {
            synth.voice_name = Some("alice".to_string());
            synth.kill_on_barge_in = Some(true);
        }
        header.extensions.push(("X-Custom".to_string(), "1".to_string()));

        let mut buf = [0; 256];
        let mut stream = TextStream::new(&mut buf);
        generate(&header, &mut stream).unwrap();
        let written = stream.written().to_vec();

        let mut rx = written.clone();
        let mut stream = TextStream::new(&mut rx);
        let mut parsed = synth_header();
        parse(&mut parsed, &mut stream).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_generate_overflow() {
        let mut header = MessageHeader::default();
        header.generic.content_type = Some("text/plain".to_string());
        let mut buf = [0; 8];
        let mut stream = TextStream::new(&mut buf);
        assert_eq!(generate(&header, &mut stream), Err(Error::OutputOverflow));
        assert!(stream.is_at_end());
    }
}
