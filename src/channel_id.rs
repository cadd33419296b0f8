use std::fmt::Write;
use std::str;

use crate::error::{Error, Result, OVERFLOW};
use crate::message::ChannelId;
use crate::stream::TextStream;

const FIELD_NAME: &str = "Channel-Identifier";

/// Parse the `Channel-Identifier` line that follows a V2 start line.
pub(crate) fn parse(stream: &mut TextStream) -> Result<ChannelId> {
    let line = stream.read_line()?;
    let line = str::from_utf8(line)?;

    let (name, value) = line.split_once(':').ok_or(Error::ChannelId)?;
    if !name.trim().eq_ignore_ascii_case(FIELD_NAME) {
        return Err(Error::ChannelId);
    }

    let (session_id, resource_name) = value.trim().split_once('@').ok_or(Error::ChannelId)?;
    if session_id.is_empty() || resource_name.is_empty() {
        return Err(Error::ChannelId);
    }

    Ok(ChannelId {
        session_id: session_id.to_string(),
        resource_name: resource_name.to_string(),
    })
}

/// Serialize the `Channel-Identifier` line.
pub(crate) fn generate(channel_id: &ChannelId, stream: &mut TextStream) -> Result<()> {
    write!(
        stream.writer(),
        "{}: {}@{}\r\n",
        FIELD_NAME,
        channel_id.session_id,
        channel_id.resource_name
    )
    .or(OVERFLOW)
}
