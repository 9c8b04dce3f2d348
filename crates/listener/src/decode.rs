//! Decoding of batched message bodies into job-lifecycle events.
//!
//! A body is a JSON array of sub-messages, each tagged by `messageType`.
//! Recognised tags decode into a [`JobLifecycleEvent`]; unknown tags are logged
//! and skipped so newer service versions can add sub-message kinds.
//!
//! Anything else wrong with the batch is fatal for the whole message: a
//! malformed outer array, a missing discriminator, or a recognised
//! sub-message that fails to decode. Acting on part of a corrupt batch could
//! silently drop a job.

use scaleset::{message_types, JobLifecycleEvent, ListenerError, Message, MessageId};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::warn;

/// Decodes every sub-message of `message`, preserving batch order.
///
/// An empty body decodes to no events.
pub fn decode_batch(message: &Message) -> Result<Vec<JobLifecycleEvent>, ListenerError> {
    if message.body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let elements: Vec<Map<String, Value>> =
        serde_json::from_str(&message.body).map_err(|source| ListenerError::MalformedBatch {
            message_id: message.id,
            source,
        })?;

    let mut events = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        if let Some(event) = decode_sub_message(message.id, index, element)? {
            events.push(event);
        }
    }
    Ok(events)
}

fn decode_sub_message(
    message_id: MessageId,
    index: usize,
    element: Map<String, Value>,
) -> Result<Option<JobLifecycleEvent>, ListenerError> {
    let message_type = match element.get("messageType") {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(ListenerError::MissingDiscriminator { message_id, index }),
    };

    let event = match message_type.as_str() {
        message_types::JOB_AVAILABLE => {
            JobLifecycleEvent::Available(parse(message_id, index, &message_type, element)?)
        }
        message_types::JOB_ASSIGNED => {
            JobLifecycleEvent::Assigned(parse(message_id, index, &message_type, element)?)
        }
        message_types::JOB_STARTED => {
            JobLifecycleEvent::Started(parse(message_id, index, &message_type, element)?)
        }
        message_types::JOB_COMPLETED => {
            JobLifecycleEvent::Completed(parse(message_id, index, &message_type, element)?)
        }
        other => {
            warn!(
                %message_id,
                index,
                message_type = other,
                "skipping sub-message of unknown type"
            );
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn parse<T: DeserializeOwned>(
    message_id: MessageId,
    index: usize,
    message_type: &str,
    element: Map<String, Value>,
) -> Result<T, ListenerError> {
    serde_json::from_value(Value::Object(element)).map_err(|source| ListenerError::MalformedEvent {
        message_id,
        index,
        message_type: message_type.to_string(),
        source,
    })
}
