//! Acknowledgment events and their boundary parsing.
//!
//! Provider payloads are parsed exactly once, when they enter the system,
//! into an [`AcknowledgmentEvent`]. Everything downstream (store,
//! reconciler, HTTP lookup) works with the validated type. Deserializing
//! an event from a store goes through the same validation, so a record with
//! no sender or no text can never reach the reconciler.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MalformedEventError;

/// Normalized reply text that counts as an acknowledgment.
pub const ACKNOWLEDGMENT_TOKEN: &str = "YES";

/// Normalizes reply text for comparison: trimmed and upper-cased.
#[must_use]
pub fn normalize_reply(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Returns `true` if the reply acknowledges the alarm.
///
/// `" yes "`, `"Yes"` and `"YES"` all acknowledge.
#[must_use]
pub fn is_acknowledgment_text(text: &str) -> bool {
    normalize_reply(text) == ACKNOWLEDGMENT_TOKEN
}

// ============================================================================
// Identifiers
// ============================================================================

/// Stable recipient identity: the contact address.
///
/// Whitespace is stripped on construction so `"+44 7700 900001"` in a
/// config file matches `"+447700900001"` from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RecipientId(String);

impl RecipientId {
    /// Creates a recipient id from a contact address.
    #[must_use]
    pub fn new(address: impl AsRef<str>) -> Self {
        Self(
            address
                .as_ref()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect(),
        )
    }

    /// Returns the contact address.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the address is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RecipientId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RecipientId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<RecipientId> for String {
    fn from(value: RecipientId) -> Self {
        value.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic event identifier.
///
/// Composed from sender address, server receive timestamp and raw text, so
/// re-fetching the same stored record always yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Derives the id for an event.
    #[must_use]
    pub fn derive(recipient: &RecipientId, created_at: DateTime<Utc>, raw_text: &str) -> Self {
        Self(format!(
            "{}|{}|{}",
            recipient,
            created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            raw_text
        ))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// AcknowledgmentEvent
// ============================================================================

/// An inbound reply correlated to a recipient by contact address.
///
/// Read-only to the escalation core. `is_acknowledgment` and `event_id` are
/// always computed from the other fields and never trusted from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "EventRecord")]
pub struct AcknowledgmentEvent {
    event_id: EventId,
    recipient_id: RecipientId,
    raw_text: String,
    is_acknowledgment: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_sid: Option<String>,
}

impl AcknowledgmentEvent {
    /// Builds a validated event.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::MissingRecipient`] when the address is
    /// blank.
    pub fn new(
        recipient: impl AsRef<str>,
        raw_text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, MalformedEventError> {
        let recipient_id = RecipientId::new(recipient);
        if recipient_id.is_empty() {
            return Err(MalformedEventError::MissingRecipient);
        }
        let raw_text = raw_text.into();
        Ok(Self {
            event_id: EventId::derive(&recipient_id, created_at, &raw_text),
            is_acknowledgment: is_acknowledgment_text(&raw_text),
            recipient_id,
            raw_text,
            created_at,
            message_sid: None,
        })
    }

    /// Attaches the provider's message identifier.
    #[must_use]
    pub fn with_message_sid(mut self, sid: Option<String>) -> Self {
        self.message_sid = sid.filter(|s| !s.is_empty());
        self
    }

    /// Deterministic event identifier.
    #[must_use]
    pub const fn event_id(&self) -> &EventId {
        &self.event_id
    }

    /// Sender address.
    #[must_use]
    pub const fn recipient_id(&self) -> &RecipientId {
        &self.recipient_id
    }

    /// Reply text exactly as received.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Reply text trimmed and upper-cased.
    #[must_use]
    pub fn normalized_text(&self) -> String {
        normalize_reply(&self.raw_text)
    }

    /// Whether the reply acknowledges the alarm.
    #[must_use]
    pub const fn is_acknowledgment(&self) -> bool {
        self.is_acknowledgment
    }

    /// Server receive time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Provider message identifier, if one was supplied.
    #[must_use]
    pub fn message_sid(&self) -> Option<&str> {
        self.message_sid.as_deref()
    }
}

/// Loosely-typed stored shape, validated into [`AcknowledgmentEvent`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    recipient_id: Option<String>,
    raw_text: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    message_sid: Option<String>,
}

impl TryFrom<EventRecord> for AcknowledgmentEvent {
    type Error = MalformedEventError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let recipient = record
            .recipient_id
            .ok_or(MalformedEventError::MissingRecipient)?;
        let text = record.raw_text.ok_or(MalformedEventError::MissingText)?;
        Ok(Self::new(recipient, text, record.created_at)?.with_message_sid(record.message_sid))
    }
}

// ============================================================================
// Provider payload
// ============================================================================

/// Form-encoded inbound SMS as posted by the provider webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundSms {
    /// Sender address
    #[serde(rename = "From")]
    pub from: Option<String>,
    /// Our number
    #[serde(rename = "To")]
    pub to: Option<String>,
    /// Reply text
    #[serde(rename = "Body")]
    pub body: Option<String>,
    /// Provider message id
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

impl InboundSms {
    /// Converts the payload into an event stamped with `received_at`.
    ///
    /// A missing body is an empty reply, which is a valid non-acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError::MissingRecipient`] when `From` is
    /// missing or blank.
    pub fn into_event(
        self,
        received_at: DateTime<Utc>,
    ) -> Result<AcknowledgmentEvent, MalformedEventError> {
        let from = self.from.ok_or(MalformedEventError::MissingRecipient)?;
        Ok(
            AcknowledgmentEvent::new(from, self.body.unwrap_or_default(), received_at)?
                .with_message_sid(self.message_sid),
        )
    }
}
