// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keyboard events and the transport abstraction.
//!
//! A [`KeyboardTransport`] delivers [`RawKeyboardEvent`]s, in which note
//! events still carry their pitch-class name as text. The session decodes
//! them into the closed [`KeyboardEvent`] type before any reducer sees them.

pub mod input;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::Error;
use crate::music::{MidiNumber, Note};
use crate::timing::TimestampMs;

pub use input::{list_sources, print_sources, MidiMessage, MidirTransport, PortChange, PortWatch};

/// A decoded note event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MidiNote {
    /// Pitch class (C, C#, D, ...)
    pub note: Note,
    /// Absolute MIDI note number (0-127)
    pub number: MidiNumber,
    /// Octave, MIDI convention (middle C = C4 = 60)
    pub octave: i8,
    /// Milliseconds since session start
    pub time: TimestampMs,
}

impl MidiNote {
    /// Build a note from its number; name and octave derive from it
    pub fn from_number(number: MidiNumber, time: TimestampMs) -> crate::error::Result<Self> {
        Ok(Self {
            note: Note::from_midi_number(number)?,
            number,
            octave: octave_of(number),
            time,
        })
    }
}

/// MIDI octave of a note number (60 -> 4)
pub fn octave_of(number: MidiNumber) -> i8 {
    (number / 12) as i8 - 1
}

/// Events seen by the reducers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum KeyboardEvent {
    Connected(String),
    Disconnected(String),
    NoteOn(MidiNote),
    NoteOff(MidiNote),
}

impl KeyboardEvent {
    /// The note payload of a note-on or note-off
    pub fn note(&self) -> Option<&MidiNote> {
        match self {
            KeyboardEvent::NoteOn(note) | KeyboardEvent::NoteOff(note) => Some(note),
            KeyboardEvent::Connected(_) | KeyboardEvent::Disconnected(_) => None,
        }
    }

    /// YAML document for event logs and the monitor
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize keyboard event")
    }
}

/// Note payload as delivered by a transport, name not yet validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNote {
    pub name: String,
    pub number: MidiNumber,
    pub octave: i8,
    pub timestamp_ms: TimestampMs,
}

impl RawNote {
    /// Raw note named from its number, as hardware transports produce them.
    /// Numbers above 127 get an empty name and fail to decode.
    pub fn from_number(number: MidiNumber, timestamp_ms: TimestampMs) -> Self {
        let name = Note::from_midi_number(number)
            .map(|note| note.name().to_string())
            .unwrap_or_default();
        Self {
            name,
            number,
            octave: octave_of(number),
            timestamp_ms,
        }
    }
}

impl TryFrom<RawNote> for MidiNote {
    type Error = Error;

    fn try_from(raw: RawNote) -> Result<Self, Error> {
        // The number must be a real key before its name is worth checking
        Note::from_midi_number(raw.number)?;
        Ok(MidiNote {
            note: raw.name.parse()?,
            number: raw.number,
            octave: raw.octave,
            time: raw.timestamp_ms,
        })
    }
}

/// Transport-level event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawKeyboardEvent {
    Connected(String),
    Disconnected(String),
    NoteOn(RawNote),
    NoteOff(RawNote),
}

impl TryFrom<RawKeyboardEvent> for KeyboardEvent {
    type Error = Error;

    fn try_from(raw: RawKeyboardEvent) -> Result<Self, Error> {
        Ok(match raw {
            RawKeyboardEvent::Connected(name) => KeyboardEvent::Connected(name),
            RawKeyboardEvent::Disconnected(name) => KeyboardEvent::Disconnected(name),
            RawKeyboardEvent::NoteOn(note) => KeyboardEvent::NoteOn(note.try_into()?),
            RawKeyboardEvent::NoteOff(note) => KeyboardEvent::NoteOff(note.try_into()?),
        })
    }
}

/// Ordered stream of transport events; ends when the transport closes
pub type EventStream = UnboundedReceiver<RawKeyboardEvent>;

/// Trait for keyboard transports.
///
/// A transport is constructed once per session and owned by it. Closing the
/// transport must drop every sender feeding the stream so that the stream
/// ends and the session can wind down.
pub trait KeyboardTransport {
    /// Open the event stream. A transport hands out a single stream.
    fn subscribe(&mut self) -> Result<EventStream>;

    /// Release the device and end the stream
    fn close(&mut self);
}

/// In-process transport fed through a channel (virtual keyboards, replays)
pub struct ChannelTransport {
    sender: Option<UnboundedSender<RawKeyboardEvent>>,
    receiver: Option<EventStream>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Some(sender),
            receiver: Some(receiver),
        }
    }

    /// A handle for feeding events; the stream ends once the transport is
    /// closed and every handle is dropped
    pub fn sender(&self) -> Option<UnboundedSender<RawKeyboardEvent>> {
        self.sender.clone()
    }
}

impl Default for ChannelTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardTransport for ChannelTransport {
    fn subscribe(&mut self) -> Result<EventStream> {
        self.receiver
            .take()
            .ok_or_else(|| anyhow!("Channel transport already subscribed"))
    }

    fn close(&mut self) {
        self.sender = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, number: MidiNumber, time: TimestampMs) -> RawNote {
        RawNote {
            name: name.to_string(),
            number,
            octave: octave_of(number),
            timestamp_ms: time,
        }
    }

    #[test]
    fn test_octave_of() {
        assert_eq!(octave_of(60), 4);
        assert_eq!(octave_of(0), -1);
        assert_eq!(octave_of(127), 9);
    }

    #[test]
    fn test_decode_note_on() {
        let event = KeyboardEvent::try_from(RawKeyboardEvent::NoteOn(raw("C#", 61, 12))).unwrap();
        assert_eq!(
            event,
            KeyboardEvent::NoteOn(MidiNote {
                note: Note::Cs,
                number: 61,
                octave: 4,
                time: 12,
            })
        );
        assert_eq!(event.note().map(|n| n.note), Some(Note::Cs));
    }

    #[test]
    fn test_decode_rejects_unknown_name() {
        let result = KeyboardEvent::try_from(RawKeyboardEvent::NoteOff(raw("Db", 61, 0)));
        assert_eq!(result, Err(Error::InvalidNoteName("Db".to_string())));
    }

    #[test]
    fn test_connection_events_pass_through() {
        let event = KeyboardEvent::try_from(RawKeyboardEvent::Connected("Keys".into())).unwrap();
        assert_eq!(event, KeyboardEvent::Connected("Keys".into()));
        assert!(event.note().is_none());
    }

    #[test]
    fn test_event_yaml_shape() {
        let event = KeyboardEvent::NoteOn(MidiNote::from_number(61, 250).unwrap());
        let doc: serde_yaml::Value = serde_yaml::from_str(&event.to_yaml().unwrap()).unwrap();
        assert_eq!(doc["type"], "note_on");
        assert_eq!(doc["payload"]["note"], "C#");
        assert_eq!(doc["payload"]["number"], 61);
        assert_eq!(doc["payload"]["octave"], 4);
        assert_eq!(doc["payload"]["time"], 250);

        let doc: serde_yaml::Value =
            serde_yaml::from_str(&KeyboardEvent::Disconnected("Keys".into()).to_yaml().unwrap())
                .unwrap();
        assert_eq!(doc["type"], "disconnected");
        assert_eq!(doc["payload"], "Keys");
    }

    #[test]
    fn test_raw_note_from_number() {
        let note = RawNote::from_number(69, 5);
        assert_eq!(note.name, "A");
        assert_eq!(note.octave, 4);
        assert_eq!(MidiNote::try_from(note).unwrap(), MidiNote::from_number(69, 5).unwrap());
    }

    #[test]
    fn test_decode_reports_out_of_range_number() {
        let result = KeyboardEvent::try_from(RawKeyboardEvent::NoteOn(RawNote::from_number(200, 0)));
        assert_eq!(result, Err(Error::InvalidNoteNumber(200)));

        // Also when the transport supplied a plausible name
        let result = KeyboardEvent::try_from(RawKeyboardEvent::NoteOff(raw("C", 128, 0)));
        assert_eq!(result, Err(Error::InvalidNoteNumber(128)));
    }

    #[tokio::test]
    async fn test_channel_transport_stream_ends_on_close() {
        let mut transport = ChannelTransport::new();
        let mut stream = transport.subscribe().unwrap();
        assert!(transport.subscribe().is_err());

        let tx = transport.sender().unwrap();
        tx.send(RawKeyboardEvent::Connected("Virtual".into())).unwrap();
        drop(tx);
        transport.close();

        assert_eq!(
            stream.recv().await,
            Some(RawKeyboardEvent::Connected("Virtual".into()))
        );
        assert_eq!(stream.recv().await, None);
    }
}
