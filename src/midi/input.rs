// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI Input handling for receiving notes from a keyboard.
//!
//! This module parses raw MIDI bytes and provides a `midir`-backed
//! [`KeyboardTransport`] that reports connection changes and note events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

use super::{EventStream, KeyboardTransport, RawKeyboardEvent, RawNote};
use crate::config::MidiDeviceConfig;
use crate::timing::SessionClock;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;

/// How often the port list is checked for plugged and unplugged devices
const PRESENCE_POLL: Duration = Duration::from_millis(500);

/// Parsed MIDI message types
#[derive(Debug, Clone, PartialEq)]
pub enum MidiMessage {
    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Anything the analyzer does not consume
    Other(Vec<u8>),
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a MidiMessage
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let status = data[0];
        let msg_type = status & 0xF0;
        let channel = status & 0x0F;

        match msg_type {
            NOTE_OFF if data.len() >= 3 => Some(MidiMessage::NoteOff {
                channel,
                note: data[1] & 0x7F,
                velocity: data[2] & 0x7F,
            }),
            NOTE_ON if data.len() >= 3 => {
                let velocity = data[2] & 0x7F;
                // Note On with velocity 0 is equivalent to Note Off
                if velocity == 0 {
                    Some(MidiMessage::NoteOff {
                        channel,
                        note: data[1] & 0x7F,
                        velocity: 0,
                    })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: data[1] & 0x7F,
                        velocity,
                    })
                }
            }
            _ => Some(MidiMessage::Other(data.to_vec())),
        }
    }

    /// Whether the message passes a 1-16 channel filter; unset passes all
    pub fn matches_channel(&self, filter: Option<u8>) -> bool {
        match (filter, self) {
            (None, _) => true,
            (Some(wanted), MidiMessage::NoteOn { channel, .. })
            | (Some(wanted), MidiMessage::NoteOff { channel, .. }) => channel + 1 == wanted,
            (Some(_), MidiMessage::Other(_)) => false,
        }
    }

    /// Convert to a transport event, stamped with `timestamp_ms`
    pub fn to_keyboard_event(&self, timestamp_ms: u64) -> Option<RawKeyboardEvent> {
        match *self {
            MidiMessage::NoteOn { note, .. } => Some(RawKeyboardEvent::NoteOn(RawNote::from_number(
                note,
                timestamp_ms,
            ))),
            MidiMessage::NoteOff { note, .. } => Some(RawKeyboardEvent::NoteOff(
                RawNote::from_number(note, timestamp_ms),
            )),
            MidiMessage::Other(_) => None,
        }
    }
}

/// A connection change implied by a fresh scan of the port list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortChange {
    Connect(String),
    Disconnect(String),
}

/// Port selection across hot-plug events.
///
/// The connected port is kept for as long as it stays in the port list.
/// Once it is gone, or while nothing is connected, the configured rule picks
/// a port: explicit index, then name match, then the first port.
#[derive(Debug, Clone)]
pub struct PortWatch {
    device: MidiDeviceConfig,
    current: Option<String>,
}

impl PortWatch {
    pub fn new(device: MidiDeviceConfig) -> Self {
        Self {
            device,
            current: None,
        }
    }

    /// Name of the port currently connected
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Index of the port the configured rule picks from `names`
    pub fn select(&self, names: &[String]) -> Option<usize> {
        if let Some(index) = self.device.source {
            (index < names.len()).then_some(index)
        } else if let Some(wanted) = &self.device.device {
            names.iter().position(|name| name.contains(wanted.as_str()))
        } else if names.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Changes implied by the current port list, in the order to report them
    pub fn observe(&mut self, names: &[String]) -> Vec<PortChange> {
        let mut changes = Vec::new();

        if let Some(current) = &self.current {
            if names.iter().any(|name| name == current) {
                return changes;
            }
            changes.push(PortChange::Disconnect(current.clone()));
            self.current = None;
        }

        if let Some(index) = self.select(names) {
            let name = names[index].clone();
            self.current = Some(name.clone());
            changes.push(PortChange::Connect(name));
        }

        changes
    }

    /// Forget a port that could not be opened; the next scan retries it
    pub fn connect_failed(&mut self) {
        self.current = None;
    }
}

type SharedConnection = Arc<Mutex<Option<MidiInputConnection<()>>>>;

/// Keyboard transport over `midir` input ports.
///
/// The port list is polled for the whole session. Subscribing succeeds with
/// no device attached; the stream stays silent until a matching port shows
/// up, and an unplugged keyboard is reopened when it comes back.
pub struct MidirTransport {
    device: MidiDeviceConfig,
    clock: SessionClock,
    connection: SharedConnection,
    subscribed: bool,
    stop: Arc<AtomicBool>,
}

impl MidirTransport {
    /// Create a transport for the configured device; nothing is opened
    /// until [`KeyboardTransport::subscribe`]
    pub fn new(device: MidiDeviceConfig, clock: SessionClock) -> Self {
        Self {
            device,
            clock,
            connection: Arc::new(Mutex::new(None)),
            subscribed: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl KeyboardTransport for MidirTransport {
    fn subscribe(&mut self) -> Result<EventStream> {
        if self.subscribed {
            return Err(anyhow!("MIDI transport already subscribed"));
        }

        let probe = MidiInput::new("Compositor Probe")
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = PresenceWatch {
            ports: PortWatch::new(self.device.clone()),
            clock: self.clock,
            connection: self.connection.clone(),
            stop: self.stop.clone(),
            tx,
        };
        thread::spawn(move || watcher.run(probe));

        self.subscribed = true;
        Ok(rx)
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Ok(mut slot) = self.connection.lock() {
            if let Some(connection) = slot.take() {
                let _ = connection.close();
                debug!("MIDI input closed");
            }
        }
    }
}

impl Drop for MidirTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background loop that follows the port list and swaps connections
struct PresenceWatch {
    ports: PortWatch,
    clock: SessionClock,
    connection: SharedConnection,
    stop: Arc<AtomicBool>,
    tx: UnboundedSender<RawKeyboardEvent>,
}

impl PresenceWatch {
    fn run(mut self, probe: MidiInput) {
        let mut waiting_logged = false;

        while !self.stop.load(Ordering::SeqCst) {
            for change in self.ports.observe(&port_names(&probe)) {
                match change {
                    PortChange::Connect(name) => self.connect(name),
                    PortChange::Disconnect(name) => {
                        self.release();
                        info!(device = %name, "MIDI input disconnected");
                        let _ = self.tx.send(RawKeyboardEvent::Disconnected(name));
                    }
                }
            }

            let waiting = self.ports.current().is_none();
            if waiting && !waiting_logged {
                info!("waiting for a MIDI input");
            }
            waiting_logged = waiting;

            thread::sleep(PRESENCE_POLL);
        }
    }

    fn connect(&mut self, name: String) {
        match self.open(&name) {
            Ok(connection) => {
                let Ok(mut slot) = self.connection.lock() else {
                    self.ports.connect_failed();
                    return;
                };
                if self.stop.load(Ordering::SeqCst) {
                    let _ = connection.close();
                    return;
                }
                if let Some(previous) = slot.replace(connection) {
                    let _ = previous.close();
                }
                info!(device = %name, "MIDI input connected");
                let _ = self.tx.send(RawKeyboardEvent::Connected(name));
            }
            Err(e) => {
                warn!(device = %name, "MIDI input unavailable: {}", e);
                self.ports.connect_failed();
            }
        }
    }

    fn open(&self, name: &str) -> Result<MidiInputConnection<()>> {
        let mut midi_in = MidiInput::new("Compositor Input")
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
        midi_in.ignore(Ignore::All);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map_or(false, |n| n == name))
            .ok_or_else(|| anyhow!("MIDI device '{}' not found", name))?;

        let clock = self.clock;
        let channel_filter = self.ports.device.input_channel;
        let note_tx = self.tx.clone();
        midi_in
            .connect(
                &port,
                "compositor-input",
                move |_timestamp_us, data, _| {
                    let event = MidiMessage::parse(data)
                        .filter(|msg| msg.matches_channel(channel_filter))
                        .and_then(|msg| msg.to_keyboard_event(clock.now_ms()));
                    if let Some(event) = event {
                        let _ = note_tx.send(event);
                    }
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to source: {}", e))
    }

    fn release(&mut self) {
        if let Ok(mut slot) = self.connection.lock() {
            if let Some(connection) = slot.take() {
                let _ = connection.close();
            }
        }
    }
}

/// Port names in port order; unreadable names get a placeholder so that
/// indices stay aligned
fn port_names(midi_in: &MidiInput) -> Vec<String> {
    midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(i, port)| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown {}", i))
        })
        .collect()
}

/// List all available MIDI sources
pub fn list_sources() -> Result<Vec<(usize, String)>> {
    let midi_in = MidiInput::new("Compositor Scanner")
        .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;

    Ok(port_names(&midi_in).into_iter().enumerate().collect())
}

/// Print all available MIDI sources to stdout
pub fn print_sources() -> Result<()> {
    let sources = list_sources()?;
    if sources.is_empty() {
        println!("No MIDI sources found.");
    } else {
        println!("Available MIDI sources (inputs):");
        for (i, name) in sources {
            println!("  {}: {}", i, name);
        }
    }
    Ok(())
}
