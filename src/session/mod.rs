// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live analysis session.
//!
//! A session owns the keyboard transport and runs one task per reducer. The
//! dispatcher is the only reader of the transport stream; it decodes each
//! event and forwards note events, in order, to every reducer. Reducer
//! output lands in `watch` channels, so consumers always see the latest
//! value.
//!
//! ```text
//! transport ─▶ dispatcher ─┬─▶ pressed  ─▶ debounce ─▶ pressed map
//!                          ├─▶ scanner  ─────────────▶ scanned notes
//!                          └─▶ duration ─▶ debounce ─▶ durations ─▶ key
//! ```

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::analysis::{classify, display_key, KeyEstimate};
use crate::config::AnalysisConfig;
use crate::midi::{EventStream, KeyboardEvent, KeyboardTransport};
use crate::music::Note;
use crate::timing::SessionClock;
use crate::tracking::debounce::until;
use crate::tracking::{
    Debouncer, DurationAccumulator, DurationMap, PressedNotesMap, PressedNotesTracker,
    RecencyScanner,
};

/// Input device state as last reported by the transport
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Nothing reported yet
    #[default]
    Unavailable,
    Connected(String),
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected(_))
    }

    /// Name of the current or last device
    pub fn device(&self) -> Option<&str> {
        match self {
            ConnectionStatus::Connected(name) | ConnectionStatus::Disconnected(name) => Some(name),
            ConnectionStatus::Unavailable => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Unavailable => write!(f, "no device"),
            ConnectionStatus::Connected(name) => write!(f, "connected: {}", name),
            ConnectionStatus::Disconnected(name) => write!(f, "disconnected: {}", name),
        }
    }
}

/// Latest-value views of every reducer output
#[derive(Debug, Clone)]
pub struct SessionOutputs {
    pub pressed: watch::Receiver<PressedNotesMap>,
    pub scanned: watch::Receiver<Vec<Note>>,
    pub durations: watch::Receiver<DurationMap>,
    pub key: watch::Receiver<Option<KeyEstimate>>,
    pub connection: watch::Receiver<ConnectionStatus>,
}

#[derive(Debug, Clone, Copy)]
enum DurationCommand {
    Tick,
    Reset,
}

/// Runtime controls for a running session.
///
/// Every method returns `false` once the session has stopped.
#[derive(Debug, Clone)]
pub struct SessionControl {
    maximum_notes: UnboundedSender<usize>,
    durations: UnboundedSender<DurationCommand>,
}

impl SessionControl {
    /// Change how many recent notes the scanner keeps
    pub fn set_maximum_notes(&self, maximum_notes: usize) -> bool {
        self.maximum_notes.send(maximum_notes).is_ok()
    }

    /// Forget held notes and zero the accumulated durations
    pub fn reset(&self) -> bool {
        self.durations.send(DurationCommand::Reset).is_ok()
    }

    /// Credit held notes now, in addition to the periodic tick
    pub fn tick(&self) -> bool {
        self.durations.send(DurationCommand::Tick).is_ok()
    }
}

/// A running analysis session over one keyboard transport
pub struct Session<T: KeyboardTransport> {
    transport: T,
    control: SessionControl,
    outputs: SessionOutputs,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: KeyboardTransport> Session<T> {
    /// Subscribe to `transport` and spawn the reducer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(mut transport: T, config: &AnalysisConfig, clock: SessionClock) -> Result<Self> {
        let stream = transport
            .subscribe()
            .context("Failed to subscribe to keyboard transport")?;

        let (pressed_tx, pressed_rx) = watch::channel(PressedNotesMap::default());
        let (scanned_tx, scanned_rx) = watch::channel(Vec::new());
        let (durations_tx, durations_rx) = watch::channel(DurationMap::default());
        let (key_tx, key_rx) = watch::channel(None);
        let (connection_tx, connection_rx) = watch::channel(ConnectionStatus::Unavailable);

        let (pressed_events, pressed_inbox) = mpsc::unbounded_channel();
        let (scanner_events, scanner_inbox) = mpsc::unbounded_channel();
        let (duration_events, duration_inbox) = mpsc::unbounded_channel();
        let (limit_tx, limit_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let durations = DurationTask {
            window: config.debounce(),
            tick_interval: config.tick_interval(),
            clock,
            output: durations_tx,
            key: key_tx,
        };

        let tasks = vec![
            tokio::spawn(dispatch(
                stream,
                vec![
                    ("pressed", pressed_events),
                    ("scanner", scanner_events),
                    ("durations", duration_events),
                ],
                connection_tx,
            )),
            tokio::spawn(run_pressed(pressed_inbox, pressed_tx, config.debounce())),
            tokio::spawn(run_scanner(
                scanner_inbox,
                limit_rx,
                scanned_tx,
                config.maximum_notes,
            )),
            tokio::spawn(durations.run(duration_inbox, command_rx)),
        ];

        info!(
            maximum_notes = config.maximum_notes,
            tick_interval_ms = config.tick_interval_ms,
            debounce_ms = config.debounce_ms,
            "analysis session started"
        );

        Ok(Self {
            transport,
            control: SessionControl {
                maximum_notes: limit_tx,
                durations: command_tx,
            },
            outputs: SessionOutputs {
                pressed: pressed_rx,
                scanned: scanned_rx,
                durations: durations_rx,
                key: key_rx,
                connection: connection_rx,
            },
            tasks,
        })
    }

    pub fn outputs(&self) -> SessionOutputs {
        self.outputs.clone()
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    /// Close the transport and wait for every task to drain.
    ///
    /// Pending debounced values are published before the tasks exit. The
    /// stream only ends once every sender feeding it is gone, so callers
    /// holding a sender of their own must drop it first.
    pub async fn shutdown(mut self) -> Result<()> {
        self.transport.close();
        for task in self.tasks.drain(..) {
            task.await.context("Session task failed")?;
        }
        info!("analysis session stopped");
        Ok(())
    }
}

async fn dispatch(
    mut stream: EventStream,
    mut reducers: Vec<(&'static str, UnboundedSender<KeyboardEvent>)>,
    connection: watch::Sender<ConnectionStatus>,
) {
    while let Some(raw) = stream.recv().await {
        let event = match KeyboardEvent::try_from(raw) {
            Ok(event) => event,
            Err(e) => {
                error!("dropping undecodable keyboard event: {}", e);
                continue;
            }
        };

        match &event {
            KeyboardEvent::Connected(name) => {
                update_connection(&connection, ConnectionStatus::Connected(name.clone()))
            }
            KeyboardEvent::Disconnected(name) => {
                update_connection(&connection, ConnectionStatus::Disconnected(name.clone()))
            }
            KeyboardEvent::NoteOn(_) | KeyboardEvent::NoteOff(_) => fan_out(&mut reducers, &event),
        }
    }
    debug!("keyboard stream ended");
}

/// Send a note event to every reducer, dropping any whose task has exited
fn fan_out(reducers: &mut Vec<(&'static str, UnboundedSender<KeyboardEvent>)>, event: &KeyboardEvent) {
    reducers.retain(|(name, reducer)| match reducer.send(event.clone()) {
        Ok(()) => true,
        Err(_) => {
            error!(reducer = *name, "reducer stopped, its output no longer updates");
            false
        }
    });
}

fn update_connection(connection: &watch::Sender<ConnectionStatus>, status: ConnectionStatus) {
    connection.send_if_modified(|current| {
        if *current == status {
            return false;
        }
        info!(status = %status, "keyboard connection changed");
        *current = status;
        true
    });
}

async fn run_pressed(
    mut inbox: UnboundedReceiver<KeyboardEvent>,
    output: watch::Sender<PressedNotesMap>,
    window: Duration,
) {
    let mut tracker = PressedNotesTracker::new();
    let mut debouncer = Debouncer::with_initial(window, *tracker.pressed());

    loop {
        tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => {
                    if tracker.apply(&event) {
                        debouncer.offer(*tracker.pressed(), Instant::now());
                    }
                }
                None => break,
            },
            _ = until(debouncer.deadline()) => {
                if let Some(pressed) = debouncer.flush() {
                    debug!(notes = ?tracker.pressed_notes(), "pressed notes changed");
                    output.send_replace(pressed);
                }
            }
        }
    }

    if let Some(pressed) = debouncer.flush() {
        output.send_replace(pressed);
    }
}

async fn run_scanner(
    mut inbox: UnboundedReceiver<KeyboardEvent>,
    mut limits: UnboundedReceiver<usize>,
    output: watch::Sender<Vec<Note>>,
    maximum_notes: usize,
) {
    let mut scanner = RecencyScanner::new(maximum_notes);
    let mut limits_open = true;

    loop {
        let changed = tokio::select! {
            event = inbox.recv() => match event {
                Some(event) => scanner.apply(&event),
                None => break,
            },
            limit = limits.recv(), if limits_open => match limit {
                Some(limit) => {
                    debug!(maximum_notes = limit, "scanner limit changed");
                    scanner.set_maximum_notes(limit);
                    true
                }
                None => {
                    limits_open = false;
                    false
                }
            },
        };

        if changed {
            if let Some(scanned) = scanner.refresh() {
                debug!(notes = ?scanned, "scanned notes changed");
                output.send_replace(scanned);
            }
        }
    }
}

struct DurationTask {
    window: Duration,
    tick_interval: Option<Duration>,
    clock: SessionClock,
    output: watch::Sender<DurationMap>,
    key: watch::Sender<Option<KeyEstimate>>,
}

impl DurationTask {
    async fn run(
        self,
        mut inbox: UnboundedReceiver<KeyboardEvent>,
        mut commands: UnboundedReceiver<DurationCommand>,
    ) {
        let mut accumulator = DurationAccumulator::new();
        let mut debouncer = Debouncer::with_initial(self.window, *accumulator.totals());
        let mut ticker = self.tick_interval.map(|period| {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });
        let mut commands_open = true;

        loop {
            let accepted = tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => accumulator.apply(&event),
                    None => break,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(DurationCommand::Tick) => accumulator.tick(self.clock.now_ms()),
                    Some(DurationCommand::Reset) => accumulator.reset(),
                    None => {
                        commands_open = false;
                        false
                    }
                },
                _ = next_tick(&mut ticker) => accumulator.tick(self.clock.now_ms()),
                _ = until(debouncer.deadline()) => {
                    if let Some(durations) = debouncer.flush() {
                        self.publish(durations);
                    }
                    false
                }
            };

            if accepted {
                debouncer.offer(*accumulator.totals(), Instant::now());
            }
        }

        if let Some(durations) = debouncer.flush() {
            self.publish(durations);
        }
    }

    fn publish(&self, durations: DurationMap) {
        debug!(durations = ?durations.c_based(), "durations changed");
        let estimate = classify(&durations);
        self.output.send_replace(durations);

        self.key.send_if_modified(|current| {
            if *current == estimate {
                return false;
            }
            let label = |key: &Option<KeyEstimate>| key.map(|k| (k.tonic, k.mode));
            if label(current) != label(&estimate) {
                info!(key = %display_key(estimate.as_ref()), "key estimate changed");
            }
            *current = estimate;
            true
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{ChannelTransport, RawKeyboardEvent, RawNote};

    fn config(tick_interval_ms: u64, debounce_ms: u64) -> AnalysisConfig {
        AnalysisConfig {
            maximum_notes: 7,
            tick_interval_ms,
            debounce_ms,
        }
    }

    fn note_on(number: u8, time: u64) -> RawKeyboardEvent {
        RawKeyboardEvent::NoteOn(RawNote::from_number(number, time))
    }

    fn note_off(number: u8, time: u64) -> RawKeyboardEvent {
        RawKeyboardEvent::NoteOff(RawNote::from_number(number, time))
    }

    async fn settle() {
        time::sleep(Duration::from_millis(100)).await;
    }

    #[test]
    fn test_fan_out_drops_stopped_reducer() {
        let (live_tx, mut live_rx) = mpsc::unbounded_channel();
        let (dead_tx, dead_rx) = mpsc::unbounded_channel();
        drop(dead_rx);
        let mut reducers = vec![("pressed", live_tx), ("scanner", dead_tx)];

        let event = KeyboardEvent::NoteOn(crate::midi::MidiNote::from_number(60, 0).unwrap());
        fan_out(&mut reducers, &event);
        assert_eq!(reducers.len(), 1);
        assert_eq!(reducers[0].0, "pressed");
        assert_eq!(live_rx.try_recv().unwrap(), event);

        // Later events still reach the remaining reducer
        fan_out(&mut reducers, &event);
        assert_eq!(live_rx.try_recv().unwrap(), event);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pressed_map_waits_for_quiet_period() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let outputs = session.outputs();

        tx.send(note_on(60, 0)).unwrap();
        tx.send(note_on(64, 0)).unwrap();

        time::sleep(Duration::from_millis(5)).await;
        assert!(!outputs.pressed.borrow()[Note::C]);

        time::sleep(Duration::from_millis(30)).await;
        let pressed = *outputs.pressed.borrow();
        assert!(pressed[Note::C]);
        assert!(pressed[Note::E]);
        assert!(!pressed[Note::D]);

        tx.send(note_off(60, 40)).unwrap();
        settle().await;
        assert!(!outputs.pressed.borrow()[Note::C]);
        assert!(outputs.pressed.borrow()[Note::E]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_durations_and_key_after_sharp_then_natural() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let outputs = session.outputs();

        tx.send(note_on(61, 0)).unwrap();
        tx.send(note_off(61, 300)).unwrap();
        tx.send(note_on(60, 300)).unwrap();
        tx.send(note_off(60, 1000)).unwrap();
        settle().await;

        let durations = *outputs.durations.borrow();
        assert_eq!(durations[Note::Cs], 300);
        assert_eq!(durations[Note::C], 700);
        assert_eq!(*outputs.key.borrow(), classify(&durations));
        assert!(outputs.key.borrow().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scanner_follows_runtime_limit() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let outputs = session.outputs();
        let control = session.control();

        // C through A, one per 100ms
        for (i, number) in (60u8..70).enumerate() {
            tx.send(note_on(number, i as u64 * 100)).unwrap();
        }
        settle().await;
        assert_eq!(
            *outputs.scanned.borrow(),
            vec![Note::A, Note::Ds, Note::E, Note::F, Note::Fs, Note::G, Note::Gs]
        );

        assert!(control.set_maximum_notes(2));
        settle().await;
        assert_eq!(*outputs.scanned.borrow(), vec![Note::A, Note::Gs]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_event_is_dropped() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let outputs = session.outputs();

        tx.send(RawKeyboardEvent::NoteOn(RawNote {
            name: "H".to_string(),
            number: 71,
            octave: 4,
            timestamp_ms: 0,
        }))
        .unwrap();
        tx.send(note_on(62, 10)).unwrap();
        settle().await;

        assert_eq!(*outputs.scanned.borrow(), vec![Note::D]);
        assert!(!outputs.pressed.borrow()[Note::B]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_status() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let mut connection = session.outputs().connection;
        assert_eq!(*connection.borrow(), ConnectionStatus::Unavailable);

        tx.send(RawKeyboardEvent::Connected("Keys".into())).unwrap();
        connection.changed().await.unwrap();
        assert_eq!(*connection.borrow_and_update(), ConnectionStatus::Connected("Keys".into()));

        // Repeated state is not re-published
        tx.send(RawKeyboardEvent::Connected("Keys".into())).unwrap();
        tx.send(RawKeyboardEvent::Disconnected("Keys".into())).unwrap();
        connection.changed().await.unwrap();
        let status = connection.borrow_and_update().clone();
        assert_eq!(status, ConnectionStatus::Disconnected("Keys".into()));
        assert_eq!(status.device(), Some("Keys"));
        assert!(!status.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_keep_held_durations_live() {
        let clock = SessionClock::start();
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(250, 20), clock).unwrap();
        let outputs = session.outputs();

        tx.send(note_on(60, clock.now_ms())).unwrap();
        time::sleep(Duration::from_millis(600)).await;
        assert_eq!(outputs.durations.borrow()[Note::C], 500);

        tx.send(note_off(60, clock.now_ms())).unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(outputs.durations.borrow()[Note::C], 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_durations_and_key() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), SessionClock::start()).unwrap();
        let outputs = session.outputs();
        let control = session.control();

        tx.send(note_on(67, 0)).unwrap();
        tx.send(note_off(67, 400)).unwrap();
        settle().await;
        assert_eq!(outputs.durations.borrow()[Note::G], 400);

        assert!(control.reset());
        settle().await;
        assert_eq!(*outputs.durations.borrow(), DurationMap::default());
        assert_eq!(*outputs.key.borrow(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_tick() {
        let clock = SessionClock::start();
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 20), clock).unwrap();
        let outputs = session.outputs();

        tx.send(note_on(69, 0)).unwrap();
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(outputs.durations.borrow()[Note::A], 0);

        assert!(session.control().tick());
        settle().await;
        assert_eq!(outputs.durations.borrow()[Note::A], 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_values() {
        let transport = ChannelTransport::new();
        let tx = transport.sender().unwrap();
        let session = Session::start(transport, &config(0, 10_000), SessionClock::start()).unwrap();
        let outputs = session.outputs();
        let control = session.control();

        tx.send(note_on(65, 0)).unwrap();
        tx.send(note_off(65, 120)).unwrap();
        tx.send(note_on(60, 120)).unwrap();
        drop(tx);
        session.shutdown().await.unwrap();

        assert!(outputs.pressed.borrow()[Note::C]);
        assert!(!outputs.pressed.borrow()[Note::F]);
        assert_eq!(outputs.durations.borrow()[Note::F], 120);
        assert!(!control.reset());
    }
}
