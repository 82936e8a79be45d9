//! Station connection sequencer
//!
//! Joins the configured access point and turns the radio's asynchronous lifecycle events
//! into one blocking success/failure result. Events arrive through an [`EventSink`]
//! handed to the radio; the sequencer drains them on the calling thread until either
//! the success or the failure signal is raised.

use log::{debug, info, warn};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::config::WiFiConfig;
use crate::error::{Error, Result};
use crate::indicator::StatusIndicator;
use crate::mac::MacAddress;

/// Station and network lifecycle events delivered by the radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationEvent {
    /// Station mode started; the first connection attempt may begin
    Started,
    /// Association lost or an attempt failed
    Disconnected,
    /// DHCP gave the station an address
    AddressAcquired(Ipv4Addr),
}

/// Sending half of the event channel, registered with the radio before it starts
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<StationEvent>,
}

impl EventSink {
    /// Forward an event to the sequencer.
    ///
    /// Events delivered after the sequencer returned are dropped.
    pub fn deliver(&self, event: StationEvent) {
        if self.tx.send(event).is_err() {
            debug!("Dropping {:?}: sequencer no longer listening", event);
        }
    }
}

/// Radio collaborator driven by the sequencer
pub trait StationRadio {
    /// Keeps the event observers registered while alive
    type Subscription;

    /// Register observers for station and network lifecycle events
    fn subscribe(&mut self, sink: EventSink) -> Result<Self::Subscription>;

    /// Put the radio in station mode with the given credentials and start it
    fn begin_station_mode(&mut self, config: &WiFiConfig) -> Result<()>;

    /// Start one association attempt
    fn connect(&mut self) -> Result<()>;

    /// Primary channel of the associated access point
    fn primary_channel(&self) -> Result<u8>;

    /// Station hardware address
    fn read_local_address(&self) -> Result<MacAddress>;
}

/// Result of one sequencer run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// Associated and addressed; ESP-NOW has to use the same channel
    Connected { channel: u8, local_mac: MacAddress },
    /// Retry ceiling reached
    Failed,
}

impl ConnectionOutcome {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionOutcome::Connected { .. })
    }

    /// Channel to use for ESP-NOW peers; 0 means "whatever the radio is on"
    pub fn channel(&self) -> u8 {
        match self {
            ConnectionOutcome::Connected { channel, .. } => *channel,
            ConnectionOutcome::Failed => 0,
        }
    }
}

impl fmt::Display for ConnectionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionOutcome::Connected { channel, local_mac } => {
                write!(f, "connected on channel {} as {}", channel, local_mac)
            }
            ConnectionOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// Result flags raised by event handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Success,
    Failure,
}

/// Two-flag result set. Only the first raise counts.
#[derive(Debug, Default)]
pub struct SignalChannel {
    raised: Option<Signal>,
}

impl SignalChannel {
    /// Raise a flag; returns false if a flag was already set
    pub fn raise(&mut self, signal: Signal) -> bool {
        if self.raised.is_some() {
            return false;
        }
        self.raised = Some(signal);
        true
    }

    pub fn raised(&self) -> Option<Signal> {
        self.raised
    }

    pub fn is_set(&self, signal: Signal) -> bool {
        self.raised == Some(signal)
    }
}

/// Sequencer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Connecting,
    Retrying,
    Connected,
    Failed,
}

/// Drives station association with a flat immediate-retry policy
pub struct ConnectionSequencer<'a, I: StatusIndicator> {
    config: &'a WiFiConfig,
    retries_used: u32,
    state: SequencerState,
    signals: SignalChannel,
    indicator: I,
}

impl<'a, I: StatusIndicator> ConnectionSequencer<'a, I> {
    /// Create a sequencer; `indicator` is pulsed once per retry
    pub fn new(config: &'a WiFiConfig, indicator: I) -> Self {
        Self {
            config,
            retries_used: 0,
            state: SequencerState::Idle,
            signals: SignalChannel::default(),
            indicator,
        }
    }

    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn signals(&self) -> &SignalChannel {
        &self.signals
    }

    /// Join the access point and block until connected or out of retries.
    ///
    /// There is no timeout: if the radio never reports a lifecycle event this waits forever.
    /// Radio setup errors are returned as `Err` and are meant to be fatal.
    pub fn run<R: StationRadio>(&mut self, radio: &mut R) -> Result<ConnectionOutcome> {
        // Each run starts from a clean attempt; nothing carries over from a previous result
        self.signals = SignalChannel::default();
        self.retries_used = 0;
        self.state = SequencerState::Idle;

        let (tx, rx) = mpsc::channel();
        let subscription = radio.subscribe(EventSink { tx })?;

        radio.begin_station_mode(self.config)?;
        info!("STA initialization complete");

        let waited = self.wait_for_signal(radio, &rx);

        // Unregister before inspecting the result so no late event reaches a finished run
        drop(subscription);
        drop(rx);

        let signal = waited?;
        match signal {
            Signal::Success => {
                info!("Connected to ap");
                let channel = radio.primary_channel()?;
                let local_mac = radio.read_local_address()?;
                info!("ESP32 MAC: {}", local_mac);
                info!("AP channel: {}", channel);
                Ok(ConnectionOutcome::Connected { channel, local_mac })
            }
            Signal::Failure => {
                info!("Failed to connect to ap");
                Ok(ConnectionOutcome::Failed)
            }
        }
    }

    fn wait_for_signal<R: StationRadio>(
        &mut self,
        radio: &mut R,
        rx: &Receiver<StationEvent>,
    ) -> Result<Signal> {
        loop {
            if let Some(signal) = self.signals.raised() {
                return Ok(signal);
            }
            let event = rx.recv().map_err(|_| {
                Error::WiFiError("station event stream closed before a result".to_string())
            })?;
            self.handle_event(event, radio);
        }
    }

    /// Apply one lifecycle event. Events after a signal was raised are ignored.
    pub fn handle_event<R: StationRadio>(&mut self, event: StationEvent, radio: &mut R) {
        if self.signals.raised().is_some() {
            debug!("Ignoring {:?} after result was signaled", event);
            return;
        }

        match event {
            StationEvent::Started => {
                info!("Connecting to AP...");
                self.state = SequencerState::Connecting;
                Self::attempt(radio);
            }
            StationEvent::Disconnected => {
                if self.retries_used < self.config.max_retries {
                    info!(
                        "Reconnecting to AP... (retry {}/{})",
                        self.retries_used + 1,
                        self.config.max_retries
                    );
                    self.state = SequencerState::Retrying;
                    Self::attempt(radio);
                    self.retries_used += 1;
                    self.indicator.pulse();
                } else {
                    warn!("Giving up after {} retries", self.retries_used);
                    self.state = SequencerState::Failed;
                    self.signals.raise(Signal::Failure);
                }
            }
            StationEvent::AddressAcquired(ip) => {
                info!("STA IP: {}", ip);
                self.retries_used = 0;
                self.state = SequencerState::Connected;
                self.signals.raise(Signal::Success);
            }
        }
    }

    // The next disconnect event drives the retry; a refused request only gets logged.
    fn attempt<R: StationRadio>(radio: &mut R) {
        if let Err(e) = radio.connect() {
            warn!("WiFi connect request failed: {}", e);
        }
    }
}
