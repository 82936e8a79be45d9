//! ESP-NOW peer messaging
//!
//! The slave sends a short text frame to the base station on a fixed interval. The base
//! station forwards received frames from the radio callback into a bounded channel and a
//! separate inbox thread logs them and pulses the peer LED, so the radio task never
//! blocks on the LED.

use log::{error, info, warn};
use std::borrow::Cow;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread;

use crate::config::PeerConfig;
use crate::error::{Error, Result};
use crate::indicator::StatusIndicator;
use crate::mac::MacAddress;

/// Frames buffered between the receive callback and the inbox thread
pub const INBOX_CAPACITY: usize = 8;

/// Connectionless radio transport addressed by hardware address
pub trait PeerTransport {
    /// Register an unencrypted peer on `channel` (0 = current channel)
    fn add_peer(&mut self, peer: MacAddress, channel: u8) -> Result<()>;

    /// Queue one frame for `peer`
    fn send(&mut self, peer: MacAddress, payload: &[u8]) -> Result<()>;
}

/// A received peer-to-peer frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerFrame {
    pub source: MacAddress,
    pub payload: Vec<u8>,
}

impl PeerFrame {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl std::fmt::Display for PeerFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Received from MAC {}: {}", self.source, self.text())
    }
}

/// Log line for a send completion reported by the radio
pub fn describe_send_status(peer: MacAddress, success: bool) -> String {
    format!("Sent to MAC {} - Status: {}", peer, if success { "Success" } else { "Fail" })
}

/// Periodic sender used by the slave node
pub struct PeerSender<T: PeerTransport> {
    transport: T,
    config: PeerConfig,
}

impl<T: PeerTransport> PeerSender<T> {
    /// Register the configured peer on `channel` and return a sender for it
    pub fn new(mut transport: T, config: PeerConfig, channel: u8) -> Result<Self> {
        transport.add_peer(config.peer_address, channel)?;
        info!("ESP-NOW peer {} added on channel {}", config.peer_address, channel);
        Ok(Self { transport, config })
    }

    /// Send the payload once
    pub fn send_once(&mut self) -> Result<()> {
        self.transport.send(self.config.peer_address, self.config.payload.as_bytes())
    }

    /// Send forever; failures are logged and the next interval tries again
    pub fn run(&mut self) -> Result<()> {
        loop {
            if let Err(e) = self.send_once() {
                error!("Failed to send to {}: {}", self.config.peer_address, e);
            }
            thread::sleep(self.config.send_interval);
        }
    }

    #[cfg(test)]
    fn transport(&self) -> &T {
        &self.transport
    }
}

/// Non-blocking handle given to the radio receive callback
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: SyncSender<PeerFrame>,
}

impl FrameSink {
    /// Hand a frame to the inbox. Returns false if it was dropped.
    pub fn push(&self, frame: PeerFrame) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!("Peer inbox full, dropping frame from {}", frame.source);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving side used by the base station
pub struct PeerInbox<L: StatusIndicator> {
    rx: Receiver<PeerFrame>,
    indicator: L,
}

impl<L: StatusIndicator> PeerInbox<L> {
    /// Create the inbox and the sink feeding it
    pub fn new(indicator: L) -> (FrameSink, Self) {
        let (tx, rx) = mpsc::sync_channel(INBOX_CAPACITY);
        (FrameSink { tx }, Self { rx, indicator })
    }

    /// Log and signal frames until every sink is dropped. Returns the number handled.
    pub fn run(mut self) -> usize {
        let mut handled = 0;
        while let Ok(frame) = self.rx.recv() {
            info!("{}", frame);
            self.indicator.pulse();
            handled += 1;
        }
        handled
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspPeerLink;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::espnow::{EspNow, PeerInfo, ReceiveInfo, SendStatus};
    use esp_idf_sys::wifi_interface_t_WIFI_IF_STA;
    use log::{info, warn};

    use super::{describe_send_status, FrameSink, PeerFrame, PeerTransport};
    use crate::error::Result;
    use crate::mac::MacAddress;

    /// ESP-NOW on the station interface
    pub struct EspPeerLink {
        espnow: EspNow<'static>,
    }

    impl EspPeerLink {
        /// Initialise ESP-NOW; WiFi must already be started
        pub fn take() -> Result<Self> {
            let espnow = EspNow::take()?;
            info!("esp_now initialised");
            Ok(Self { espnow })
        }

        /// Forward every received frame into `sink`
        pub fn forward_received(&self, sink: FrameSink) -> Result<()> {
            self.espnow.register_recv_cb(move |info: &ReceiveInfo, data: &[u8]| {
                match MacAddress::try_from(&info.src_addr[..]) {
                    Ok(source) => {
                        sink.push(PeerFrame {
                            source,
                            payload: data.to_vec(),
                        });
                    }
                    Err(e) => warn!("Dropping ESP-NOW frame: {}", e),
                }
            })?;
            Ok(())
        }

        /// Log the delivery status of every sent frame
        pub fn log_send_status(&self) -> Result<()> {
            self.espnow.register_send_cb(|mac: &[u8], status: SendStatus| {
                let success = matches!(status, SendStatus::SUCCESS);
                match MacAddress::try_from(mac) {
                    Ok(peer) => info!("{}", describe_send_status(peer, success)),
                    Err(e) => warn!("Send status for malformed address: {}", e),
                }
            })?;
            Ok(())
        }
    }

    impl PeerTransport for EspPeerLink {
        fn add_peer(&mut self, peer: MacAddress, channel: u8) -> Result<()> {
            self.espnow.add_peer(PeerInfo {
                peer_addr: peer.octets(),
                channel,
                ifidx: wifi_interface_t_WIFI_IF_STA,
                encrypt: false,
                ..Default::default()
            })?;
            Ok(())
        }

        fn send(&mut self, peer: MacAddress, payload: &[u8]) -> Result<()> {
            self.espnow.send(peer.octets(), payload)?;
            Ok(())
        }
    }
}

/// Spawn the inbox on a named thread
pub fn spawn_inbox<L>(inbox: PeerInbox<L>) -> Result<thread::JoinHandle<usize>>
where
    L: StatusIndicator + Send + 'static,
{
    thread::Builder::new()
        .name("peer_inbox".into())
        .stack_size(4096)
        .spawn(move || inbox.run())
        .map_err(|e| Error::PeerError(format!("Failed to spawn peer inbox thread: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicator::testing::CountingIndicator;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingTransport {
        peers: Vec<(MacAddress, u8)>,
        sent: Vec<(MacAddress, Vec<u8>)>,
        fail_sends: bool,
    }

    impl PeerTransport for RecordingTransport {
        fn add_peer(&mut self, peer: MacAddress, channel: u8) -> Result<()> {
            self.peers.push((peer, channel));
            Ok(())
        }

        fn send(&mut self, peer: MacAddress, payload: &[u8]) -> Result<()> {
            if self.fail_sends {
                return Err(Error::PeerError("no ack".into()));
            }
            self.sent.push((peer, payload.to_vec()));
            Ok(())
        }
    }

    fn config() -> PeerConfig {
        PeerConfig {
            send_interval: Duration::ZERO,
            ..PeerConfig::default()
        }
    }

    #[test]
    fn sender_registers_peer_on_the_station_channel() {
        let sender = PeerSender::new(RecordingTransport::default(), config(), 11).unwrap();
        assert_eq!(sender.transport().peers, vec![(PeerConfig::default().peer_address, 11)]);
    }

    #[test]
    fn send_once_sends_the_payload_to_the_peer() {
        let mut sender = PeerSender::new(RecordingTransport::default(), config(), 6).unwrap();
        sender.send_once().unwrap();
        sender.send_once().unwrap();

        let expected = (PeerConfig::default().peer_address, b"Hello via ESP-NOW".to_vec());
        assert_eq!(sender.transport().sent, vec![expected.clone(), expected]);
    }

    #[test]
    fn send_failure_is_reported() {
        let transport = RecordingTransport {
            fail_sends: true,
            ..Default::default()
        };
        let mut sender = PeerSender::new(transport, config(), 6).unwrap();
        assert!(matches!(sender.send_once(), Err(Error::PeerError(_))));
    }

    #[test]
    fn inbox_handles_frames_until_sinks_drop() {
        let indicator = CountingIndicator::default();
        let (sink, inbox) = PeerInbox::new(indicator.clone());
        let source = MacAddress([1, 2, 3, 4, 5, 6]);

        assert!(sink.push(PeerFrame { source, payload: b"one".to_vec() }));
        assert!(sink.push(PeerFrame { source, payload: b"two".to_vec() }));
        drop(sink);

        assert_eq!(inbox.run(), 2);
        assert_eq!(indicator.pulses(), 2);
    }

    #[test]
    fn full_inbox_drops_instead_of_blocking() {
        let (sink, inbox) = PeerInbox::new(CountingIndicator::default());
        let frame = PeerFrame {
            source: MacAddress::default(),
            payload: vec![0x42],
        };

        for _ in 0..INBOX_CAPACITY {
            assert!(sink.push(frame.clone()));
        }
        assert!(!sink.push(frame));
        drop(inbox);
    }

    #[test]
    fn spawned_inbox_drains_frames() {
        let indicator = CountingIndicator::default();
        let (sink, inbox) = PeerInbox::new(indicator.clone());
        let handle = spawn_inbox(inbox).unwrap();

        sink.push(PeerFrame {
            source: MacAddress([0xd8, 0x13, 0x2a, 0x7f, 0xab, 0x24]),
            payload: b"Hello via ESP-NOW".to_vec(),
        });
        drop(sink);

        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(indicator.pulses(), 1);
    }

    #[test]
    fn log_lines_match_the_wire_format() {
        let frame = PeerFrame {
            source: MacAddress([0xd8, 0x13, 0x2a, 0x7f, 0xab, 0x24]),
            payload: b"Hello via ESP-NOW".to_vec(),
        };
        assert_eq!(frame.to_string(), "Received from MAC D8:13:2A:7F:AB:24: Hello via ESP-NOW");
        assert_eq!(
            describe_send_status(frame.source, false),
            "Sent to MAC D8:13:2A:7F:AB:24 - Status: Fail"
        );
    }
}
