//! Base station image: joins the access point, serves TCP on port 5000 and receives
//! ESP-NOW frames from the slave.

#[cfg(target_os = "espidf")]
use esp_idf_sys as _; // If using the `binstart` feature of `esp-idf-sys`, always keep this module imported

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    image::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "base_station only runs on ESP-IDF targets (cargo build --target riscv32imc-esp-espidf)"
    );
    std::process::exit(1);
}

#[cfg(target_os = "espidf")]
mod image {
    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
    use log::{error, info};
    use std::thread;
    use std::time::Duration;

    use espnow_link::{
        config::create_config,
        indicator::LedIndicator,
        peer::{spawn_inbox, EspPeerLink, PeerInbox},
        sequencer::ConnectionSequencer,
        tcp_server::TcpServer,
        wifi::EspStationRadio,
    };

    pub fn run() -> anyhow::Result<()> {
        // Initialize the ESP-IDF system
        esp_idf_sys::link_patches();

        // Configure logging
        esp_idf_svc::log::EspLogger::initialize_default();
        info!("Base station starting up...");

        let config = create_config()?;
        info!("Configuration loaded");

        let peripherals = Peripherals::take()?;
        let wifi_led = LedIndicator::new(peripherals.pins.gpio13.downgrade_output(), "wifi")?;
        let mut peer_led =
            LedIndicator::new(peripherals.pins.gpio12.downgrade_output(), "esp-now")?;

        // Any failure from here to the end of the connection attempt is fatal
        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let mut radio = EspStationRadio::new(peripherals.modem, sysloop, nvs)?;

        let outcome = ConnectionSequencer::new(&config.wifi, &mut peer_led).run(&mut radio)?;
        info!("Connect wifi: {}", outcome);

        // Services start even without a connection, the outcome is only logged
        let peer_link = EspPeerLink::take()?;
        let (sink, inbox) = PeerInbox::new(peer_led);
        peer_link.forward_received(sink)?;
        let _inbox = spawn_inbox(inbox)?;

        info!("Starting TCP server on port {}...", config.tcp_server.port);
        let mut tcp_server = TcpServer::new(config.tcp_server, wifi_led);
        let server_thread = thread::Builder::new()
            .name("tcp_server".into())
            .stack_size(8192)
            .spawn(move || {
                info!("TCP server thread started");
                if let Err(e) = tcp_server.run() {
                    error!("TCP server error: {}", e);
                }
            })?;

        if server_thread.join().is_err() {
            error!("TCP server thread panicked");
        }

        // Keep the radio and ESP-NOW alive for the inbox
        loop {
            thread::sleep(Duration::from_secs(60));
            info!("Still listening for ESP-NOW frames (wifi {})", outcome);
        }
    }
}
