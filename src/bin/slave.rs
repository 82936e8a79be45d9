//! Slave image: joins the access point, sends ESP-NOW frames to the base station and
//! runs the TCP client loop.

#[cfg(target_os = "espidf")]
use esp_idf_sys as _; // If using the `binstart` feature of `esp-idf-sys`, always keep this module imported

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    image::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() {
    eprintln!(
        "slave only runs on ESP-IDF targets (cargo build --target riscv32imc-esp-espidf)"
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

    use espnow_link::{
        config::create_config,
        indicator::LedIndicator,
        peer::{EspPeerLink, PeerSender},
        sequencer::ConnectionSequencer,
        tcp_client::TcpClient,
        wifi::EspStationRadio,
    };

    pub fn run() -> anyhow::Result<()> {
        // Initialize the ESP-IDF system
        esp_idf_sys::link_patches();

        // Configure logging
        esp_idf_svc::log::EspLogger::initialize_default();
        info!("Slave node starting up...");

        let config = create_config()?;
        info!("Configuration loaded");

        let peripherals = Peripherals::take()?;
        // The WiFi LED has no TCP role on this node but is still driven low at boot
        let _wifi_led = LedIndicator::new(peripherals.pins.gpio13.downgrade_output(), "wifi")?;
        let mut peer_led =
            LedIndicator::new(peripherals.pins.gpio12.downgrade_output(), "esp-now")?;

        let sysloop = EspSystemEventLoop::take()?;
        let nvs = EspDefaultNvsPartition::take()?;
        let mut radio = EspStationRadio::new(peripherals.modem, sysloop, nvs)?;

        let outcome = ConnectionSequencer::new(&config.wifi, &mut peer_led).run(&mut radio)?;
        info!("Connect wifi: {}", outcome);

        // A failed connection leaves the channel unknown; 0 lets ESP-NOW use the current one
        let peer_link = EspPeerLink::take()?;
        peer_link.log_send_status()?;
        let mut peer_sender = PeerSender::new(peer_link, config.peer, outcome.channel())?;

        let _sender_thread = thread::Builder::new()
            .name("esp_now_sender".into())
            .stack_size(4096)
            .spawn(move || {
                if let Err(e) = peer_sender.run() {
                    error!("ESP-NOW sender error: {}", e);
                }
            })?;

        let tcp_client = TcpClient::new(config.tcp_client);
        tcp_client.run()?;

        Ok(())
    }
}
