//! ESP-IDF WiFi station adapter
//!
//! Bridges the system event loop to the connection sequencer: station and IP events are
//! translated into [`StationEvent`]s and pushed into the sequencer's [`EventSink`].

use esp_idf_svc::{
    eventloop::{EspSubscription, EspSystemEventLoop, System},
    hal::modem::Modem,
    netif::IpEvent,
    nvs::EspDefaultNvsPartition,
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiDeviceId, WifiEvent},
};
use esp_idf_sys::{esp, esp_wifi_sta_get_ap_info, wifi_ap_record_t};
use log::{debug, info};

use crate::config::WiFiConfig;
use crate::error::Result;
use crate::mac::MacAddress;
use crate::sequencer::{EventSink, StationEvent, StationRadio};

/// Station-mode WiFi driver
pub struct EspStationRadio {
    wifi: EspWifi<'static>,
    sysloop: EspSystemEventLoop,
}

/// Both event observers; dropping it unregisters them
pub struct StationSubscription {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

impl EspStationRadio {
    /// Create the WiFi driver. The NVS partition is taken by the caller so that a corrupt
    /// partition is erased and re-initialised before the radio comes up.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> Result<Self> {
        let wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        info!("WiFi driver created");
        Ok(Self { wifi, sysloop })
    }
}

impl StationRadio for EspStationRadio {
    type Subscription = StationSubscription;

    fn subscribe(&mut self, sink: EventSink) -> Result<StationSubscription> {
        let wifi_sink = sink.clone();
        let wifi = self.sysloop.subscribe::<WifiEvent, _>(move |event| match event {
            WifiEvent::StaStarted => wifi_sink.deliver(StationEvent::Started),
            WifiEvent::StaDisconnected(_) => wifi_sink.deliver(StationEvent::Disconnected),
            other => debug!("Unhandled WiFi event: {:?}", other),
        })?;

        let ip = self.sysloop.subscribe::<IpEvent, _>(move |event| {
            if let IpEvent::DhcpIpAssigned(assignment) = event {
                sink.deliver(StationEvent::AddressAcquired(assignment.ip()));
            }
        })?;

        Ok(StationSubscription { _wifi: wifi, _ip: ip })
    }

    fn begin_station_mode(&mut self, config: &WiFiConfig) -> Result<()> {
        let auth_method = if config.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        info!("Joining access point '{}'", config.ssid);
        self.wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: config.ssid.clone(),
            password: config.password.clone(),
            auth_method,
            ..Default::default()
        }))?;

        self.wifi.start()?;
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        self.wifi.connect()?;
        Ok(())
    }

    fn primary_channel(&self) -> Result<u8> {
        let mut ap_info = wifi_ap_record_t::default();
        esp!(unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) })?;
        Ok(ap_info.primary)
    }

    fn read_local_address(&self) -> Result<MacAddress> {
        Ok(MacAddress::from(self.wifi.get_mac(WifiDeviceId::Sta)?))
    }
}
