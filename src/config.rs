use heapless::String;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::mac::MacAddress;

/// WiFi station configuration
#[derive(Debug, Clone)]
pub struct WiFiConfig {
    /// SSID of the access point to join
    pub ssid: String<32>,
    /// Passphrase of the access point
    pub password: String<64>,
    /// Reconnect attempts allowed before the connection is reported as failed
    pub max_retries: u32,
}

impl Default for WiFiConfig {
    fn default() -> Self {
        Self {
            ssid: String::try_from("your_wifi_ssid").unwrap_or_default(),
            password: String::try_from("your_wifi_password").unwrap_or_default(),
            max_retries: 10,
        }
    }
}

/// TCP server configuration (base station)
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Bind address for the TCP server
    pub bind_address: Ipv4Addr,
    /// Port for the TCP server
    pub port: u16,
    /// Receive buffer size; one byte is kept back like a C string buffer
    pub buffer_size: usize,
    /// Body of the canned reply sent on every accepted connection
    pub response_body: &'static str,
    /// How long a connection is held open after the reply is sent
    pub close_delay: Duration,
    /// Pause after a failed accept before listening again
    pub accept_backoff: Duration,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind_address: Ipv4Addr::UNSPECIFIED,
            port: 5000,
            buffer_size: 128,
            response_body: "Response from ESP32 Base station via Socket connection",
            close_delay: Duration::from_secs(2),
            accept_backoff: Duration::from_secs(1),
        }
    }
}

/// TCP client configuration (slave)
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Address of the base station
    pub server_ip: Ipv4Addr,
    /// Port of the base station
    pub port: u16,
    /// Payload sent on each connection
    pub payload: &'static str,
    /// Receive buffer size
    pub buffer_size: usize,
    /// Pause between two exchanges
    pub interval: Duration,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(192, 168, 10, 119),
            port: 5000,
            payload: "Message from ESP32 TCP Socket Client",
            buffer_size: 128,
            interval: Duration::from_secs(5),
        }
    }
}

/// ESP-NOW configuration
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Address of the base station radio
    pub peer_address: MacAddress,
    /// Frame payload sent by the slave
    pub payload: &'static str,
    /// Pause between two frames
    pub send_interval: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            peer_address: MacAddress([0xd8, 0x13, 0x2a, 0x7f, 0xab, 0x24]),
            payload: "Hello via ESP-NOW",
            send_interval: Duration::from_secs(2),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// WiFi configuration
    pub wifi: WiFiConfig,
    /// TCP server configuration
    pub tcp_server: TcpServerConfig,
    /// TCP client configuration
    pub tcp_client: TcpClientConfig,
    /// ESP-NOW configuration
    pub peer: PeerConfig,
}

impl AppConfig {
    /// Apply overrides looked up by option name on top of the current values.
    ///
    /// Recognized names: `WIFI_SSID`, `WIFI_PASS`, `WIFI_MAX_RETRIES`, `PEER_MAC`,
    /// `TCP_PORT` (both roles) and `SERVER_IP`.
    pub fn with_overrides<'a, F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        if let Some(ssid) = lookup("WIFI_SSID") {
            self.wifi.ssid = String::try_from(ssid)
                .map_err(|_| Error::ConfigError("WIFI_SSID is longer than 32 bytes".to_string()))?;
        }
        if let Some(password) = lookup("WIFI_PASS") {
            self.wifi.password = String::try_from(password)
                .map_err(|_| Error::ConfigError("WIFI_PASS is longer than 64 bytes".to_string()))?;
        }
        if let Some(retries) = lookup("WIFI_MAX_RETRIES") {
            self.wifi.max_retries = parse_value("WIFI_MAX_RETRIES", retries)?;
        }
        if let Some(mac) = lookup("PEER_MAC") {
            self.peer.peer_address = mac.parse()?;
        }
        if let Some(port) = lookup("TCP_PORT") {
            let port: u16 = parse_value("TCP_PORT", port)?;
            if port == 0 {
                return Err(Error::ConfigError("TCP_PORT must not be 0".to_string()));
            }
            self.tcp_server.port = port;
            self.tcp_client.port = port;
        }
        if let Some(ip) = lookup("SERVER_IP") {
            self.tcp_client.server_ip = parse_value("SERVER_IP", ip)?;
        }

        Ok(self)
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("invalid value '{}' for {}", raw, name)))
}

/// Values baked in at build time, e.g. `WIFI_SSID=lab WIFI_PASS=secret cargo build`
fn build_env(name: &str) -> Option<&'static str> {
    match name {
        "WIFI_SSID" => option_env!("WIFI_SSID"),
        "WIFI_PASS" => option_env!("WIFI_PASS"),
        "WIFI_MAX_RETRIES" => option_env!("WIFI_MAX_RETRIES"),
        "PEER_MAC" => option_env!("PEER_MAC"),
        "TCP_PORT" => option_env!("TCP_PORT"),
        "SERVER_IP" => option_env!("SERVER_IP"),
        _ => None,
    }
}

/// Create the application configuration: defaults plus build-time overrides
pub fn create_config() -> Result<AppConfig> {
    AppConfig::default().with_overrides(build_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&'static str, &'static str)]) -> Result<AppConfig> {
        let map: HashMap<&str, &'static str> = pairs.iter().copied().collect();
        AppConfig::default().with_overrides(|name| map.get(name).copied())
    }

    #[test]
    fn defaults_match_the_deployed_pair() {
        let config = AppConfig::default();
        assert_eq!(config.wifi.max_retries, 10);
        assert_eq!(config.tcp_server.port, 5000);
        assert_eq!(config.tcp_client.port, 5000);
        assert_eq!(config.tcp_client.server_ip, Ipv4Addr::new(192, 168, 10, 119));
        assert_eq!(config.peer.peer_address.to_string(), "D8:13:2A:7F:AB:24");
    }

    #[test]
    fn overrides_replace_every_recognized_option() {
        let config = overrides(&[
            ("WIFI_SSID", "lab-net"),
            ("WIFI_PASS", "hunter22"),
            ("WIFI_MAX_RETRIES", "3"),
            ("PEER_MAC", "01:02:03:04:05:06"),
            ("TCP_PORT", "6000"),
            ("SERVER_IP", "10.0.0.7"),
        ])
        .unwrap();

        assert_eq!(config.wifi.ssid.as_str(), "lab-net");
        assert_eq!(config.wifi.password.as_str(), "hunter22");
        assert_eq!(config.wifi.max_retries, 3);
        assert_eq!(config.peer.peer_address, MacAddress([1, 2, 3, 4, 5, 6]));
        assert_eq!(config.tcp_server.port, 6000);
        assert_eq!(config.tcp_client.port, 6000);
        assert_eq!(config.tcp_client.server_ip, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn missing_overrides_keep_defaults() {
        let config = overrides(&[]).unwrap();
        assert_eq!(config.wifi.ssid.as_str(), "your_wifi_ssid");
        assert_eq!(config.tcp_server.port, 5000);
    }

    #[test]
    fn rejects_oversized_credentials() {
        let long_ssid = "s".repeat(33);
        let long_ssid: &'static str = Box::leak(long_ssid.into_boxed_str());
        assert!(matches!(overrides(&[("WIFI_SSID", long_ssid)]), Err(Error::ConfigError(_))));

        let long_pass: &'static str = Box::leak("p".repeat(65).into_boxed_str());
        assert!(matches!(overrides(&[("WIFI_PASS", long_pass)]), Err(Error::ConfigError(_))));
    }

    #[test]
    fn rejects_invalid_numbers_and_addresses() {
        assert!(matches!(overrides(&[("WIFI_MAX_RETRIES", "-1")]), Err(Error::ConfigError(_))));
        assert!(matches!(overrides(&[("TCP_PORT", "70000")]), Err(Error::ConfigError(_))));
        assert!(matches!(overrides(&[("TCP_PORT", "0")]), Err(Error::ConfigError(_))));
        assert!(matches!(overrides(&[("SERVER_IP", "192.168.1")]), Err(Error::ConfigError(_))));
        assert!(matches!(overrides(&[("PEER_MAC", "nope")]), Err(Error::ConfigError(_))));
    }
}
