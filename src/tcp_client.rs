//! TCP Client module
//!
//! Client loop of the slave node: connect to the base station, send the payload, read one
//! reply, wait, repeat.

use log::{debug, error, info};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;

use crate::config::TcpClientConfig;
use crate::error::{Error, Result};

/// TCP Client
pub struct TcpClient {
    config: TcpClientConfig,
}

impl TcpClient {
    pub fn new(config: TcpClientConfig) -> Self {
        Self { config }
    }

    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::from((self.config.server_ip, self.config.port))
    }

    /// Run the exchange loop forever
    ///
    /// A failed iteration is logged and abandoned; the loop waits one interval and tries
    /// again.
    pub fn run(&self) -> Result<()> {
        loop {
            if let Err(e) = self.exchange_once() {
                error!("{}", e);
                thread::sleep(self.config.interval);
            }
        }
    }

    /// One connect, send, receive round. The connection is held for one interval after
    /// the receive and then closed. Returns the reply text, empty if the server closed
    /// without answering.
    pub fn exchange_once(&self) -> Result<String> {
        let server_addr = self.server_addr();
        info!("Connecting to {}", server_addr);

        let mut stream = TcpStream::connect(server_addr).map_err(|e| {
            Error::TcpError(format!("Socket unable to connect to {}: {}", server_addr, e))
        })?;
        info!("Successfully connected");

        stream
            .write_all(self.config.payload.as_bytes())
            .map_err(|e| Error::TcpError(format!("Failed to send to {}: {}", server_addr, e)))?;

        let mut buffer = vec![0u8; self.config.buffer_size.max(2)];
        let capacity = buffer.len() - 1;
        let received = stream.read(&mut buffer[..capacity]);
        let reply = received.as_ref().ok().map(|&len| {
            let reply = String::from_utf8_lossy(&buffer[..len]).into_owned();
            info!("Received {} bytes from {}:", len, self.config.server_ip);
            info!("{}", reply);
            reply
        });

        thread::sleep(self.config.interval);

        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of connection to {} failed: {}", server_addr, e);
        }

        received.map_err(|e| {
            Error::TcpError(format!("Failed to receive from {}: {}", server_addr, e))
        })?;
        Ok(reply.unwrap_or_default())
    }
}
