//! TCP Server module
//!
//! Accept loop of the base station. Every accepted client gets one receive, one canned
//! HTTP-looking reply and is then closed after a fixed delay.

use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::thread;

use crate::config::TcpServerConfig;
use crate::error::{Error, Result};
use crate::indicator::StatusIndicator;

/// What the single receive on a connection produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveResult {
    /// Client sent some bytes
    Message(String),
    /// Client performed an orderly shutdown before sending anything
    Shutdown,
    /// Receive failed
    Failed(String),
}

/// Summary of one served connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub received: ReceiveResult,
    pub sent: bool,
}

/// Frame `body` in a minimal status line and Content-Length header
pub fn canned_response(body: &str) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}", body.len(), body)
}

/// TCP Server
///
/// Serves one connection at a time. The indicator is pulsed after each reply sent.
pub struct TcpServer<L: StatusIndicator> {
    /// TCP server configuration
    config: TcpServerConfig,
    /// LED pulsed after a successful send
    indicator: L,
}

impl<L: StatusIndicator> TcpServer<L> {
    /// Create a new TCP server with the given configuration and indicator
    pub fn new(config: TcpServerConfig, indicator: L) -> Self {
        Self { config, indicator }
    }

    /// Bind the listening socket
    pub fn bind(&self) -> Result<TcpListener> {
        let bind_address = SocketAddr::from((self.config.bind_address, self.config.port));
        let listener = TcpListener::bind(bind_address)
            .map_err(|e| Error::TcpError(format!("Failed to bind to {}: {}", bind_address, e)))?;

        info!("Socket bound, port {}", self.config.port);
        Ok(listener)
    }

    /// Run the TCP server
    ///
    /// Binds and then serves connections forever. Only a bind failure returns.
    pub fn run(&mut self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(&listener)
    }

    /// Accept and serve connections on an already bound listener
    pub fn serve(&mut self, listener: &TcpListener) -> Result<()> {
        loop {
            info!("Socket listening");
            self.serve_next(listener);
        }
    }

    /// Serve the next connection. A failed accept is logged and followed by the
    /// configured back-off so a persistent failure cannot spin the loop.
    pub fn serve_next(&mut self, listener: &TcpListener) -> Option<ConnectionReport> {
        match self.accept_one(listener) {
            Ok(report) => Some(report),
            Err(e) => {
                error!("{}", e);
                thread::sleep(self.config.accept_backoff);
                None
            }
        }
    }

    /// Accept a single connection and serve it to completion
    pub fn accept_one(&mut self, listener: &TcpListener) -> Result<ConnectionReport> {
        let (stream, peer_addr) = listener
            .accept()
            .map_err(|e| Error::TcpError(format!("Unable to accept connection: {}", e)))?;

        Ok(self.handle_connection(stream, peer_addr))
    }

    fn handle_connection(
        &mut self,
        mut stream: TcpStream,
        peer_addr: SocketAddr,
    ) -> ConnectionReport {
        let server_ip = stream
            .local_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|_| self.config.bind_address.to_string());
        let client_ip = peer_addr.ip().to_string();
        debug!("Accepted connection from {}", peer_addr);

        let report = self.exchange(&mut stream, &server_ip, &client_ip);

        thread::sleep(self.config.close_delay);

        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!("Shutdown of connection to {} failed: {}", peer_addr, e);
        }

        report
    }

    /// One receive followed by the canned reply.
    ///
    /// The reply goes out whatever the receive produced, including an orderly shutdown or
    /// a receive error.
    pub fn exchange<S: Read + Write>(
        &mut self,
        stream: &mut S,
        server_ip: &str,
        client_ip: &str,
    ) -> ConnectionReport {
        let mut buffer = vec![0u8; self.config.buffer_size.max(2)];
        let capacity = buffer.len() - 1;

        let received = match stream.read(&mut buffer[..capacity]) {
            Ok(0) => {
                info!(
                    "Server({}) received msg from client({}): \
                     received and client performed an orderly shutdown",
                    server_ip, client_ip
                );
                ReceiveResult::Shutdown
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buffer[..n]).into_owned();
                info!("Server({}) received msg from client({}): {}", server_ip, client_ip, text);
                ReceiveResult::Message(text)
            }
            Err(e) => {
                warn!(
                    "Server({}) failed to received msg from client({}): {}",
                    server_ip, client_ip, e
                );
                ReceiveResult::Failed(e.to_string())
            }
        };

        let body = self.config.response_body;
        let response = canned_response(body);
        let sent = match stream.write_all(response.as_bytes()).and_then(|_| stream.flush()) {
            Ok(()) => {
                info!("Server({}) send msg from client({}): {}", server_ip, client_ip, body);
                self.indicator.pulse();
                true
            }
            Err(e) => {
                warn!(
                    "Server({}) failed to send msg from client({}): {}",
                    server_ip, client_ip, e
                );
                false
            }
        };

        ConnectionReport { received, sent }
    }
}
