//! # Conector de red
//! src/container/network.rs
//!
//! Conector TCP concurrente: un thread acepta conexiones y cada conexión se
//! procesa en su propio thread. Cada conexión transporta un único request
//! (sin keep-alive) y se cierra después de escribir la respuesta.

use super::context::ServletContext;
use super::{Connector, ContainerError};
use crate::http::{Response, StatusCode};
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Tiempo máximo de espera leyendo un request
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Tamaño máximo de la línea de request más las cabeceras
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Tamaño máximo de body aceptado
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Conector TCP
pub struct NetworkConnector {
    host: String,
    port: u16,
    local_addr: Option<SocketAddr>,
    running: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl NetworkConnector {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            local_addr: None,
            running: Arc::new(AtomicBool::new(false)),
            acceptor: None,
        }
    }

    fn accept_loop(listener: TcpListener, context: Arc<ServletContext>, running: Arc<AtomicBool>) {
        for stream in listener.incoming() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let context = Arc::clone(&context);
                    let peer_addr = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    debug!(peer = %peer_addr, "connection accepted");

                    thread::spawn(move || {
                        if let Err(e) = Self::handle_connection(stream, &context) {
                            warn!(peer = %peer_addr, error = %e, "connection failed");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "failed to accept connection"),
            }
        }
        debug!("acceptor stopped");
    }

    fn handle_connection(mut stream: TcpStream, context: &ServletContext) -> std::io::Result<()> {
        let start = Instant::now();
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let response = match Self::read_request(&mut stream)? {
            Incoming::Closed => {
                debug!("connection closed without data");
                return Ok(());
            }
            Incoming::Request(raw) => context.dispatch(&raw),
            Incoming::Rejected(reason) => {
                warn!(%reason, "request rejected before dispatch");
                Response::error(StatusCode::BadRequest, &format!("request ({})", reason)).to_bytes()
            }
        };

        stream.write_all(&response)?;
        stream.flush()?;

        debug!(
            bytes = response.len(),
            latency_ms = start.elapsed().as_secs_f64() * 1000.0,
            "response written"
        );
        Ok(())
    }

    /// Lee cabecera completa y el body declarado en `Content-Length`
    ///
    /// Cabeceras de más de [`MAX_HEADER_BYTES`] o bodies de más de
    /// [`MAX_BODY_BYTES`] se rechazan sin leer el resto.
    fn read_request<R: Read>(stream: &mut R) -> std::io::Result<Incoming> {
        let mut raw = Vec::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = stream.read(&mut buffer)?;
            if bytes_read == 0 {
                return Ok(if raw.is_empty() { Incoming::Closed } else { Incoming::Request(raw) });
            }
            raw.extend_from_slice(&buffer[..bytes_read]);

            let Some(header_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
                if raw.len() > MAX_HEADER_BYTES {
                    return Ok(Incoming::Rejected("header section too large"));
                }
                continue;
            };
            if header_end > MAX_HEADER_BYTES {
                return Ok(Incoming::Rejected("header section too large"));
            }

            let body_length = match Self::content_length(&raw[..header_end]) {
                Ok(length) if length <= MAX_BODY_BYTES => length,
                Ok(_) => return Ok(Incoming::Rejected("body too large")),
                Err(reason) => return Ok(Incoming::Rejected(reason)),
            };
            let Some(expected) = (header_end + 4).checked_add(body_length) else {
                return Ok(Incoming::Rejected("body too large"));
            };

            while raw.len() < expected {
                let bytes_read = stream.read(&mut buffer)?;
                if bytes_read == 0 {
                    break;
                }
                raw.extend_from_slice(&buffer[..bytes_read]);
            }
            return Ok(Incoming::Request(raw));
        }
    }

    /// Valor de `Content-Length`; 0 si no viene
    fn content_length(head: &[u8]) -> Result<usize, &'static str> {
        let header = String::from_utf8_lossy(head)
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
            .map(|(_, value)| value.trim().to_string());

        match header {
            Some(value) => value.parse().map_err(|_| "invalid Content-Length"),
            None => Ok(0),
        }
    }
}

/// Resultado de leer un request del socket
#[derive(Debug, PartialEq, Eq)]
enum Incoming {
    /// El cliente cerró sin enviar nada
    Closed,
    Request(Vec<u8>),
    /// Request malformado o demasiado grande; se responde 400
    Rejected(&'static str),
}

impl Connector for NetworkConnector {
    fn name(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }

    fn open(&mut self, context: Arc<ServletContext>) -> Result<(), ContainerError> {
        let address = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&address).map_err(|source| ContainerError::Bind {
            addr: address.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let acceptor = thread::Builder::new()
            .name(format!("acceptor-{}", local_addr.port()))
            .spawn(move || Self::accept_loop(listener, context, running))?;

        info!(address = %local_addr, "network connector listening");
        self.local_addr = Some(local_addr);
        self.acceptor = Some(acceptor);
        Ok(())
    }

    fn close(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Despertar al acceptor bloqueado en accept()
        if let Some(addr) = self.local_addr {
            let wake = if addr.ip().is_unspecified() {
                SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
            } else {
                addr
            };
            let _ = TcpStream::connect_timeout(&wake, Duration::from_secs(1));
        }
        info!(connector = %self.name(), "network connector closed");
    }

    fn join(&mut self) {
        if let Some(acceptor) = self.acceptor.take() {
            if let Err(payload) = acceptor.join() {
                panic::resume_unwind(payload);
            }
        }
    }

    /// Dirección efectiva (útil con el puerto 0)
    fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Drop for NetworkConnector {
    fn drop(&mut self) {
        self.close();
    }
}
