//! # Servidor embebido
//! src/server/mod.rs
//!
//! Adaptador que despliega el front controller en el contenedor y lo expone
//! de dos formas:
//!
//! 1. `start()`: escucha en un puerto TCP (revisión manual desde el navegador)
//! 2. `start_local()`: conector loopback para pruebas automatizadas, donde
//!    cada request se entrega con `handle()` y la respuesta vuelve parseada
//!
//! Opcionalmente cada respuesta de `handle()` se vuelca a disco (`dump`).

pub mod dump;
pub mod embedded;

pub use dump::HttpDumper;
pub use embedded::EmbeddedServer;

use crate::container::{ContainerError, ResourceError};
use crate::http::ParseError;
use std::path::PathBuf;
use thiserror::Error;

/// Errores del servidor embebido
#[derive(Debug, Error)]
pub enum ServerError {
    /// `handle()` sin un `start_local()` previo
    #[error("this server is not running on a local connector. you must call start_local() method beforehand.")]
    NotRunningLocally,

    /// El contenedor no pudo arrancar (por ejemplo, puerto ocupado)
    #[error("failed to start the embedded server")]
    Startup(#[source] ContainerError),

    #[error("invalid war base path")]
    InvalidWarBasePath(#[from] ResourceError),

    #[error("servlet context path must start with '/': {0}")]
    InvalidContextPath(String),

    #[error("malformed response from the container")]
    Parse(#[from] ParseError),

    #[error("an error occurred while the http dump was being written. path = [{}]", path.display())]
    Dump {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Fábrica de servidores que usa el framework de pruebas
pub trait ServerFactory {
    fn create(&self) -> EmbeddedServer;
}

/// Fábrica por defecto: un servidor con la configuración por defecto
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultServerFactory;

impl ServerFactory for DefaultServerFactory {
    fn create(&self) -> EmbeddedServer {
        EmbeddedServer::new()
    }
}
