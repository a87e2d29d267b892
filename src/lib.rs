//! # Embedded Server
//! src/lib.rs
//!
//! Servidor HTTP embebido para probar la capa web de una aplicación sin
//! desplegarla en un servidor externo. Corre dentro del proceso de pruebas y
//! ofrece dos modos: escuchar en un puerto TCP, o recibir requests en memoria
//! mediante un conector loopback.
//!
//! ## Arquitectura
//!
//! El crate está dividido en módulos especializados:
//! - `http`: parsing y serialización de mensajes HTTP/1.1
//! - `container`: contenedor mínimo (sesiones, filtros, recursos, conectores)
//! - `filter`: invalidación diferida de sesiones y router de handlers
//! - `server`: el adaptador [`server::EmbeddedServer`] y el dump HTTP
//! - `config`: configuración CLI del binario
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use embedded_server::http::{Method, Request};
//! use embedded_server::server::EmbeddedServer;
//!
//! let mut server = EmbeddedServer::new();
//! server.set_war_base_path("./webapp")?.start_local()?;
//!
//! let mut request = Request::new(Method::GET, "/index.html");
//! let response = server.handle(&mut request)?;
//! println!("{}", response.status());
//! # Ok::<(), embedded_server::server::ServerError>(())
//! ```

pub mod config;
pub mod container;
pub mod filter;
pub mod http;
pub mod server;
