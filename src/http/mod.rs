//! # Módulo HTTP
//!
//! Objetos de valor para requests y responses HTTP/1.x. El adaptador y el
//! contenedor sólo se comunican a través de sus bytes:
//!
//! - [`Request::to_bytes`] / [`Request::parse`]
//! - [`Response::to_bytes`] / [`Response::parse`]
//!
//! No hay keep-alive ni chunked transfer encoding: cada mensaje declara su
//! `Content-Length` y el conector cierra la conexión después de responder.

pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, ParseError, Request};
pub use response::{Response, SERVER_NAME};
pub use status::StatusCode;
