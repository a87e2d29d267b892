//! # Conector local (loopback)
//! src/container/local.rs
//!
//! Transporte en memoria: recibe los bytes del request y devuelve los bytes
//! de la respuesta sin abrir ningún socket. El despacho ocurre en el thread
//! que llama a [`LocalConnector::get_response`].

use super::context::ServletContext;
use super::{Connector, ContainerError};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Conector loopback; los clones comparten el mismo estado
#[derive(Clone, Default)]
pub struct LocalConnector {
    context: Arc<RwLock<Option<Arc<ServletContext>>>>,
}

impl LocalConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.context.read().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Envía un request crudo y espera la respuesta cruda completa
    pub fn get_response(&self, raw: &[u8]) -> Result<Vec<u8>, ContainerError> {
        let context = self
            .context
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(ContainerError::NotStarted)?;
        debug!(bytes = raw.len(), "local connector request");
        Ok(context.dispatch(raw))
    }
}

impl Connector for LocalConnector {
    fn name(&self) -> String {
        "local".to_string()
    }

    fn open(&mut self, context: Arc<ServletContext>) -> Result<(), ContainerError> {
        *self.context.write().unwrap_or_else(|e| e.into_inner()) = Some(context);
        debug!("local connector opened");
        Ok(())
    }

    fn close(&mut self) {
        self.context.write().unwrap_or_else(|e| e.into_inner()).take();
    }

    fn join(&mut self) {}
}
