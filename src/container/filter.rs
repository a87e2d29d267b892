//! # Filtros
//! src/container/filter.rs
//!
//! Contrato de filtros del contenedor:
//!
//! ```text
//! Request → Filter → (chain) → ... → DefaultServlet
//!                ↑ después de chain.do_filter() el filtro puede actuar de nuevo
//! ```
//!
//! El contexto despliega exactamente un [`Filter`]. Para componer varios
//! (por ejemplo invalidación diferida + router) se usa [`FilterPipeline`].

use super::request::ServletRequest;
use super::session::SessionError;
use crate::http::{Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errores que un filtro (o el resto de la cadena) puede devolver
#[derive(Debug, Error)]
pub enum FilterError {
    /// Error que debe responderse con un código concreto (ej: 401)
    #[error("request rejected with status {0}")]
    Http(StatusCode),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// Error genérico de un handler; se responde 500
    #[error("handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Código con el que el contenedor responde este error
    pub fn status(&self) -> StatusCode {
        match self {
            FilterError::Http(status) => *status,
            _ => StatusCode::InternalServerError,
        }
    }
}

/// Configuración entregada a [`Filter::init`]
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub filter_name: String,
    pub context_path: String,
    pub init_params: HashMap<String, String>,
}

impl FilterConfig {
    pub fn new(filter_name: &str, context_path: &str) -> Self {
        Self {
            filter_name: filter_name.to_string(),
            context_path: context_path.to_string(),
            init_params: HashMap::new(),
        }
    }

    pub fn init_param(&self, name: &str) -> Option<&str> {
        self.init_params.get(name).map(|s| s.as_str())
    }
}

/// Resto del pipeline a partir de un filtro
pub trait FilterChain {
    fn do_filter(&self, request: &dyn ServletRequest, response: &mut Response) -> Result<(), FilterError>;
}

/// Filtro con ciclo de vida init / do_filter / destroy
pub trait Filter: Send + Sync {
    fn init(&self, _config: &FilterConfig) -> Result<(), FilterError> {
        Ok(())
    }

    fn do_filter(
        &self,
        request: &dyn ServletRequest,
        response: &mut Response,
        chain: &dyn FilterChain,
    ) -> Result<(), FilterError>;

    fn destroy(&self) {}
}

/// Varios filtros ejecutados en orden como si fueran uno solo
#[derive(Clone, Default)]
pub struct FilterPipeline {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega un filtro al final del pipeline
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Cadena que recorre los filtros restantes y luego sigue con `next`
struct PipelineChain<'a> {
    filters: &'a [Arc<dyn Filter>],
    next: &'a dyn FilterChain,
}

impl FilterChain for PipelineChain<'_> {
    fn do_filter(&self, request: &dyn ServletRequest, response: &mut Response) -> Result<(), FilterError> {
        match self.filters.split_first() {
            Some((first, rest)) => first.do_filter(
                request,
                response,
                &PipelineChain {
                    filters: rest,
                    next: self.next,
                },
            ),
            None => self.next.do_filter(request, response),
        }
    }
}

impl Filter for FilterPipeline {
    fn init(&self, config: &FilterConfig) -> Result<(), FilterError> {
        for filter in &self.filters {
            filter.init(config)?;
        }
        Ok(())
    }

    fn do_filter(
        &self,
        request: &dyn ServletRequest,
        response: &mut Response,
        chain: &dyn FilterChain,
    ) -> Result<(), FilterError> {
        PipelineChain {
            filters: &self.filters,
            next: chain,
        }
        .do_filter(request, response)
    }

    fn destroy(&self) {
        for filter in self.filters.iter().rev() {
            filter.destroy();
        }
    }
}
