//! # Invalidación diferida de sesiones
//! src/filter/lazy_invalidation.rs
//!
//! La capa de pruebas copia el estado del framework hacia la sesión mientras
//! la cadena de filtros todavía se está desenrollando. Si un handler invalidó
//! la sesión, esa escritura falla con [`SessionError::Invalidated`].
//!
//! Este filtro decora el request para que toda sesión obtenida a través de él
//! también esté decorada:
//!
//! ```text
//! ACTIVE ──invalidate()──▶ INVALIDATION-PENDING
//!   │                          │ (atributos vaciados de inmediato,
//!   │                          │  la sesión real sigue viva)
//!   ▼                          ▼
//! chain.do_filter() retorna ─▶ invalidate() real sobre la sesión nativa
//! ```
//!
//! El flag vive en el wrapper de un único request; nunca se comparte.

use crate::container::{Filter, FilterChain, FilterError, HttpSession, ServletRequest, SessionError};
use crate::http::{Request, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Filtro que difiere `HttpSession::invalidate` hasta el final de la cadena
#[derive(Debug, Default, Clone, Copy)]
pub struct LazySessionInvalidationFilter;

impl LazySessionInvalidationFilter {
    pub fn new() -> Self {
        Self
    }
}

impl Filter for LazySessionInvalidationFilter {
    /// Siempre invoca la cadena primero; la invalidación real ocurre después,
    /// también cuando la cadena devolvió un error.
    fn do_filter(
        &self,
        request: &dyn ServletRequest,
        response: &mut Response,
        chain: &dyn FilterChain,
    ) -> Result<(), FilterError> {
        let wrapped = RequestWrapper::new(request);
        let outcome = chain.do_filter(&wrapped, response);

        let invalidation = if wrapped.is_invalidated() {
            wrapped.invalidate_session_actually()
        } else {
            Ok(())
        };

        outcome?;
        invalidation.map_err(FilterError::from)
    }
}

/// Request decorado: las sesiones que entrega están decoradas
pub struct RequestWrapper<'a> {
    request: &'a dyn ServletRequest,
    invalidated: Arc<AtomicBool>,
}

impl<'a> RequestWrapper<'a> {
    pub fn new(request: &'a dyn ServletRequest) -> Self {
        Self {
            request,
            invalidated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `true` si algún código pidió invalidar la sesión en este request
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }

    /// Invalida la sesión nativa, sin crear una si no existe
    pub fn invalidate_session_actually(&self) -> Result<(), SessionError> {
        match self.request.session(false) {
            Some(session) => {
                debug!(session = session.id(), "performing deferred session invalidation");
                session.invalidate()
            }
            None => Ok(()),
        }
    }
}

impl ServletRequest for RequestWrapper<'_> {
    fn request(&self) -> &Request {
        self.request.request()
    }

    fn session(&self, create: bool) -> Option<Arc<dyn HttpSession>> {
        self.request.session(create).map(|session| {
            Arc::new(SessionWrapper::new(session, Arc::clone(&self.invalidated))) as Arc<dyn HttpSession>
        })
    }

    fn context_path(&self) -> &str {
        self.request.context_path()
    }

    fn path_info(&self) -> &str {
        self.request.path_info()
    }
}

/// Sesión decorada: `invalidate` sólo registra el pedido y vacía atributos
pub struct SessionWrapper {
    session: Arc<dyn HttpSession>,
    pending: Arc<AtomicBool>,
}

impl SessionWrapper {
    pub fn new(session: Arc<dyn HttpSession>, pending: Arc<AtomicBool>) -> Self {
        Self { session, pending }
    }

    /// Pasa el request a INVALIDATION-PENDING
    pub fn request_invalidation(&self) {
        self.pending.store(true, Ordering::SeqCst);
    }

    /// Elimina todos los atributos de la sesión subyacente
    pub fn clear_attributes(&self) -> Result<(), SessionError> {
        for name in self.session.attribute_names()? {
            self.session.remove_attribute(&name)?;
        }
        Ok(())
    }
}

impl HttpSession for SessionWrapper {
    fn id(&self) -> &str {
        self.session.id()
    }

    fn attribute(&self, name: &str) -> Result<Option<Value>, SessionError> {
        self.session.attribute(name)
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), SessionError> {
        self.session.set_attribute(name, value)
    }

    fn remove_attribute(&self, name: &str) -> Result<(), SessionError> {
        self.session.remove_attribute(name)
    }

    fn attribute_names(&self) -> Result<Vec<String>, SessionError> {
        self.session.attribute_names()
    }

    fn invalidate(&self) -> Result<(), SessionError> {
        self.request_invalidation();
        self.clear_attributes()
    }

    fn is_new(&self) -> bool {
        self.session.is_new()
    }
}
