//! # Requests del contenedor
//! src/container/request.rs
//!
//! [`ServletRequest`] es la vista que reciben los filtros: el request HTTP,
//! la ubicación dentro del contexto y el acceso a la sesión.

use super::session::{HttpSession, SessionManager, StandardSession, SESSION_COOKIE};
use crate::http::Request;
use std::cell::RefCell;
use std::sync::Arc;

/// Request tal como lo ven los filtros
pub trait ServletRequest {
    /// Request HTTP subyacente
    fn request(&self) -> &Request;

    /// Sesión asociada al request
    ///
    /// Con `create == false` nunca se crea una sesión nueva.
    fn session(&self, create: bool) -> Option<Arc<dyn HttpSession>>;

    /// Context path del despliegue (ej: "/app" o "/")
    fn context_path(&self) -> &str;

    /// Path relativo al contexto, siempre empieza con '/'
    fn path_info(&self) -> &str;
}

/// Implementación nativa de [`ServletRequest`]
pub struct ContainerRequest<'a> {
    request: Request,
    context_path: String,
    path_info: String,
    sessions: &'a SessionManager,
    requested_session_id: Option<String>,
    current: RefCell<Option<Arc<StandardSession>>>,
}

impl<'a> ContainerRequest<'a> {
    pub fn new(request: Request, context_path: &str, path_info: &str, sessions: &'a SessionManager) -> Self {
        let requested_session_id = request.cookie(SESSION_COOKIE).map(str::to_string);
        Self {
            request,
            context_path: context_path.to_string(),
            path_info: path_info.to_string(),
            sessions,
            requested_session_id,
            current: RefCell::new(None),
        }
    }

    /// Sesión nativa (sin decorar)
    fn native_session(&self, create: bool) -> Option<Arc<StandardSession>> {
        if let Some(session) = self.current.borrow().as_ref() {
            if session.is_valid() {
                return Some(Arc::clone(session));
            }
        }

        let requested = self
            .requested_session_id
            .as_deref()
            .and_then(|id| self.sessions.find(id));
        let resolved = match requested {
            Some(session) => {
                session.mark_accessed();
                Some(session)
            }
            None if create => Some(self.sessions.create()),
            None => None,
        };

        *self.current.borrow_mut() = resolved.clone();
        resolved
    }

    /// Header `Set-Cookie` que anuncia (o expira) la sesión al cliente
    pub fn session_cookie(&self) -> Option<String> {
        let path = if self.context_path.is_empty() { "/" } else { self.context_path.as_str() };

        if let Some(session) = self.current.borrow().as_ref() {
            if session.is_valid() && session.is_new() {
                return Some(format!("{}={}; Path={}; HttpOnly", SESSION_COOKIE, session.id(), path));
            }
        }

        let requested = self.requested_session_id.as_deref()?;
        match self.sessions.find(requested) {
            Some(_) => None,
            None => Some(format!("{}=; Path={}; Max-Age=0", SESSION_COOKIE, path)),
        }
    }
}

impl ServletRequest for ContainerRequest<'_> {
    fn request(&self) -> &Request {
        &self.request
    }

    fn session(&self, create: bool) -> Option<Arc<dyn HttpSession>> {
        self.native_session(create)
            .map(|session| session as Arc<dyn HttpSession>)
    }

    fn context_path(&self) -> &str {
        &self.context_path
    }

    fn path_info(&self) -> &str {
        &self.path_info
    }
}
