//! # Contexto de despliegue
//! src/container/context.rs
//!
//! Un [`ServletContext`] agrupa lo que se despliega en el contenedor:
//!
//! ```text
//! bytes → Request::parse → ¿dentro del context path? → Filter → DefaultServlet
//!                                                         ↓
//!                               Response (+ Set-Cookie) → bytes
//! ```
//!
//! Un panic o un error dentro de la cadena nunca escapa de [`ServletContext::dispatch`]:
//! siempre se produce una respuesta bien formada (500 o el código del error).

use super::filter::{Filter, FilterChain, FilterConfig, FilterError};
use super::request::{ContainerRequest, ServletRequest};
use super::resources::{content_type_for, ResourceCollection};
use super::session::SessionManager;
use crate::http::{Method, Request, Response, StatusCode};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Contexto con un único filtro mapeado a todos los paths
pub struct ServletContext {
    context_path: String,
    resources: ResourceCollection,
    filter: Arc<dyn Filter>,
    sessions: SessionManager,
}

impl ServletContext {
    /// Crea el contexto
    ///
    /// Un context path vacío o "/" despliega en la raíz.
    pub fn new(context_path: &str, resources: ResourceCollection, filter: Arc<dyn Filter>) -> Self {
        let trimmed = context_path.trim_end_matches('/');
        Self {
            context_path: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
            resources,
            filter,
            sessions: SessionManager::new(),
        }
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn resources(&self) -> &ResourceCollection {
        &self.resources
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Inicializa el filtro desplegado
    pub fn start(&self) -> Result<(), FilterError> {
        self.filter.init(&FilterConfig::new("front-controller", &self.context_path))
    }

    /// Libera el filtro desplegado
    pub fn stop(&self) {
        self.filter.destroy();
    }

    /// Path relativo al contexto, o `None` si el path no le pertenece
    fn path_info<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.context_path == "/" {
            return Some(path);
        }
        match path.strip_prefix(self.context_path.as_str()) {
            Some("") => Some("/"),
            Some(rest) if rest.starts_with('/') => Some(rest),
            _ => None,
        }
    }

    /// Procesa un request crudo y devuelve la respuesta cruda
    pub fn dispatch(&self, raw: &[u8]) -> Vec<u8> {
        let response = match Request::parse(raw) {
            Ok(request) => self.service(request),
            Err(e) => {
                warn!(error = %e, "unparseable request");
                Response::error(StatusCode::BadRequest, &format!("request ({})", e))
            }
        };
        response.to_bytes()
    }

    /// Ejecuta el filtro para un request ya parseado
    pub fn service(&self, request: Request) -> Response {
        let method = request.method();
        let path = request.path().to_string();
        debug!(%method, %path, "dispatching request");

        let path_info = match self.path_info(&path) {
            Some(p) => p.to_string(),
            None => return Response::error(StatusCode::NotFound, &path),
        };

        let servlet_request = ContainerRequest::new(request, &self.context_path, &path_info, &self.sessions);
        let mut response = Response::new(StatusCode::Ok);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.filter
                .do_filter(&servlet_request, &mut response, &DefaultServlet { resources: &self.resources })
        }));

        let mut response = match outcome {
            Ok(Ok(())) => response,
            Ok(Err(e)) => {
                let status = e.status();
                if status.is_server_error() {
                    error!(%path, error = %e, "request failed");
                } else {
                    debug!(%path, error = %e, "request rejected");
                }
                Response::error(status, &path)
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%path, panic = %message, "handler panicked");
                Response::error(StatusCode::InternalServerError, &path)
            }
        };

        if let Some(cookie) = servlet_request.session_cookie() {
            response.add_header("Set-Cookie", &cookie);
        }
        if method == Method::HEAD {
            response.clear_body();
        }

        debug!(%path, status = %response.status(), "request completed");
        response
    }
}

/// Final de la cadena: sirve recursos estáticos del overlay
struct DefaultServlet<'a> {
    resources: &'a ResourceCollection,
}

impl FilterChain for DefaultServlet<'_> {
    fn do_filter(&self, request: &dyn ServletRequest, response: &mut Response) -> Result<(), FilterError> {
        let method = request.request().method();
        if method != Method::GET && method != Method::HEAD {
            return Err(FilterError::Http(StatusCode::MethodNotAllowed));
        }

        let resource = self.resources.find(request.path_info()).map_err(|e| {
            warn!(path = request.path_info(), error = %e, "resource lookup failed");
            FilterError::Http(StatusCode::InternalServerError)
        })?;

        match resource {
            Some(resource) => {
                *response = Response::new(StatusCode::Ok)
                    .with_header("Content-Type", content_type_for(&resource.name))
                    .with_body_bytes(resource.bytes);
                Ok(())
            }
            None => Err(FilterError::Http(StatusCode::NotFound)),
        }
    }
}
