//! # Routing de handlers
//! src/filter/router.rs
//!
//! Filtro que mapea paths (relativos al contexto) a handlers.
//!
//! ## Arquitectura
//!
//! ```text
//! ServletRequest → Router ─┬─ match → Handler → Response
//!                          └─ sin match → chain (recursos estáticos)
//! ```
//!
//! Un patrón es un path exacto (`/login`) o un prefijo terminado en `/*`
//! (`/api/*`). Gana la primera ruta registrada que coincide.

use crate::container::{Filter, FilterChain, FilterError, ServletRequest};
use crate::http::{Response, SERVER_NAME};
use std::sync::Arc;
use tracing::debug;

/// Tipo de función handler
///
/// Un handler recibe el request del contenedor (con acceso a la sesión) y
/// retorna una Response o un error que el contenedor convierte en página de error.
pub type Handler = Arc<dyn Fn(&dyn ServletRequest) -> Result<Response, FilterError> + Send + Sync>;

/// Router que mapea patrones a handlers
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<(String, Handler)>,
}

impl Router {
    /// Crea un router vacío: todo request sigue la cadena
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una ruta con su handler
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::filter::Router;
    /// use embedded_server::http::{Response, StatusCode};
    ///
    /// let mut router = Router::new();
    /// router.register("/hello", |_req| Ok(Response::new(StatusCode::Ok).with_body("hello")));
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn register<F>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&dyn ServletRequest) -> Result<Response, FilterError> + Send + Sync + 'static,
    {
        self.routes.push((pattern.to_string(), Arc::new(handler)));
    }

    /// Variante encadenable de [`Router::register`]
    pub fn route<F>(mut self, pattern: &str, handler: F) -> Self
    where
        F: Fn(&dyn ServletRequest) -> Result<Response, FilterError> + Send + Sync + 'static,
    {
        self.register(pattern, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handler de la primera ruta que coincide con `path`
    fn find(&self, path: &str) -> Option<&Handler> {
        self.routes
            .iter()
            .find(|(pattern, _)| Self::matches(pattern, path))
            .map(|(_, handler)| handler)
    }

    fn matches(pattern: &str, path: &str) -> bool {
        match pattern.strip_suffix("/*") {
            Some(prefix) => {
                path == prefix || (path.starts_with(prefix) && path[prefix.len()..].starts_with('/'))
            }
            None => pattern == path,
        }
    }
}

impl Filter for Router {
    fn do_filter(
        &self,
        request: &dyn ServletRequest,
        response: &mut Response,
        chain: &dyn FilterChain,
    ) -> Result<(), FilterError> {
        let path = request.path_info();

        match self.find(path) {
            Some(handler) => {
                debug!(%path, "route matched");
                let mut produced = handler(request)?;
                produced.add_header("Server", SERVER_NAME);
                *response = produced;
                Ok(())
            }
            None => chain.do_filter(request, response),
        }
    }
}
