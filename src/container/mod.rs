//! # Contenedor embebido
//! src/container/mod.rs
//!
//! Contenedor mínimo al estilo servlet sobre el que trabaja el adaptador:
//!
//! - `session`: sesiones HTTP y su registro
//! - `request`: la vista del request que reciben los filtros
//! - `filter`: contrato de filtros y cadenas
//! - `resources`: ubicaciones base y overlay de recursos
//! - `context`: despliegue (context path + filtro + recursos) y despacho
//! - `local` / `network`: conectores loopback y TCP
//!
//! El adaptador sólo depende de [`ServletContainer`] y de los conectores, de
//! modo que el contenedor puede reemplazarse sin tocar el adaptador.

pub mod context;
pub mod filter;
pub mod local;
pub mod network;
pub mod request;
pub mod resources;
pub mod session;

pub use context::ServletContext;
pub use filter::{Filter, FilterChain, FilterConfig, FilterError, FilterPipeline};
pub use local::LocalConnector;
pub use network::NetworkConnector;
pub use request::{ContainerRequest, ServletRequest};
pub use resources::{ResourceCollection, ResourceError, ResourceLocator};
pub use session::{HttpSession, SessionError, SessionManager, SESSION_COOKIE};

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Errores del ciclo de vida del contenedor
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No se pudo tomar el puerto (típicamente ya está en uso)
    #[error("failed to bind {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connector I/O failure")]
    Io(#[from] std::io::Error),

    #[error("connector is not open")]
    NotStarted,

    #[error("filter initialization failed")]
    Init(#[source] FilterError),
}

/// Transporte que entrega requests al contexto
pub trait Connector: Send {
    fn name(&self) -> String;

    /// Empieza a aceptar requests para `context`
    fn open(&mut self, context: Arc<ServletContext>) -> Result<(), ContainerError>;

    /// Deja de aceptar requests
    fn close(&mut self);

    /// Bloquea hasta que el thread del conector termine
    ///
    /// Un panic en ese thread se relanza en el thread que llama.
    fn join(&mut self);

    /// Dirección de red efectiva, si el conector escucha en un socket
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Interfaz del contenedor que usa el adaptador
pub trait ServletContainer: Send {
    fn start(&mut self) -> Result<(), ContainerError>;

    fn stop(&mut self);

    fn join(&mut self);

    /// Despacha un request crudo sin pasar por ningún conector
    fn dispatch(&self, raw: &[u8]) -> Vec<u8>;
}

/// Contenedor con un contexto y sus conectores
pub struct Container {
    context: Arc<ServletContext>,
    connectors: Vec<Box<dyn Connector>>,
    started: bool,
}

impl Container {
    pub fn new(context: ServletContext) -> Self {
        Self {
            context: Arc::new(context),
            connectors: Vec::new(),
            started: false,
        }
    }

    pub fn with_connector(mut self, connector: Box<dyn Connector>) -> Self {
        self.connectors.push(connector);
        self
    }

    pub fn context(&self) -> &ServletContext {
        &self.context
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Primera dirección de red abierta por los conectores
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.connectors.iter().find_map(|c| c.local_addr())
    }
}

impl ServletContainer for Container {
    fn start(&mut self) -> Result<(), ContainerError> {
        self.context.start().map_err(ContainerError::Init)?;

        for index in 0..self.connectors.len() {
            if let Err(e) = self.connectors[index].open(Arc::clone(&self.context)) {
                for opened in &mut self.connectors[..index] {
                    opened.close();
                    opened.join();
                }
                self.context.stop();
                return Err(e);
            }
        }

        self.started = true;
        info!(
            context = self.context.context_path(),
            connectors = self.connectors.len(),
            "container started"
        );
        Ok(())
    }

    fn stop(&mut self) {
        if !self.started {
            return;
        }
        for connector in &mut self.connectors {
            connector.close();
        }
        for connector in &mut self.connectors {
            connector.join();
        }
        self.context.stop();
        self.started = false;
        info!(context = self.context.context_path(), "container stopped");
    }

    fn join(&mut self) {
        for connector in &mut self.connectors {
            connector.join();
        }
    }

    fn dispatch(&self, raw: &[u8]) -> Vec<u8> {
        self.context.dispatch(raw)
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Response, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Lifecycle {
        inits: AtomicUsize,
        destroys: AtomicUsize,
    }

    impl Filter for Lifecycle {
        fn init(&self, _config: &FilterConfig) -> Result<(), FilterError> {
            self.inits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn do_filter(
            &self,
            request: &dyn ServletRequest,
            response: &mut Response,
            chain: &dyn FilterChain,
        ) -> Result<(), FilterError> {
            chain.do_filter(request, response)
        }

        fn destroy(&self) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_start_and_stop_drive_filter_lifecycle() {
        let filter = Arc::new(Lifecycle::default());
        let context = ServletContext::new("/", ResourceCollection::default(), filter.clone());
        let local = LocalConnector::new();
        let mut container = Container::new(context).with_connector(Box::new(local.clone()));

        container.start().unwrap();
        assert!(container.is_started());
        assert!(local.is_open());
        assert_eq!(filter.inits.load(Ordering::SeqCst), 1);

        container.stop();
        assert!(!local.is_open());
        assert_eq!(filter.destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_connector_closes_the_others() {
        let blocker = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let filter = Arc::new(Lifecycle::default());
        let context = ServletContext::new("/", ResourceCollection::default(), filter.clone());
        let local = LocalConnector::new();
        let mut container = Container::new(context)
            .with_connector(Box::new(local.clone()))
            .with_connector(Box::new(NetworkConnector::new("127.0.0.1", port)));

        let err = container.start().unwrap_err();
        assert!(matches!(err, ContainerError::Bind { .. }));
        assert!(!local.is_open());
        assert!(!container.is_started());
        assert_eq!(filter.destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispatch_without_connectors() {
        let context = ServletContext::new("/", ResourceCollection::default(), Arc::new(FilterPipeline::new()));
        let container = Container::new(context);
        let res = Response::parse(&container.dispatch(b"GET / HTTP/1.1")).unwrap();
        assert_eq!(res.status(), StatusCode::NotFound);
    }
}
