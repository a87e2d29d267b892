//! # Servidor embebido
//! src/server/embedded.rs
//!
//! [`EmbeddedServer`] configura y despliega el contenedor:
//!
//! ```text
//! EmbeddedServer ──deploy()──▶ ServletContext(context path, overlay, front filter)
//!       │
//!       ├─ start()       → Container + NetworkConnector (host:port)
//!       └─ start_local() → Container + LocalConnector ◀── handle(request)
//! ```
//!
//! Cada `start()`/`start_local()` detiene el contenedor anterior y vuelve a
//! desplegar con la configuración actual.

use super::dump::HttpDumper;
use super::ServerError;
use crate::config::Config;
use crate::container::{
    Container, Filter, LocalConnector, NetworkConnector, ResourceCollection, ResourceLocator, ServletContainer,
    ServletContext,
};
use crate::filter::Router;
use crate::http::{Request, Response};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Puerto por defecto
pub const DEFAULT_PORT: u16 = 7777;

/// Host asignado a los requests que llegan a `handle()` sin uno
pub const DEFAULT_REQUEST_HOST: &str = "127.0.0.1";

/// Servidor HTTP embebido para pruebas de la capa web
pub struct EmbeddedServer {
    port: u16,
    host: String,
    context_path: String,
    war_base_paths: Vec<ResourceLocator>,
    dump_enabled: bool,
    dump_root: PathBuf,
    dump_file_path: Option<PathBuf>,
    front_filter: Arc<dyn Filter>,
    container: Option<Container>,
    local: Option<LocalConnector>,
}

impl EmbeddedServer {
    /// Servidor con la configuración por defecto
    ///
    /// Puerto 7777, context path "/", sin ubicaciones base, dump deshabilitado.
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: "0.0.0.0".to_string(),
            context_path: "/".to_string(),
            war_base_paths: Vec::new(),
            dump_enabled: false,
            dump_root: PathBuf::from("./http_dump"),
            dump_file_path: None,
            front_filter: Arc::new(Router::new()),
            container: None,
            local: None,
        }
    }

    /// Construye un servidor desde la configuración de línea de comandos
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        config.validate().map_err(ServerError::Config)?;

        let mut server = Self::new();
        server
            .set_port(config.port)
            .set_host(&config.host)
            .set_http_dump_enabled(config.dump_enabled)
            .set_http_dump_root(&config.dump_root)
            .set_servlet_context_path(&config.context_path)?
            .set_war_base_paths(&config.war_base_paths)?;
        if let Some(file) = &config.dump_file {
            server.set_http_dump_file_path(file);
        }
        Ok(server)
    }

    // === Configuración ===

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host en el que escucha `start()`
    pub fn set_host(&mut self, host: &str) -> &mut Self {
        self.host = host.to_string();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn set_servlet_context_path(&mut self, path: &str) -> Result<&mut Self, ServerError> {
        if !path.starts_with('/') {
            return Err(ServerError::InvalidContextPath(path.to_string()));
        }
        self.context_path = path.to_string();
        Ok(self)
    }

    pub fn servlet_context_path(&self) -> &str {
        &self.context_path
    }

    /// Reemplaza las ubicaciones base por una sola
    ///
    /// La ubicación se valida en el momento; un path inexistente o interior
    /// a un archivo falla aquí y no al arrancar.
    pub fn set_war_base_path(&mut self, location: &str) -> Result<&mut Self, ServerError> {
        self.war_base_paths = vec![ResourceLocator::parse(location)?];
        Ok(self)
    }

    /// Reemplaza las ubicaciones base; el orden define la prioridad
    pub fn set_war_base_paths<S: AsRef<str>>(&mut self, locations: &[S]) -> Result<&mut Self, ServerError> {
        let locators = locations
            .iter()
            .map(|location| ResourceLocator::parse(location.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.war_base_paths = locators;
        Ok(self)
    }

    pub fn war_base_paths(&self) -> &[ResourceLocator] {
        &self.war_base_paths
    }

    pub fn set_http_dump_enabled(&mut self, enabled: bool) -> &mut Self {
        self.dump_enabled = enabled;
        self
    }

    pub fn is_http_dump_enabled(&self) -> bool {
        self.dump_enabled
    }

    pub fn set_http_dump_root(&mut self, root: impl AsRef<Path>) -> &mut Self {
        self.dump_root = root.as_ref().to_path_buf();
        self
    }

    pub fn http_dump_root(&self) -> &Path {
        &self.dump_root
    }

    /// Path exacto del dump; tiene prioridad sobre `dump_root`
    pub fn set_http_dump_file_path(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.dump_file_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn http_dump_file_path(&self) -> Option<&Path> {
        self.dump_file_path.as_deref()
    }

    /// Filtro desplegado sobre todos los paths del contexto
    pub fn set_front_filter(&mut self, filter: Arc<dyn Filter>) -> &mut Self {
        self.front_filter = filter;
        self
    }

    // === Ciclo de vida ===

    /// Arranca en modo red, escuchando en `host:port`
    ///
    /// Un conector local anterior deja de existir: `handle()` falla a partir de aquí.
    pub fn start(&mut self) -> Result<&mut Self, ServerError> {
        self.stop();

        let connector = NetworkConnector::new(&self.host, self.port);
        let mut container = Container::new(self.deploy()).with_connector(Box::new(connector));
        container.start().map_err(ServerError::Startup)?;

        info!(
            host = %self.host,
            port = self.port,
            context = %self.context_path,
            "embedded server started"
        );
        self.container = Some(container);
        Ok(self)
    }

    /// Arranca en modo local (loopback) para usar `handle()`
    ///
    /// Puede llamarse otra vez para volver a desplegar con otra configuración.
    pub fn start_local(&mut self) -> Result<&mut Self, ServerError> {
        self.stop();

        let local = LocalConnector::new();
        let mut container = Container::new(self.deploy()).with_connector(Box::new(local.clone()));
        container.start().map_err(ServerError::Startup)?;

        info!(context = %self.context_path, "embedded server started on local connector");
        self.container = Some(container);
        self.local = Some(local);
        Ok(self)
    }

    /// Envía un request por el conector local y devuelve la respuesta parseada
    ///
    /// Un request sin host recibe `127.0.0.1` (el request del llamador se modifica).
    pub fn handle(&self, request: &mut Request) -> Result<Response, ServerError> {
        let local = self.local.as_ref().ok_or(ServerError::NotRunningLocally)?;

        if request.host().is_none() {
            request.set_host(DEFAULT_REQUEST_HOST);
        }

        let raw = local
            .get_response(&request.to_bytes())
            .map_err(|_| ServerError::NotRunningLocally)?;
        let response = Response::parse(&raw)?;

        if self.dump_enabled {
            let dumper = HttpDumper::new(&self.dump_root, self.dump_file_path.clone());
            if let Err(e) = dumper.dump(request, &response) {
                if let ServerError::Dump { path, .. } = &e {
                    warn!(
                        "an error occurred while the http dump was being written. \
                         make sure dump file path is valid (especially file name). path = [{}]",
                        path.display()
                    );
                }
                return Err(e);
            }
        }

        Ok(response)
    }

    /// Bloquea hasta que termine el thread de red
    ///
    /// Un panic en ese thread se relanza aquí. En modo local retorna de inmediato.
    pub fn join(&mut self) -> &mut Self {
        if let Some(container) = self.container.as_mut() {
            container.join();
        }
        self
    }

    /// Detiene conectores y destruye el front filter
    pub fn stop(&mut self) {
        self.local = None;
        if let Some(mut container) = self.container.take() {
            container.stop();
        }
    }

    /// Dirección TCP efectiva tras `start()` (útil con el puerto 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.container.as_ref().and_then(Container::local_addr)
    }

    fn deploy(&self) -> ServletContext {
        ServletContext::new(
            &self.context_path,
            ResourceCollection::new(self.war_base_paths.clone()),
            Arc::clone(&self.front_filter),
        )
    }
}

impl Default for EmbeddedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EmbeddedServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedServer")
            .field("port", &self.port)
            .field("host", &self.host)
            .field("context_path", &self.context_path)
            .field("war_base_paths", &self.war_base_paths)
            .field("dump_enabled", &self.dump_enabled)
            .field("dump_root", &self.dump_root)
            .field("dump_file_path", &self.dump_file_path)
            .field("running", &self.container.is_some())
            .field("local", &self.local.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, StatusCode};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let server = EmbeddedServer::new();
        assert_eq!(server.port(), 7777);
        assert_eq!(server.servlet_context_path(), "/");
        assert!(server.war_base_paths().is_empty());
        assert!(!server.is_http_dump_enabled());
        assert_eq!(server.http_dump_root(), Path::new("./http_dump"));
        assert!(server.http_dump_file_path().is_none());
    }

    #[test]
    fn test_context_path_must_be_absolute() {
        let mut server = EmbeddedServer::new();
        assert!(matches!(
            server.set_servlet_context_path("app"),
            Err(ServerError::InvalidContextPath(_))
        ));
        server.set_servlet_context_path("/app").unwrap();
        assert_eq!(server.servlet_context_path(), "/app");
    }

    #[test]
    fn test_invalid_war_base_path_fails_fast() {
        let mut server = EmbeddedServer::new();
        let err = server.set_war_base_path("/no/such/dir/anywhere").unwrap_err();
        assert!(matches!(err, ServerError::InvalidWarBasePath(_)));
        assert!(server.war_base_paths().is_empty());
    }

    #[test]
    fn test_handle_requires_local_start() {
        let server = EmbeddedServer::new();
        let mut request = Request::new(Method::GET, "/");
        let err = server.handle(&mut request).unwrap_err();
        assert_eq!(
            err.to_string(),
            "this server is not running on a local connector. you must call start_local() method beforehand."
        );
    }

    #[test]
    fn test_handle_serves_and_sets_host() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();

        let mut server = EmbeddedServer::new();
        server
            .set_war_base_path(dir.path().to_str().unwrap())
            .unwrap()
            .start_local()
            .unwrap();

        let mut request = Request::new(Method::GET, "/");
        let response = server.handle(&mut request).unwrap();
        assert_eq!(request.host(), Some(DEFAULT_REQUEST_HOST));
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body_string(), "<h1>home</h1>");

        server.stop();
        assert!(server.handle(&mut request).is_err());
    }

    #[test]
    fn test_existing_host_is_kept() {
        let mut server = EmbeddedServer::new();
        server.start_local().unwrap();

        let mut request = Request::new(Method::GET, "/").with_header("Host", "example.com");
        server.handle(&mut request).unwrap();
        assert_eq!(request.host(), Some("example.com"));
    }

    #[test]
    fn test_from_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.port = 9090;
        config.context_path = "/app".to_string();
        config.war_base_paths = vec![dir.path().to_string_lossy().into_owned()];
        config.dump_file = Some(dir.path().join("out.html"));

        let server = EmbeddedServer::from_config(&config).unwrap();
        assert_eq!(server.port(), 9090);
        assert_eq!(server.servlet_context_path(), "/app");
        assert_eq!(server.war_base_paths().len(), 1);
        assert_eq!(server.http_dump_file_path(), Some(dir.path().join("out.html").as_path()));
    }

    #[test]
    fn test_from_invalid_config() {
        let mut config = Config::default();
        config.port = 0;
        assert!(matches!(EmbeddedServer::from_config(&config), Err(ServerError::Config(_))));
    }
}
