//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del binario `embedded_server` con soporte para argumentos
//! CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./embedded_server --port 8080 \
//!   --context-path /app \
//!   --war-base-path ./src/main/webapp \
//!   --war-base-path ./target/overlay.war \
//!   --dump-enabled
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 HTTP_HOST=127.0.0.1 ./embedded_server
//! ```

use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;

/// Configuración del servidor embebido
#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "embedded_server")]
#[command(about = "Servidor HTTP embebido para revisar la capa web de una aplicación")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor
    #[arg(short, long, default_value = "7777", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Context path del despliegue
    #[arg(long = "context-path", default_value = "/", env = "CONTEXT_PATH")]
    pub context_path: String,

    // === Recursos ===
    /// Ubicaciones base (directorio o .war), en orden de prioridad
    #[arg(long = "war-base-path", default_value = "./webapp", env = "WAR_BASE_PATHS", value_delimiter = ',')]
    pub war_base_paths: Vec<String>,

    // === Dump ===
    /// Vuelca a disco el body de cada respuesta
    #[arg(long = "dump-enabled", env = "HTTP_DUMP_ENABLED")]
    pub dump_enabled: bool,

    /// Directorio de los dumps
    #[arg(long = "dump-root", default_value = "./http_dump", env = "HTTP_DUMP_ROOT")]
    pub dump_root: PathBuf,

    /// Archivo fijo para el dump (tiene prioridad sobre --dump-root)
    #[arg(long = "dump-file", env = "HTTP_DUMP_FILE")]
    pub dump_file: Option<PathBuf>,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use embedded_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:7777");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Valida la configuración
    ///
    /// Retorna errores si hay valores inválidos
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port must be >= 1".to_string());
        }
        if !self.context_path.starts_with('/') {
            return Err(format!("Context path must start with '/': {}", self.context_path));
        }
        if self.war_base_paths.is_empty() {
            return Err("At least one war base path is required".to_string());
        }
        if self.war_base_paths.iter().any(|p| p.trim().is_empty()) {
            return Err("War base paths must not be empty".to_string());
        }
        Ok(())
    }

    /// Resumen en JSON para el log de arranque
    pub fn summary(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.address())
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 7777,
            host: "0.0.0.0".to_string(),
            context_path: "/".to_string(),
            war_base_paths: vec!["./webapp".to_string()],
            dump_enabled: false,
            dump_root: PathBuf::from("./http_dump"),
            dump_file: None,
        }
    }
}
