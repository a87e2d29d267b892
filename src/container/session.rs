//! # Sesiones HTTP
//! src/container/session.rs
//!
//! Sesiones del contenedor. Como en un contenedor de servlets, una sesión
//! invalidada rechaza cualquier operación posterior con
//! [`SessionError::Invalidated`]. Ese es justamente el error de consistencia
//! que el filtro de invalidación diferida evita.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

/// Nombre de la cookie que transporta el id de sesión
pub const SESSION_COOKIE: &str = "EMBSESSIONID";

/// Errores de sesión
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// La sesión ya fue invalidada
    #[error("session {0} has already been invalidated")]
    Invalidated(String),
}

/// Operaciones de una sesión HTTP
///
/// Los valores de los atributos son JSON para que la capa de pruebas pueda
/// copiar el estado del framework hacia y desde la sesión sin conocer tipos.
pub trait HttpSession: Send + Sync {
    fn id(&self) -> &str;

    fn attribute(&self, name: &str) -> Result<Option<Value>, SessionError>;

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), SessionError>;

    fn remove_attribute(&self, name: &str) -> Result<(), SessionError>;

    fn attribute_names(&self) -> Result<Vec<String>, SessionError>;

    /// Termina la sesión y descarta sus atributos
    fn invalidate(&self) -> Result<(), SessionError>;

    /// `true` si la sesión se creó en el request actual
    fn is_new(&self) -> bool;
}

/// Sesión nativa del contenedor
pub struct StandardSession {
    id: String,
    attributes: Mutex<HashMap<String, Value>>,
    valid: AtomicBool,
    new: AtomicBool,
}

impl StandardSession {
    fn new(id: String) -> Self {
        Self {
            id,
            attributes: Mutex::new(HashMap::new()),
            valid: AtomicBool::new(true),
            new: AtomicBool::new(true),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    /// Marca la sesión como conocida por el cliente
    pub(crate) fn mark_accessed(&self) {
        self.new.store(false, Ordering::SeqCst);
    }

    /// Bloquea los atributos verificando que la sesión siga viva
    fn live_attributes(&self) -> Result<MutexGuard<'_, HashMap<String, Value>>, SessionError> {
        if !self.is_valid() {
            return Err(SessionError::Invalidated(self.id.clone()));
        }
        Ok(self.attributes.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl HttpSession for StandardSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.live_attributes()?.get(name).cloned())
    }

    fn set_attribute(&self, name: &str, value: Value) -> Result<(), SessionError> {
        self.live_attributes()?.insert(name.to_string(), value);
        Ok(())
    }

    fn remove_attribute(&self, name: &str) -> Result<(), SessionError> {
        self.live_attributes()?.remove(name);
        Ok(())
    }

    fn attribute_names(&self) -> Result<Vec<String>, SessionError> {
        let mut names: Vec<String> = self.live_attributes()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn invalidate(&self) -> Result<(), SessionError> {
        let mut attributes = self.live_attributes()?;
        self.valid.store(false, Ordering::SeqCst);
        attributes.clear();
        debug!(session = %self.id, "session invalidated");
        Ok(())
    }

    fn is_new(&self) -> bool {
        self.new.load(Ordering::SeqCst)
    }
}

/// Registro thread-safe de sesiones vivas
#[derive(Clone, Default)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<String, Arc<StandardSession>>>>,
    counter: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<StandardSession>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Crea y registra una sesión nueva
    pub fn create(&self) -> Arc<StandardSession> {
        let session = Arc::new(StandardSession::new(self.next_id()));
        self.lock().insert(session.id().to_string(), Arc::clone(&session));
        debug!(session = %session.id(), "session created");
        session
    }

    /// Busca una sesión válida; las invalidadas se descartan del registro
    pub fn find(&self, id: &str) -> Option<Arc<StandardSession>> {
        let mut sessions = self.lock();
        match sessions.get(id) {
            Some(session) if session.is_valid() => Some(Arc::clone(session)),
            Some(_) => {
                sessions.remove(id);
                None
            }
            None => None,
        }
    }

    /// Número de sesiones válidas registradas
    pub fn active_count(&self) -> usize {
        let mut sessions = self.lock();
        sessions.retain(|_, s| s.is_valid());
        sessions.len()
    }

    /// Id no adivinable: SHA-256 de tiempo, contador y pid
    fn next_id(&self) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let sequence = self.counter.fetch_add(1, Ordering::SeqCst);

        let mut hasher = Sha256::new();
        hasher.update(nanos.to_le_bytes());
        hasher.update(sequence.to_le_bytes());
        hasher.update(std::process::id().to_le_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..32].to_uppercase()
    }
}
