//! # Dump HTTP
//! src/server/dump.rs
//!
//! Escribe el body de cada respuesta en un archivo para revisarlo fuera de
//! línea (por ejemplo, abrir en el navegador el HTML que produjo una prueba).
//!
//! ## Nombre del archivo
//!
//! - Con `dump_file_path` configurado: ese path; si la respuesta es una
//!   descarga (`Content-Disposition`), `<nombre base>_<filename>` en el mismo
//!   directorio.
//! - Si no, bajo `dump_root`: `<yyyyMMdd_HHmmss_SSS>_<n>` seguido de
//!   `_<filename>` del `Content-Disposition`, o `.<subtipo>` del
//!   `Content-Type` (`html`, `plain`, `json`...), o `_<reason phrase>` del
//!   status (`_OK`) cuando no hay tipo.
//!
//! Los HTML se reescriben para que sus enlaces apunten a rutas relativas al
//! directorio del dump y se eliminan los ids de sesión incrustados en la URL.

use super::ServerError;
use crate::http::{Request, Response};
use chrono::Local;
use lazy_regex::{lazy_regex, Lazy, Regex};
use regex::Captures;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Contador global; distingue dumps generados en el mismo milisegundo
static DUMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Atributos `href`/`src` con su valor entre comillas
static LINK_PATTERN: Lazy<Regex> = lazy_regex!(r#"(?i)(\b(?:href|src)\s*=\s*)(["'])([^"']*)(["'])"#);

/// Parámetros de path con el id de sesión (`;jsessionid=...`)
static SESSION_PARAM_PATTERN: Lazy<Regex> = lazy_regex!(r"(?i);(?:jsessionid|embsessionid)=[^?#]*");

/// Escritor de dumps configurado para un servidor
#[derive(Debug, Clone)]
pub struct HttpDumper {
    root: PathBuf,
    file_path: Option<PathBuf>,
}

impl HttpDumper {
    pub fn new(root: impl Into<PathBuf>, file_path: Option<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_path,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path donde se escribirá el dump de `response`
    pub fn target_path(&self, response: &Response) -> PathBuf {
        if let Some(path) = &self.file_path {
            return match response.header("Content-Disposition").and_then(disposition_filename) {
                Some(filename) => {
                    let stem = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    path.with_file_name(format!("{}_{}", stem, filename))
                }
                None => path.clone(),
            };
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let sequence = DUMP_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        self.root.join(format!("{}_{}{}", stamp, sequence, Self::suffix(response)))
    }

    /// Escribe el body de `response`; la respuesta no se modifica
    pub fn dump(&self, request: &Request, response: &Response) -> Result<PathBuf, ServerError> {
        let path = self.target_path(response);
        let dump_error = |source| ServerError::Dump {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(dump_error)?;
        }

        let is_html = response
            .content_type()
            .map(|ct| ct.to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false);

        if is_html {
            let html = rewrite_links(&response.body_string(), request.path());
            fs::write(&path, html).map_err(dump_error)?;
        } else {
            fs::write(&path, response.body()).map_err(dump_error)?;
        }

        debug!(path = %path.display(), bytes = response.body().len(), "http dump written");
        Ok(path)
    }

    fn suffix(response: &Response) -> String {
        if let Some(filename) = response.header("Content-Disposition").and_then(disposition_filename) {
            return format!("_{}", filename);
        }
        response
            .content_type()
            .and_then(|ct| ct.split(';').next())
            .and_then(|mime| mime.split_once('/'))
            .map(|(_, subtype)| subtype.trim())
            .filter(|subtype| !subtype.is_empty())
            .map(|subtype| format!(".{}", subtype))
            .unwrap_or_else(|| format!("_{}", response.status().reason_phrase().replace(' ', "_")))
    }
}

/// `filename` de un header `Content-Disposition`, sin comillas ni directorios
fn disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|part| part.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("filename"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .and_then(|value| urlencoding::decode(value).ok().map(|v| v.into_owned()))
        .and_then(|value| value.rsplit(['/', '\\']).next().map(str::to_string))
        .filter(|name| !name.is_empty())
}

/// Reescribe los enlaces de un HTML para verlo desde el directorio del dump
///
/// - `/css/a.css` → `./css/a.css`
/// - `a.css` pedido desde `/app/page.html` → `./app/a.css`
/// - URLs con esquema (`http:`, `mailto:`...) y anclas quedan intactas
pub fn rewrite_links(html: &str, request_path: &str) -> String {
    let request_dir = request_path
        .rsplit_once('/')
        .map(|(dir, _)| dir.trim_start_matches('/'))
        .unwrap_or("");

    LINK_PATTERN
        .replace_all(html, |caps: &Captures| {
            let url = SESSION_PARAM_PATTERN.replace_all(&caps[3], "");
            format!("{}{}{}{}", &caps[1], &caps[2], rewrite_url(&url, request_dir), &caps[4])
        })
        .into_owned()
}

fn rewrite_url(url: &str, request_dir: &str) -> String {
    let has_scheme = url
        .split_once(':')
        .map(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)))
        .unwrap_or(false);

    if url.is_empty() || url.starts_with('#') || url.starts_with("//") || has_scheme {
        url.to_string()
    } else if let Some(absolute) = url.strip_prefix('/') {
        format!("./{}", absolute)
    } else if request_dir.is_empty() {
        format!("./{}", url)
    } else {
        format!("./{}/{}", request_dir, url)
    }
}
