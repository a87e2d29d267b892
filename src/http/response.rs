//! # Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP, convertirlas a bytes para el conector
//! y volver a parsearlas desde los bytes crudos que devuelve el contenedor.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use embedded_server::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_header("Content-Type", "text/plain")
//!     .with_body("hello world");
//!
//! let parsed = Response::parse(&response.to_bytes()).unwrap();
//! assert_eq!(parsed.status(), StatusCode::Ok);
//! assert_eq!(parsed.body_string(), "hello world");
//! ```

use super::request::{delimit_body, find_header, parse_header_lines, put_header, split_message};
use super::{ParseError, StatusCode};

/// Nombre con el que el contenedor firma sus páginas de error
pub const SERVER_NAME: &str = "embedded_server";

/// Respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,

    /// Headers en orden de inserción
    headers: Vec<(String, String)>,

    body: Vec<u8>,
}

impl Response {
    /// Crea una nueva respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Agrega un header; si ya existe se sobrescribe
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        put_header(&mut self.headers, name, value);
    }

    /// Establece el body desde un string y calcula `Content-Length`
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el body desde bytes y calcula `Content-Length`
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        let len = self.body.len().to_string();
        self.add_header("Content-Length", &len);
        self
    }

    /// Respuesta 200 con `Content-Type: text/html`
    pub fn html(body: &str) -> Self {
        Self::new(StatusCode::Ok)
            .with_header("Content-Type", "text/html;charset=utf-8")
            .with_body(body)
    }

    /// Página de error del contenedor
    ///
    /// El cuerpo incluye el código y el nombre del servidor, de modo que una
    /// prueba puede distinguir una respuesta del contenedor de una de la aplicación.
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound, "/unknown/path");
    /// let body = response.body_string();
    /// assert!(body.contains("404"));
    /// assert!(body.contains("embedded_server"));
    /// ```
    pub fn error(status: StatusCode, message: &str) -> Self {
        let body = format!(
            "<html>\n<head><title>Error {code} {reason}</title></head>\n<body>\n\
             <h2>HTTP ERROR {code}</h2>\n<p>Problem accessing {message}. Reason: {reason}</p>\n\
             <hr/><i>Powered by {server}</i>\n</body>\n</html>\n",
            code = status.as_u16(),
            reason = status.reason_phrase(),
            message = message,
            server = SERVER_NAME,
        );
        Self::new(status)
            .with_header("Content-Type", "text/html;charset=utf-8")
            .with_body(&body)
    }

    /// Parsea una respuesta cruda (inverso de [`Response::to_bytes`])
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let (head, rest) = split_message(buffer);
        let head = std::str::from_utf8(head)
            .map_err(|_| ParseError::InvalidStatusLine(String::from_utf8_lossy(head).into_owned()))?;

        if head.trim().is_empty() {
            return Err(ParseError::EmptyMessage);
        }

        let mut lines = head.split('\n').map(|l| l.trim_end_matches('\r'));
        let status_line = lines.next().unwrap_or_default();
        let status = Self::parse_status_line(status_line)?;
        let headers = parse_header_lines(lines)?;
        let body = delimit_body(&headers, rest);

        Ok(Self { status, headers, body })
    }

    /// Formato: `HTTP/1.1 200 OK`
    fn parse_status_line(line: &str) -> Result<StatusCode, ParseError> {
        let mut parts = line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version.to_string()));
        }
        let code = parts
            .next()
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(|| ParseError::InvalidStatusLine(line.to_string()))?;
        StatusCode::from_u16(code).ok_or(ParseError::UnsupportedStatus(code))
    }

    /// Convierte la respuesta a bytes listos para el conector
    ///
    /// Siempre declara `Content-Length` para que el otro extremo pueda
    /// delimitar el body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::new();

        result.extend_from_slice(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());

        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if self.header("Content-Length").is_none() {
            result.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&self.body);
        result
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Obtiene un header (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("Content-Type")
    }

    pub fn location(&self) -> Option<&str> {
        self.header("Location")
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decodificado como UTF-8 (con reemplazo de bytes inválidos)
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Descarta el body conservando los headers (respuestas a HEAD)
    pub fn clear_body(&mut self) {
        self.body.clear();
    }
}
