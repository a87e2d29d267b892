//! # Requests HTTP
//! src/http/request.rs
//!
//! Parser y serializador de requests HTTP/1.x.
//!
//! El adaptador construye un [`Request`] en memoria, lo serializa con
//! [`Request::to_bytes`] y el contenedor lo vuelve a parsear con
//! [`Request::parse`] al otro lado del conector.
//!
//! ## Formato
//!
//! ```text
//! GET /path;param=x?query=value HTTP/1.1\r\n
//! Host: 127.0.0.1\r\n
//! Cookie: EMBSESSIONID=abc\r\n
//! \r\n
//! <body>
//! ```

use std::collections::HashMap;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    OPTIONS,
}

impl Method {
    /// Parsea un método HTTP desde un string
    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "DELETE" => Ok(Method::DELETE),
            "OPTIONS" => Ok(Method::OPTIONS),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errores del codec HTTP (requests y responses)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Invalid request line format")]
    InvalidRequestLine,

    #[error("Invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Unsupported HTTP status code: {0}")]
    UnsupportedStatus(u16),

    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Empty message")]
    EmptyMessage,
}

/// Separa la cabecera del body de un mensaje HTTP crudo
///
/// Si no hay línea vacía, todo el buffer se considera cabecera. Esto permite
/// parsear una request line suelta como `GET / HTTP/1.1`.
pub(crate) fn split_message(buffer: &[u8]) -> (&[u8], &[u8]) {
    match buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => (&buffer[..pos], &buffer[pos + 4..]),
        None => (buffer, &[]),
    }
}

/// Parsea las líneas de header `Name: Value`
pub(crate) fn parse_header_lines<'a>(
    lines: impl Iterator<Item = &'a str>,
) -> Result<Vec<(String, String)>, ParseError> {
    let mut headers = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            break;
        }
        match line.find(':') {
            Some(colon_pos) => {
                let name = line[..colon_pos].trim().to_string();
                let value = line[colon_pos + 1..].trim().to_string();
                headers.push((name, value));
            }
            None => return Err(ParseError::InvalidHeader(line.to_string())),
        }
    }
    Ok(headers)
}

/// Busca un header sin distinguir mayúsculas
pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Recorta el body según `Content-Length` (si existe)
pub(crate) fn delimit_body(headers: &[(String, String)], rest: &[u8]) -> Vec<u8> {
    let declared = find_header(headers, "Content-Length").and_then(|v| v.parse::<usize>().ok());
    match declared {
        Some(len) if len <= rest.len() => rest[..len].to_vec(),
        _ => rest.to_vec(),
    }
}

/// Reemplaza o agrega un header conservando el orden
pub(crate) fn put_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(entry) => entry.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Request HTTP
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,

    /// Target tal como viaja en la request line (path + path params + query)
    target: String,

    /// Path sin query ni path params (ej: "/app/index")
    path: String,

    query_params: HashMap<String, String>,

    /// Headers en orden de llegada
    headers: Vec<(String, String)>,

    version: String,

    body: Vec<u8>,
}

impl Request {
    /// Crea un request HTTP/1.1 sin headers ni body
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::http::{Method, Request};
    ///
    /// let request = Request::new(Method::GET, "/app/index?lang=es");
    /// assert_eq!(request.path(), "/app/index");
    /// assert_eq!(request.query_param("lang"), Some("es"));
    /// ```
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query_params) = Self::parse_target(target);
        Self {
            method,
            target: target.to_string(),
            path,
            query_params,
            headers: Vec::new(),
            version: "HTTP/1.1".to_string(),
            body: Vec::new(),
        }
    }

    /// Parsea un request desde bytes
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use embedded_server::http::Request;
    ///
    /// let request = Request::parse(b"GET /app/search.do?page=10 HTTP/1.1").unwrap();
    ///
    /// assert_eq!(request.path(), "/app/search.do");
    /// assert_eq!(request.query_param("page"), Some("10"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let (head, rest) = split_message(buffer);
        let head = std::str::from_utf8(head).map_err(|_| ParseError::InvalidRequestLine)?;

        if head.trim().is_empty() {
            return Err(ParseError::EmptyMessage);
        }

        let mut lines = head.split('\n').map(|l| l.trim_end_matches('\r'));
        let request_line = lines.next().ok_or(ParseError::InvalidRequestLine)?;
        let (method, target, version) = Self::parse_request_line(request_line)?;
        let headers = parse_header_lines(lines)?;
        let body = delimit_body(&headers, rest);

        let (path, query_params) = Self::parse_target(&target);
        Ok(Request {
            method,
            target,
            path,
            query_params,
            headers,
            version,
            body,
        })
    }

    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(line: &str) -> Result<(Method, String, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::from_str(parts[0])?;

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, parts[1].to_string(), version))
    }

    /// Separa path, path params (`;jsessionid=...`) y query
    fn parse_target(target: &str) -> (String, HashMap<String, String>) {
        let (before_query, query) = match target.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (target, None),
        };
        let path = before_query.split(';').next().unwrap_or_default().to_string();
        let query_params = query.map(Self::parse_query_string).unwrap_or_default();
        (path, query_params)
    }

    /// `page=10&q=rust` → `{"page": "10", "q": "rust"}`
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        for param in query.split('&') {
            if param.is_empty() {
                continue;
            }
            match param.split_once('=') {
                Some((key, value)) => {
                    params.insert(Self::url_decode(key), Self::url_decode(value));
                }
                // Parámetro sin valor (ej: "?debug")
                None => {
                    params.insert(Self::url_decode(param), String::new());
                }
            }
        }

        params
    }

    fn url_decode(s: &str) -> String {
        let spaced = s.replace('+', " ");
        match urlencoding::decode(&spaced) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => spaced,
        }
    }

    /// Serializa el request a su formato de red
    ///
    /// Agrega `Content-Length` si hay body y no fue declarado.
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::http::{Method, Request};
    ///
    /// let request = Request::new(Method::GET, "/status").with_header("Host", "127.0.0.1");
    /// let text = String::from_utf8(request.to_bytes()).unwrap();
    /// assert_eq!(text, "GET /status HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
    /// ```
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::new();

        let request_line = format!("{} {} {}\r\n", self.method, self.target, self.version);
        result.extend_from_slice(request_line.as_bytes());

        for (name, value) in &self.headers {
            result.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        if !self.body.is_empty() && self.header("Content-Length").is_none() {
            result.extend_from_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&self.body);
        result
    }

    /// Agrega (o reemplaza) un header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Establece el body y su `Content-Length`
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        let len = self.body.len().to_string();
        self.set_header("Content-Length", &len);
        self
    }

    /// Reemplaza o agrega un header (versión mutable)
    pub fn set_header(&mut self, name: &str, value: &str) {
        put_header(&mut self.headers, name, value);
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Target completo de la request line
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path sin query ni path params
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Headers en orden de llegada
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Obtiene un header (sin distinguir mayúsculas)
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Valor del header `Host`, si no está vacío
    pub fn host(&self) -> Option<&str> {
        self.header("Host").filter(|h| !h.trim().is_empty())
    }

    pub fn set_host(&mut self, host: &str) {
        self.set_header("Host", host);
    }

    /// Obtiene una cookie del header `Cookie`
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::http::Request;
    ///
    /// let raw = b"GET / HTTP/1.1\r\nCookie: a=1; EMBSESSIONID=xyz\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    /// assert_eq!(request.cookie("EMBSESSIONID"), Some("xyz"));
    /// assert_eq!(request.cookie("missing"), None);
    /// ```
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header("Cookie")?
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body como String (si es UTF-8 válido)
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/");
        assert!(request.query_params().is_empty());
    }

    #[test]
    fn test_parse_bare_request_line() {
        let request = Request::parse(b"GET /test2/index HTTP/1.1").unwrap();
        assert_eq!(request.path(), "/test2/index");
        assert!(request.headers().is_empty());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_path_params_are_stripped() {
        let request = Request::parse(b"GET /test2/index;hoge=fuga HTTP/1.1").unwrap();
        assert_eq!(request.path(), "/test2/index");
        assert_eq!(request.target(), "/test2/index;hoge=fuga");
    }

    #[test]
    fn test_parse_multiple_query_params() {
        let raw = b"GET /test?num=42&text=hello%20world&fast HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.query_param("num"), Some("42"));
        assert_eq!(request.query_param("text"), Some("hello world"));
        assert_eq!(request.query_param("fast"), Some(""));
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nhost: localhost:8080\r\nUser-Agent: test\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("Host"), Some("localhost:8080"));
        assert_eq!(request.header("user-agent"), Some("test"));
    }

    #[test]
    fn test_body_delimited_by_content_length() {
        let raw = b"POST /form HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello trailing";
        let request = Request::parse(raw).unwrap();
        assert_eq!(request.body(), b"hello");
    }

    #[test]
    fn test_empty_host_is_reported_as_missing() {
        let request = Request::new(Method::GET, "/").with_header("Host", "");
        assert_eq!(request.host(), None);
    }

    #[test]
    fn test_to_bytes_then_parse_keeps_target_and_body() {
        let request = Request::new(Method::POST, "/app/save;x=1?id=7")
            .with_header("Host", "127.0.0.1")
            .with_body(b"name=value");

        let parsed = Request::parse(&request.to_bytes()).unwrap();
        assert_eq!(parsed.method(), Method::POST);
        assert_eq!(parsed.target(), "/app/save;x=1?id=7");
        assert_eq!(parsed.host(), Some("127.0.0.1"));
        assert_eq!(parsed.body(), b"name=value");
    }

    #[test]
    fn test_set_host_replaces_existing_header() {
        let mut request = Request::new(Method::GET, "/").with_header("host", "");
        request.set_host("127.0.0.1");
        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.host(), Some("127.0.0.1"));
    }

    #[test]
    fn test_invalid_version() {
        let result = Request::parse(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_invalid_method() {
        let result = Request::parse(b"BREW / HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(ParseError::UnsupportedMethod(_))));
    }

    #[test]
    fn test_empty_request() {
        assert!(matches!(Request::parse(b""), Err(ParseError::EmptyMessage)));
    }

    #[test]
    fn test_invalid_request_line() {
        let result = Request::parse(b"GET\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));
    }

    #[test]
    fn test_invalid_header() {
        let result = Request::parse(b"GET / HTTP/1.1\r\nnot a header\r\n\r\n");
        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }
}
