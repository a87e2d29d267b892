//! Tests de integración para el servidor embebido
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor (loopback o TCP en un puerto efímero)
//! sobre directorios temporales, de modo que no dependen de nada externo.

use embedded_server::container::{ContainerError, FilterError, FilterPipeline, HttpSession, ServletRequest};
use embedded_server::filter::{LazySessionInvalidationFilter, Router};
use embedded_server::http::{Method, Request, Response, StatusCode};
use embedded_server::server::{EmbeddedServer, ServerError};
use serde_json::json;
use std::error::Error;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing_test::traced_test;

/// Helper: escribe un archivo creando los directorios intermedios
fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Helper: empaqueta un .war con las entradas dadas
fn write_war(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Helper: id de sesión anunciado en `Set-Cookie`
fn session_id(response: &Response) -> String {
    let cookie = response.header("Set-Cookie").expect("session cookie");
    cookie
        .trim_start_matches("EMBSESSIONID=")
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn get(path: &str) -> Request {
    Request::new(Method::GET, path)
}

fn get_with_session(path: &str, id: &str) -> Request {
    get(path).with_header("Cookie", &format!("EMBSESSIONID={}", id))
}

/// Router de una aplicación con login/logout
///
/// `/logout` invalida la sesión y después escribe estado en ella, como hace
/// la capa de pruebas al copiar el contexto de ejecución al final del request.
fn session_app() -> Router {
    Router::new()
        .route("/login", |req: &dyn ServletRequest| {
            let session = req.session(true).ok_or(FilterError::Http(StatusCode::Conflict))?;
            session.set_attribute("user", json!("alice"))?;
            Ok(Response::new(StatusCode::Ok).with_body("logged in"))
        })
        .route("/logout", |req: &dyn ServletRequest| {
            let session = req.session(false).ok_or(FilterError::Http(StatusCode::Unauthorized))?;
            session.invalidate()?;
            let user = session.attribute("user")?;
            session.set_attribute("framework-state", json!({"user": user}))?;
            Ok(Response::new(StatusCode::Ok).with_body("bye"))
        })
        .route("/whoami", |req: &dyn ServletRequest| {
            let user = match req.session(false) {
                Some(session) => session.attribute("user")?,
                None => None,
            };
            let name = user.and_then(|v| v.as_str().map(str::to_string));
            Ok(Response::new(StatusCode::Ok).with_body(name.as_deref().unwrap_or("anonymous")))
        })
}

fn lazy_front_filter(router: Router) -> Arc<FilterPipeline> {
    Arc::new(
        FilterPipeline::new()
            .with_filter(Arc::new(LazySessionInvalidationFilter::new()))
            .with_filter(Arc::new(router)),
    )
}

// ==================== Host por defecto ====================

#[test]
fn test_missing_host_defaults_to_loopback() {
    let mut server = EmbeddedServer::new();
    server.set_front_filter(Arc::new(Router::new().route("/host", |req: &dyn ServletRequest| {
        let host = req.request().host().unwrap_or("none").to_string();
        Ok(Response::new(StatusCode::Ok).with_body(&host))
    })));
    server.start_local().unwrap();

    let mut request = get("/host");
    assert!(request.host().is_none());

    let response = server.handle(&mut request).unwrap();
    assert_eq!(request.host(), Some("127.0.0.1"));
    assert_eq!(response.body_string(), "127.0.0.1");
}

// ==================== Precondición de handle() ====================

#[test]
fn test_handle_without_start_local_fails() {
    let server = EmbeddedServer::new();
    let err = server.handle(&mut get("/")).unwrap_err();
    assert!(matches!(err, ServerError::NotRunningLocally));
}

#[test]
fn test_handle_fails_after_network_start() {
    let mut server = EmbeddedServer::new();
    server.set_host("127.0.0.1").set_port(0);
    server.start_local().unwrap();
    assert!(server.handle(&mut get("/")).is_ok());

    server.start().unwrap();
    let err = server.handle(&mut get("/")).unwrap_err();
    assert!(err.to_string().contains("you must call start_local() method beforehand"));
    server.stop();
}

// ==================== Conflicto de puerto ====================

#[test]
fn test_second_server_on_same_port_fails() {
    let mut first = EmbeddedServer::new();
    first.set_host("127.0.0.1").set_port(0).start().unwrap();
    let port = first.local_addr().unwrap().port();

    let mut second = EmbeddedServer::new();
    second.set_host("127.0.0.1").set_port(port);
    let err = second.start().unwrap_err();

    assert!(matches!(err, ServerError::Startup(ContainerError::Bind { .. })));

    let mut cause: Option<&(dyn Error + 'static)> = err.source();
    let mut bind_error = None;
    while let Some(e) = cause {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            bind_error = Some(io.kind());
        }
        cause = e.source();
    }
    assert_eq!(bind_error, Some(std::io::ErrorKind::AddrInUse));

    first.stop();
}

// ==================== Invalidación diferida ====================

#[test]
fn test_deferred_invalidation_end_to_end() {
    let mut server = EmbeddedServer::new();
    server.set_front_filter(lazy_front_filter(session_app()));
    server.start_local().unwrap();

    let login = server.handle(&mut get("/login")).unwrap();
    let id = session_id(&login);

    let whoami = server.handle(&mut get_with_session("/whoami", &id)).unwrap();
    assert_eq!(whoami.body_string(), "alice");

    let logout = server.handle(&mut get_with_session("/logout", &id)).unwrap();
    assert_eq!(logout.status(), StatusCode::Ok);
    assert_eq!(logout.body_string(), "bye");
    assert!(logout.header("Set-Cookie").unwrap().contains("Max-Age=0"));

    let after = server.handle(&mut get_with_session("/whoami", &id)).unwrap();
    assert_eq!(after.body_string(), "anonymous");
}

#[test]
fn test_immediate_invalidation_fails_without_filter() {
    let mut server = EmbeddedServer::new();
    server.set_front_filter(Arc::new(session_app()));
    server.start_local().unwrap();

    let login = server.handle(&mut get("/login")).unwrap();
    let id = session_id(&login);

    // Escribir después de invalidar rompe el request
    let logout = server.handle(&mut get_with_session("/logout", &id)).unwrap();
    assert_eq!(logout.status(), StatusCode::InternalServerError);
}

// ==================== Errores de handler ====================

#[test]
fn test_panicking_handler_yields_500() {
    let mut server = EmbeddedServer::new();
    server.set_front_filter(Arc::new(
        Router::new()
            .route("/boom", |_req: &dyn ServletRequest| -> Result<Response, FilterError> {
                panic!("handler exploded")
            })
            .route("/fail", |_req: &dyn ServletRequest| Err(FilterError::Handler("broken".to_string())))
            .route("/ok", |_req: &dyn ServletRequest| Ok(Response::new(StatusCode::Ok))),
    ));
    server.start_local().unwrap();

    let boom = server.handle(&mut get("/boom")).unwrap();
    assert_eq!(boom.status(), StatusCode::InternalServerError);
    assert!(boom.body_string().contains("HTTP ERROR 500"));

    let fail = server.handle(&mut get("/fail")).unwrap();
    assert_eq!(fail.status(), StatusCode::InternalServerError);

    let ok = server.handle(&mut get("/ok")).unwrap();
    assert_eq!(ok.status(), StatusCode::Ok);
}

// ==================== Overlay de ubicaciones base ====================

#[test]
fn test_resource_overlay_priority() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "first.html", "from first");
    write(first.path(), "duplicate.html", "duplicate in first");
    write(second.path(), "second.html", "from second");
    write(second.path(), "duplicate.html", "duplicate in second");

    let mut server = EmbeddedServer::new();
    server
        .set_war_base_paths(&[
            format!("file://{}", first.path().display()),
            second.path().display().to_string(),
        ])
        .unwrap()
        .start_local()
        .unwrap();

    assert_eq!(server.handle(&mut get("/first.html")).unwrap().body_string(), "from first");
    assert_eq!(server.handle(&mut get("/second.html")).unwrap().body_string(), "from second");
    assert_eq!(
        server.handle(&mut get("/duplicate.html")).unwrap().body_string(),
        "duplicate in first"
    );
    assert_eq!(
        server.handle(&mut get("/unknown.html")).unwrap().status(),
        StatusCode::NotFound
    );
}

#[test]
fn test_war_archive_and_context_path() {
    let dir = TempDir::new().unwrap();
    let war = dir.path().join("app.war");
    write_war(&war, &[("index.html", "archived index"), ("css/site.css", "body{}")]);

    let mut server = EmbeddedServer::new();
    server
        .set_servlet_context_path("/app")
        .unwrap()
        .set_war_base_path(war.to_str().unwrap())
        .unwrap()
        .start_local()
        .unwrap();

    let index = server.handle(&mut get("/app/")).unwrap();
    assert_eq!(index.status(), StatusCode::Ok);
    assert_eq!(index.body_string(), "archived index");

    let css = server.handle(&mut get("/app/css/site.css")).unwrap();
    assert_eq!(css.content_type(), Some("text/css;charset=utf-8"));

    assert_eq!(server.handle(&mut get("/index.html")).unwrap().status(), StatusCode::NotFound);
}

#[test]
fn test_archive_interior_is_rejected() {
    let dir = TempDir::new().unwrap();
    let war = dir.path().join("app.war");
    write_war(&war, &[("WEB-INF/web.xml", "<web-app/>")]);

    let mut server = EmbeddedServer::new();
    let err = server
        .set_war_base_path(&format!("{}!/WEB-INF", war.display()))
        .unwrap_err();
    assert!(err
        .source()
        .unwrap()
        .to_string()
        .starts_with("WAR base path can not be a JAR interior path."));
}

#[test]
fn test_start_local_redeploys() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    write(first.path(), "page.html", "one");
    write(second.path(), "page.html", "two");

    let mut server = EmbeddedServer::new();
    server.set_war_base_path(first.path().to_str().unwrap()).unwrap();
    server.start_local().unwrap();
    assert_eq!(server.handle(&mut get("/page.html")).unwrap().body_string(), "one");

    server.set_war_base_path(second.path().to_str().unwrap()).unwrap();
    server.start_local().unwrap();
    assert_eq!(server.handle(&mut get("/page.html")).unwrap().body_string(), "two");
}

// ==================== Modo red ====================

#[test]
fn test_network_mode_serves_static_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "hello.txt", "hello over tcp");

    let mut server = EmbeddedServer::new();
    server
        .set_host("127.0.0.1")
        .set_port(0)
        .set_war_base_path(dir.path().to_str().unwrap())
        .unwrap()
        .start()
        .unwrap();
    let addr = server.local_addr().unwrap();

    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(b"GET /hello.txt HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n").unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();

    let response = Response::parse(&raw).unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.body_string(), "hello over tcp");

    server.stop();
    server.join();
}

#[test]
fn test_join_returns_immediately_in_local_mode() {
    let mut server = EmbeddedServer::new();
    server.start_local().unwrap();
    server.join();
    assert!(server.handle(&mut get("/")).is_ok());
}

// ==================== Dump HTTP ====================

#[test]
fn test_http_dump_rewrites_links() {
    let dump_root = TempDir::new().unwrap();

    let mut server = EmbeddedServer::new();
    server
        .set_http_dump_enabled(true)
        .set_http_dump_root(dump_root.path())
        .set_front_filter(Arc::new(Router::new().route("/app/test.html", |_req: &dyn ServletRequest| {
            Ok(Response::new(StatusCode::Ok)
                .with_header("Content-Type", "text/html;charset=utf8")
                .with_body(
                    "<link href=\"/css/common.css\"/><link href=\"relative.css\"/><a href=\"next.html;jsessionid=X1\">n</a>",
                ))
        })));
    server.start_local().unwrap();

    let response = server.handle(&mut get("/app/test.html")).unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert!(response.body_string().contains("href=\"/css/common.css\""));

    let files: Vec<_> = fs::read_dir(dump_root.path()).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with(".html"));
    assert_eq!(
        fs::read_to_string(&files[0]).unwrap(),
        "<link href=\"./css/common.css\"/><link href=\"./app/relative.css\"/><a href=\"./app/next.html\">n</a>"
    );
}

#[test]
fn test_http_dump_to_fixed_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path().join("docs").as_path(), "report.txt", "plain report");
    let target = dir.path().join("dumps/test.txt");

    let mut server = EmbeddedServer::new();
    server
        .set_http_dump_enabled(true)
        .set_http_dump_file_path(&target)
        .set_war_base_path(dir.path().join("docs").to_str().unwrap())
        .unwrap()
        .start_local()
        .unwrap();

    server.handle(&mut get("/report.txt")).unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "plain report");
}

#[test]
#[traced_test]
fn test_http_dump_failure_is_logged() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-directory");
    fs::write(&blocker, "x").unwrap();

    let mut server = EmbeddedServer::new();
    server
        .set_http_dump_enabled(true)
        .set_http_dump_file_path(blocker.join("dump.html"))
        .start_local()
        .unwrap();

    let err = server.handle(&mut get("/")).unwrap_err();
    assert!(matches!(err, ServerError::Dump { .. }));
    assert!(logs_contain(
        "an error occurred while the http dump was being written. make sure dump file path is valid"
    ));
}
