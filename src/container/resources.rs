//! # Ubicaciones base de recursos
//! src/container/resources.rs
//!
//! Una ubicación base es la raíz de contenido desplegado: un directorio con
//! un WAR extraído o el archivo WAR/JAR/ZIP en sí. Varias ubicaciones forman
//! un overlay con prioridad: gana la primera que contiene el recurso.
//!
//! Las ubicaciones se validan al construirlas; un path inválido nunca llega
//! hasta el primer request.

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extensiones que se aceptan como archivo empaquetado
const ARCHIVE_EXTENSIONS: [&str; 3] = ["war", "jar", "zip"];

/// Archivo servido cuando el path apunta a un directorio
pub const WELCOME_FILE: &str = "index.html";

/// Errores de resolución de ubicaciones base
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("unsupported resource scheme '{scheme}' in: {location}")]
    UnsupportedScheme { scheme: String, location: String },

    #[error("there was no war archive or context-root path at: {0}")]
    NotFound(String),

    #[error(
        "WAR base path can not be a JAR interior path. \
         Assign the path of the WAR archive itself \
         or a context-root directory path of a extracted WAR archive."
    )]
    ArchiveInterior(String),

    #[error("invalid archive at {path}: {source}")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Tipo de raíz
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBase {
    Directory(PathBuf),
    Archive(PathBuf),
}

/// Recurso encontrado en el overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Path relativo dentro de la ubicación (sin '/' inicial)
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Ubicación base validada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    location: String,
    base: ResourceBase,
}

impl ResourceLocator {
    /// Valida y resuelve una ubicación
    ///
    /// Acepta paths del sistema de archivos y URIs `file://`.
    ///
    /// # Ejemplo
    /// ```
    /// use embedded_server::container::resources::ResourceLocator;
    ///
    /// let dir = std::env::temp_dir();
    /// let locator = ResourceLocator::parse(&format!("file://{}", dir.display())).unwrap();
    /// assert_eq!(locator.real_path(), dir.as_path());
    ///
    /// assert!(ResourceLocator::parse("servlet://jsp/").is_err());
    /// ```
    pub fn parse(location: &str) -> Result<Self, ResourceError> {
        let path_str = match location.split_once("://") {
            Some(("file", rest)) => rest,
            Some((scheme, _)) => {
                return Err(ResourceError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    location: location.to_string(),
                })
            }
            None => location,
        };

        if path_str.contains("!/") {
            return Err(ResourceError::ArchiveInterior(location.to_string()));
        }

        let path = PathBuf::from(path_str);
        let base = match fs::metadata(&path) {
            Ok(meta) if meta.is_dir() => ResourceBase::Directory(path),
            Ok(meta) if meta.is_file() && Self::is_archive(&path) => {
                Self::open_archive(&path)?;
                ResourceBase::Archive(path)
            }
            Ok(_) => return Err(ResourceError::NotFound(location.to_string())),
            Err(_) if Self::has_file_ancestor(&path) => {
                return Err(ResourceError::ArchiveInterior(location.to_string()))
            }
            Err(_) => return Err(ResourceError::NotFound(location.to_string())),
        };

        Ok(Self {
            location: location.to_string(),
            base,
        })
    }

    fn is_archive(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| ARCHIVE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// `true` si algún ancestro existente es un archivo (path interior)
    fn has_file_ancestor(path: &Path) -> bool {
        path.ancestors()
            .skip(1)
            .filter(|p| !p.as_os_str().is_empty())
            .find_map(|p| fs::metadata(p).ok())
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }

    fn open_archive(path: &Path) -> Result<zip::ZipArchive<File>, ResourceError> {
        let file = File::open(path)?;
        zip::ZipArchive::new(file).map_err(|source| ResourceError::Archive {
            path: path.display().to_string(),
            source,
        })
    }

    /// Ubicación tal como fue configurada
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn base(&self) -> &ResourceBase {
        &self.base
    }

    /// Path real en el sistema de archivos
    pub fn real_path(&self) -> &Path {
        match &self.base {
            ResourceBase::Directory(p) | ResourceBase::Archive(p) => p,
        }
    }

    /// Lee un recurso relativo a esta ubicación
    ///
    /// `segments` ya viene normalizado (sin `.`, `..` ni vacíos). Un directorio
    /// se resuelve a su [`WELCOME_FILE`].
    fn read(&self, segments: &[&str]) -> Result<Option<Resource>, ResourceError> {
        match &self.base {
            ResourceBase::Directory(root) => {
                let mut path = segments.iter().fold(root.clone(), |p, s| p.join(s));
                let mut name = segments.join("/");
                if path.is_dir() {
                    path = path.join(WELCOME_FILE);
                    name = Self::welcome_name(&name);
                }
                if !path.is_file() {
                    return Ok(None);
                }
                Ok(Some(Resource {
                    name,
                    bytes: fs::read(path)?,
                }))
            }
            ResourceBase::Archive(root) => {
                let mut archive = Self::open_archive(root)?;
                let name = segments.join("/");
                for candidate in [name.clone(), Self::welcome_name(&name)] {
                    let entry = archive.by_name(&candidate);
                    match entry {
                        Ok(mut file) if !file.is_dir() => {
                            let mut bytes = Vec::new();
                            file.read_to_end(&mut bytes)?;
                            return Ok(Some(Resource { name: candidate, bytes }));
                        }
                        Ok(_) | Err(zip::result::ZipError::FileNotFound) => {}
                        Err(source) => {
                            return Err(ResourceError::Archive {
                                path: root.display().to_string(),
                                source,
                            })
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    fn welcome_name(dir: &str) -> String {
        if dir.is_empty() {
            WELCOME_FILE.to_string()
        } else {
            format!("{}/{}", dir, WELCOME_FILE)
        }
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

/// Overlay de ubicaciones ordenado por prioridad
#[derive(Debug, Clone, Default)]
pub struct ResourceCollection {
    locators: Vec<ResourceLocator>,
}

impl ResourceCollection {
    pub fn new(locators: Vec<ResourceLocator>) -> Self {
        Self { locators }
    }

    pub fn locators(&self) -> &[ResourceLocator] {
        &self.locators
    }

    /// Busca un recurso en las ubicaciones, la primera gana
    ///
    /// Un path con segmentos `..` nunca se resuelve.
    pub fn find(&self, path: &str) -> Result<Option<Resource>, ResourceError> {
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => return Ok(None),
                s => segments.push(s),
            }
        }

        for locator in &self.locators {
            if let Some(resource) = locator.read(&segments)? {
                return Ok(Some(resource));
            }
        }
        Ok(None)
    }
}

/// Content-Type según la extensión del recurso
pub fn content_type_for(name: &str) -> &'static str {
    let extension = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("html") | Some("htm") => "text/html;charset=utf-8",
        Some("css") => "text/css;charset=utf-8",
        Some("js") => "application/javascript;charset=utf-8",
        Some("json") => "application/json",
        Some("txt") => "text/plain;charset=utf-8",
        Some("xml") => "application/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
