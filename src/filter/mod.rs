//! # Filtros
//! src/filter/mod.rs
//!
//! Filtros que se despliegan delante de la aplicación:
//! - `lazy_invalidation`: difiere la invalidación de sesión hasta el final de la cadena
//! - `router`: despacha paths a handlers y deja el resto a los recursos estáticos

pub mod lazy_invalidation;
pub mod router;

pub use lazy_invalidation::{LazySessionInvalidationFilter, RequestWrapper, SessionWrapper};
pub use router::{Handler, Router};
