/// REST gateway for Tabula Store.
///
/// This module provides the [`Registry`] of named stores and the axum
/// [`router::app`] that maps HTTP verbs and paths onto store operations.
pub mod registry;
pub mod router;

pub use registry::Registry;
pub use router::{app, AppState};
