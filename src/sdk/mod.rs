/// Thin HTTP client for Tabula Store.
///
/// [`Client`] mirrors the gateway's REST routes one method per route; it
/// holds no state beyond the base URL and a connection pool.
pub mod client;

pub use client::Client;
