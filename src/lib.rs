// ABOUTME: Root library module exposing the LINE concierge's platform and service modules
// ABOUTME: LINE webhook and reply client, Sheets knowledge store, Gemini backend, HTTP server

pub mod gemini;
pub mod line;
pub mod sheets;
pub mod utils;
pub mod webhook;

// Re-export platform-agnostic modules from concierge-core
pub use concierge_core::config;
pub use concierge_core::metrics;
