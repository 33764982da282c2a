// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lookup;
pub mod protocol;
pub mod state;
pub mod types;
pub mod words;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
