//! Observability: the diagnostic log stream
//!
//! Structured logging and span helpers for the session and dispatch paths.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{dispatch_span, session_span};
