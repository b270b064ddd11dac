//! Cross-cutting HTTP middleware: request logging, loopback enforcement,
//! and ingest token checking.

pub mod ingest_token;
pub mod logging;
pub mod loopback;

pub use ingest_token::require_ingest_token;
pub use logging::request_logging;
pub use loopback::require_loopback;
