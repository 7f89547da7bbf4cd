//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig built in code, or config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → owned by HttpServer for the process lifetime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server is initialized
//! - All fields have defaults to allow minimal configs; zero means "use the default"
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ClientConfig;
pub use schema::CorsConfig;
pub use schema::DefaultPaths;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::RateLimitConfig;
pub use schema::ServerConfig;
pub use validation::{validate_config, ValidationError};
