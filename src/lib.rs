pub mod record;
pub mod handler;
pub mod context;
pub mod trace;
pub mod platform;
pub mod env;

pub mod json;
pub mod cloud;
pub mod local;
pub mod layer;

#[cfg(feature = "middleware")]
pub mod middleware;

pub mod init;

#[cfg(test)]
mod testing;

pub use cloud::CloudHandler;
pub use context::LogContext;
pub use handler::{Handler, HandlerError};
pub use init::{init_logging, init_logging_with_config, LogFormat, LoggingConfig};
pub use layer::HandlerLayer;
pub use local::LocalHandler;
pub use platform::{on_managed_platform, service_name, Platform};
pub use record::{Attr, Level, Record, Value};
