//! Endpoint watcher manager (C3): validates and folds raw endpoint events
//! into the application model, and pushes the result into the application
//! cache.

pub mod error;
pub mod manager;
pub mod record;
pub mod source;
pub mod validate;

pub use error::{Error, Result, ValidationError};
pub use manager::{ChangeNotifier, EndpointWatcherManager, NoopNotifier};
pub use record::{EndpointAddress, EndpointEvent, EndpointRecord, EventKind, PortInfo};
pub use source::{EndpointSource, StaticEndpointSource};
