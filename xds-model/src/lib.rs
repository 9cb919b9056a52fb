//! Canonical application model, feature flags, locality priority mapping,
//! and the pure xDS resource builders (C1, C4, C7, C8).

pub mod app;
pub mod builders;
pub mod error;
pub mod flags;
pub mod locality;
pub mod xds_type;

pub use app::{Application, ApplicationEndpoint, EndpointStatus};
pub use error::{Error, Result};
pub use flags::FeatureFlags;
pub use locality::LocalityPriorityMapper;
pub use xds_type::XdsType;
