use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid feature flag configuration: {0}")]
	InvalidFlags(String),

	#[error("failed to build {resource} for application {application}: {reason}")]
	BuildFailed {
		resource: &'static str,
		application: xds_core::Strng,
		reason: String,
	},

	#[error("invalid locality zone {0:?}")]
	InvalidZone(String),
}

pub type Result<T> = std::result::Result<T, Error>;
