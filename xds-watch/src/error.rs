use thiserror::Error;

/// Endpoint-record-invalid (§7): always non-fatal. The watcher logs these
/// and skips the record; it never terminates the watch task.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("endpoint record is null")]
	NullRecord,
	#[error("endpoint record missing name")]
	MissingName,
	#[error("endpoint record missing namespace")]
	MissingNamespace,
	#[error("endpoint record missing service-name label")]
	MissingServiceLabel,
	#[error("endpoint record has no port with a numeric value")]
	NoValidPort,
}

#[derive(Debug, Error)]
pub enum Error {
	#[error("watch source error for cluster {cluster} namespace {namespace}: {source}")]
	Source {
		cluster: String,
		namespace: String,
		#[source]
		source: anyhow::Error,
	},
}

pub type Result<T> = std::result::Result<T, Error>;
