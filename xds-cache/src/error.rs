use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("snapshot build failed for node hash {node_hash:?}: {reason}")]
	SnapshotBuildFailed { node_hash: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
