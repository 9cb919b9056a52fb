//! Configuration surface (§6): `informers.yaml` and `xds_features.yaml`,
//! read once at startup from `CONFIG_DIR` and validated before the server
//! starts accepting streams. Unrecognized environment variables are
//! ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xds_model::FeatureFlags;

#[derive(Debug, Error)]
pub enum Error {
	#[error("failed to read {path}: {source}")]
	Read { path: PathBuf, #[source] source: std::io::Error },
	#[error("failed to parse {path}: {source}")]
	Parse { path: PathBuf, #[source] source: serde_yaml::Error },
	#[error("invalid informers config: {0}")]
	InvalidInformers(String),
	#[error(transparent)]
	InvalidFlags(#[from] xds_model::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InformerConfig {
	pub namespace: String,
	pub services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInformers {
	pub cluster: String,
	pub informers: Vec<InformerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InformersConfig {
	pub clusters: Vec<ClusterInformers>,
}

impl InformersConfig {
	/// Validates the §6 constraints: at least one cluster, unique cluster
	/// names, at least one namespace per cluster, unique namespaces within
	/// a cluster, and non-empty service lists.
	pub fn validate(&self) -> Result<()> {
		if self.clusters.is_empty() {
			return Err(Error::InvalidInformers("at least one cluster is required".into()));
		}
		let mut seen_clusters = HashSet::new();
		for c in &self.clusters {
			if !seen_clusters.insert(&c.cluster) {
				return Err(Error::InvalidInformers(format!("duplicate cluster {}", c.cluster)));
			}
			if c.informers.is_empty() {
				return Err(Error::InvalidInformers(format!("cluster {} has no namespaces", c.cluster)));
			}
			let mut seen_namespaces = HashSet::new();
			for informer in &c.informers {
				if !seen_namespaces.insert(&informer.namespace) {
					return Err(Error::InvalidInformers(format!(
						"duplicate namespace {} in cluster {}",
						informer.namespace, c.cluster
					)));
				}
				if informer.services.is_empty() {
					return Err(Error::InvalidInformers(format!(
						"namespace {} in cluster {} has no services",
						informer.namespace, c.cluster
					)));
				}
			}
		}
		Ok(())
	}
}

async fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
	let raw = tokio::fs::read_to_string(path)
		.await
		.map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
	serde_yaml::from_str(&raw).map_err(|source| Error::Parse { path: path.to_path_buf(), source })
}

pub async fn load_informers(config_dir: &Path) -> Result<InformersConfig> {
	let cfg: InformersConfig = read_yaml(&config_dir.join("informers.yaml")).await?;
	cfg.validate()?;
	Ok(cfg)
}

pub async fn load_feature_flags(config_dir: &Path) -> Result<FeatureFlags> {
	let raw = tokio::fs::read_to_string(config_dir.join("xds_features.yaml"))
		.await
		.map_err(|source| Error::Read { path: config_dir.join("xds_features.yaml"), source })?;
	Ok(FeatureFlags::load(&raw)?)
}

/// Process identity inputs (§6): the `PORT`/`HEALTH_PORT`/`CONFIG_DIR`
/// environment variables read once at startup.
#[derive(Debug, Clone)]
pub struct ProcessEnv {
	pub port: u16,
	pub health_port: u16,
	pub config_dir: PathBuf,
}

impl ProcessEnv {
	pub fn from_env() -> Self {
		let port = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(18000);
		let health_port = std::env::var("HEALTH_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(19000);
		let config_dir = std::env::var("CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("/etc/xds-controlplane"));
		Self { port, health_port, config_dir }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejects_empty_clusters() {
		let cfg = InformersConfig { clusters: vec![] };
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn rejects_duplicate_cluster_names() {
		let cfg = InformersConfig {
			clusters: vec![
				ClusterInformers {
					cluster: "c1".into(),
					informers: vec![InformerConfig { namespace: "ns".into(), services: vec!["svc".into()] }],
				},
				ClusterInformers {
					cluster: "c1".into(),
					informers: vec![InformerConfig { namespace: "ns2".into(), services: vec!["svc".into()] }],
				},
			],
		};
		assert!(cfg.validate().is_err());
	}

	#[test]
	fn accepts_well_formed_config() {
		let cfg = InformersConfig {
			clusters: vec![ClusterInformers {
				cluster: "c1".into(),
				informers: vec![InformerConfig { namespace: "xds".into(), services: vec!["greeter-leaf".into()] }],
			}],
		};
		assert!(cfg.validate().is_ok());
	}
}
