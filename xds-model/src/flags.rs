//! Feature flags and policy (C7): validated toggles controlling which
//! optional resource shapes the builders (C4) emit. Immutable once loaded;
//! an `Arc<FeatureFlags>` is handed to the builders at snapshot-build time
//! so a given emitted snapshot is internally consistent.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureFlags {
	pub enable_control_plane_tls: bool,
	pub require_control_plane_client_certs: bool,
	pub enable_data_plane_tls: bool,
	pub require_data_plane_client_certs: bool,
	pub enable_rbac: bool,
	pub server_listener_uses_rds: bool,
	pub enable_federation: bool,
}

impl Default for FeatureFlags {
	fn default() -> Self {
		Self {
			enable_control_plane_tls: false,
			require_control_plane_client_certs: false,
			enable_data_plane_tls: false,
			require_data_plane_client_certs: false,
			enable_rbac: false,
			server_listener_uses_rds: false,
			enable_federation: false,
		}
	}
}

impl FeatureFlags {
	/// Parses and validates the invariants from §3:
	/// `require_*_client_certs ⇒ enable_*_tls`;
	/// `enable_rbac ⇒ enable_data_plane_tls ∧ require_data_plane_client_certs`.
	pub fn load(raw: &str) -> Result<Self> {
		let flags: FeatureFlags =
			serde_yaml::from_str(raw).map_err(|e| Error::InvalidFlags(e.to_string()))?;
		flags.validate()?;
		Ok(flags)
	}

	pub fn validate(&self) -> Result<()> {
		if self.require_control_plane_client_certs && !self.enable_control_plane_tls {
			return Err(Error::InvalidFlags(
				"requireControlPlaneClientCerts requires enableControlPlaneTls".into(),
			));
		}
		if self.require_data_plane_client_certs && !self.enable_data_plane_tls {
			return Err(Error::InvalidFlags(
				"requireDataPlaneClientCerts requires enableDataPlaneTls".into(),
			));
		}
		if self.enable_rbac && !(self.enable_data_plane_tls && self.require_data_plane_client_certs) {
			return Err(Error::InvalidFlags(
				"enableRbac requires enableDataPlaneTls and requireDataPlaneClientCerts".into(),
			));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_all_disabled_and_valid() {
		let f = FeatureFlags::default();
		assert!(f.validate().is_ok());
	}

	#[test]
	fn rbac_without_mtls_is_rejected() {
		let f = FeatureFlags { enable_rbac: true, ..FeatureFlags::default() };
		assert!(f.validate().is_err());
	}

	#[test]
	fn client_certs_without_tls_is_rejected() {
		let f = FeatureFlags { require_data_plane_client_certs: true, ..FeatureFlags::default() };
		assert!(f.validate().is_err());
	}

	#[test]
	fn load_parses_yaml_and_validates() {
		let yaml = "enableDataPlaneTls: true\nrequireDataPlaneClientCerts: true\nenableRbac: true\n";
		let f = FeatureFlags::load(yaml).unwrap();
		assert!(f.enable_rbac);
	}
}
