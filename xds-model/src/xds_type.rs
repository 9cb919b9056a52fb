//! The five xDS resource type discriminants this control plane speaks.

use std::fmt;

use crate::builders::names::{
	TYPE_URL_CLUSTER, TYPE_URL_CLUSTER_LOAD_ASSIGNMENT, TYPE_URL_LISTENER, TYPE_URL_ROUTE_CONFIGURATION,
	TYPE_URL_SECRET,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum XdsType {
	Listener,
	RouteConfiguration,
	Cluster,
	ClusterLoadAssignment,
	Secret,
}

impl XdsType {
	pub const ALL: [XdsType; 5] = [
		XdsType::Listener,
		XdsType::RouteConfiguration,
		XdsType::Cluster,
		XdsType::ClusterLoadAssignment,
		XdsType::Secret,
	];

	pub fn type_url(self) -> &'static str {
		match self {
			XdsType::Listener => TYPE_URL_LISTENER,
			XdsType::RouteConfiguration => TYPE_URL_ROUTE_CONFIGURATION,
			XdsType::Cluster => TYPE_URL_CLUSTER,
			XdsType::ClusterLoadAssignment => TYPE_URL_CLUSTER_LOAD_ASSIGNMENT,
			XdsType::Secret => TYPE_URL_SECRET,
		}
	}

	pub fn from_type_url(url: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|t| t.type_url() == url)
	}

	pub fn short_name(self) -> &'static str {
		match self {
			XdsType::Listener => "LDS",
			XdsType::RouteConfiguration => "RDS",
			XdsType::Cluster => "CDS",
			XdsType::ClusterLoadAssignment => "EDS",
			XdsType::Secret => "SDS",
		}
	}
}

impl fmt::Display for XdsType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.short_name())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn type_url_roundtrips() {
		for t in XdsType::ALL {
			assert_eq!(XdsType::from_type_url(t.type_url()), Some(t));
		}
	}
}
