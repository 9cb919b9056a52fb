//! Canonical application model: the value types every downstream xDS
//! resource is derived from. Construction normalizes inputs so that
//! structural equality of two [`Application`] values implies their derived
//! xDS resources would be byte-identical.

use std::collections::BTreeSet;
use std::fmt;

use xds_core::Strng;

/// Health state of one serving instance, mapped from the data plane's
/// `ready`/`serving`/`terminating` signals by the endpoint watcher (C3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EndpointStatus {
	Healthy,
	Draining,
	Unhealthy,
}

/// One serving instance of an [`Application`].
///
/// Field order is significant: it is the tie-break order used when the
/// endpoint set is sorted, matching the `(node, zone, status, addresses[])`
/// comparison the model is contracted to provide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApplicationEndpoint {
	pub node: Strng,
	pub zone: Strng,
	pub status: EndpointStatus,
	pub addresses: Vec<Strng>,
}

impl ApplicationEndpoint {
	pub fn new(
		node: impl Into<Strng>,
		zone: impl Into<Strng>,
		status: EndpointStatus,
		mut addresses: Vec<Strng>,
	) -> Self {
		addresses.sort();
		addresses.dedup();
		Self { node: node.into(), zone: zone.into(), status, addresses }
	}
}

/// An addressable logical service, resolved by proxy-less gRPC clients as
/// `xds:///<name>` and by server-side listeners as
/// `grpc/server?xds.resource.listening_address=<host>:<port>`.
///
/// Field order is the total-order key the model is contracted to provide:
/// `(namespace, service_account_name, name, path_prefix, serving_port,
/// serving_protocol, health_check_port, health_check_protocol,
/// endpoints[])`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Application {
	pub namespace: Strng,
	pub service_account_name: Strng,
	pub name: Strng,
	pub path_prefix: Strng,
	pub serving_port: u16,
	pub serving_protocol: Strng,
	pub health_check_port: u16,
	pub health_check_protocol: Strng,
	pub endpoints: BTreeSet<ApplicationEndpoint>,
}

impl Application {
	/// `None` for a protocol falls back to `"tcp"`, matching C3's protocol
	/// derivation policy (§4.3): lowercase `app_protocol`, else lowercase
	/// `protocol`, else `tcp`.
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		namespace: impl Into<Strng>,
		service_account_name: impl Into<Strng>,
		name: impl Into<Strng>,
		path_prefix: impl Into<Strng>,
		serving_port: u16,
		serving_protocol: Option<impl Into<Strng>>,
		health_check_port: u16,
		health_check_protocol: Option<impl Into<Strng>>,
		endpoints: impl IntoIterator<Item = ApplicationEndpoint>,
	) -> Self {
		let lower = |s: Strng| xds_core::strng::new(s.to_lowercase());
		Self {
			namespace: namespace.into(),
			service_account_name: service_account_name.into(),
			name: name.into(),
			path_prefix: path_prefix.into(),
			serving_port,
			serving_protocol: serving_protocol
				.map(|p| lower(p.into()))
				.unwrap_or_else(|| xds_core::strng::new("tcp")),
			health_check_port,
			health_check_protocol: health_check_protocol
				.map(|p| lower(p.into()))
				.unwrap_or_else(|| xds_core::strng::new("tcp")),
			endpoints: endpoints.into_iter().collect(),
		}
	}

	/// Total order per §4.1. Delegates to the derived `Ord` impl, which
	/// walks fields in declaration order — the same order the contract
	/// names.
	pub fn compare(a: &Application, b: &Application) -> std::cmp::Ordering {
		a.cmp(b)
	}

	/// Only endpoints in this status contribute load-balanceable capacity;
	/// callers building EDS resources still emit `Draining`/`Unhealthy`
	/// entries with the matching `health_status`, they are just excluded
	/// from this convenience view.
	pub fn healthy_endpoints(&self) -> impl Iterator<Item = &ApplicationEndpoint> {
		self.endpoints.iter().filter(|e| e.status == EndpointStatus::Healthy)
	}

	/// Distinct zones across this application's endpoints, in sorted order.
	pub fn zones(&self) -> BTreeSet<&Strng> {
		self.endpoints.iter().map(|e| &e.zone).collect()
	}
}

impl fmt::Display for Application {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.namespace, self.name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn ep(node: &str, zone: &str, status: EndpointStatus, addr: &str) -> ApplicationEndpoint {
		ApplicationEndpoint::new(node, zone, status, vec![xds_core::strng::new(addr)])
	}

	#[test]
	fn structural_equality_ignores_construction_order() {
		let a = Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[
				ep("n1", "us-west1-a", EndpointStatus::Healthy, "10.0.0.1"),
				ep("n2", "us-west1-b", EndpointStatus::Healthy, "10.0.0.2"),
			],
		);
		let b = Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[
				ep("n2", "us-west1-b", EndpointStatus::Healthy, "10.0.0.2"),
				ep("n1", "us-west1-a", EndpointStatus::Healthy, "10.0.0.1"),
			],
		);
		assert_eq!(a, b);
	}

	#[test]
	fn protocol_defaults_and_lowercases() {
		let a = Application::new(
			"ns", "sa", "n", "", 1, Some("HTTP"), 1, None::<&str>, Vec::new(),
		);
		assert_eq!(a.serving_protocol.as_str(), "http");
		assert_eq!(a.health_check_protocol.as_str(), "tcp");
	}

	#[test]
	fn compare_orders_by_namespace_first() {
		let a = Application::new("a-ns", "sa", "n", "", 1, None::<&str>, 1, None::<&str>, Vec::new());
		let b = Application::new("b-ns", "sa", "n", "", 1, None::<&str>, 1, None::<&str>, Vec::new());
		assert_eq!(Application::compare(&a, &b), std::cmp::Ordering::Less);
	}
}
