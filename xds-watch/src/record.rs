//! The endpoint-record shape the watcher validates and folds into
//! [`xds_model::Application`] values. Deliberately flat and source-agnostic:
//! an [`crate::source::EndpointSource`] implementation is responsible for
//! translating whatever its backing API returns (Kubernetes EndpointSlice,
//! a test fixture, …) into this shape.

use xds_core::Strng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
	pub name: Strng,
	pub port: u16,
	pub protocol: Option<Strng>,
	pub app_protocol: Option<Strng>,
}

impl PortInfo {
	pub fn new(name: impl Into<Strng>, port: u16) -> Self {
		Self { name: name.into(), port, protocol: None, app_protocol: None }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointAddress {
	pub node: Strng,
	pub zone: Strng,
	pub address: Strng,
	pub ready: bool,
	pub serving: bool,
	pub terminating: bool,
}

/// A validated record maps to data-plane health as: `Healthy` only if both
/// `ready` and `serving`; `Draining` if `terminating`; else `Unhealthy`.
impl EndpointAddress {
	pub fn status(&self) -> xds_model::EndpointStatus {
		if self.terminating {
			xds_model::EndpointStatus::Draining
		} else if self.ready && self.serving {
			xds_model::EndpointStatus::Healthy
		} else {
			xds_model::EndpointStatus::Unhealthy
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EndpointRecord {
	pub name: Strng,
	pub namespace: Strng,
	pub service_name: Strng,
	pub ports: Vec<PortInfo>,
	pub endpoints: Vec<EndpointAddress>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
	Added,
	Modified,
	Deleted,
}

/// `record` is `None` to represent a nil/malformed payload from the
/// source — the first thing §4.3's validation rules reject.
#[derive(Debug, Clone)]
pub struct EndpointEvent {
	pub kind: EventKind,
	pub record: Option<EndpointRecord>,
}
