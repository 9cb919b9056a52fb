//! Validation and port-classification rules (§4.3). Every function here is
//! pure and fails closed: a rejected record is logged and skipped by the
//! caller, never propagated as a fatal error.

use xds_core::Strng;

use crate::error::ValidationError;
use crate::record::{EndpointRecord, PortInfo};

const HEALTH_PORT_NAMES: &[&str] = &["health", "healthz", "healthCheck", "healthcheck"];

pub fn validate(record: Option<&EndpointRecord>) -> Result<&EndpointRecord, ValidationError> {
	let record = record.ok_or(ValidationError::NullRecord)?;
	if record.name.is_empty() {
		return Err(ValidationError::MissingName);
	}
	if record.namespace.is_empty() {
		return Err(ValidationError::MissingNamespace);
	}
	if record.service_name.is_empty() {
		return Err(ValidationError::MissingServiceLabel);
	}
	if !record.ports.iter().any(|p| p.port != 0) {
		return Err(ValidationError::NoValidPort);
	}
	Ok(record)
}

fn is_health_port_name(name: &str) -> bool {
	HEALTH_PORT_NAMES.contains(&name)
}

/// Splits `ports` into `(serving, health)` per §4.3: the first port not
/// named as a health-check port serves traffic; if every port is a health
/// port, the first port does double duty. Ties among candidate serving
/// ports are broken by input order, so the first eligible port always
/// wins.
pub fn classify_ports(ports: &[PortInfo]) -> (&PortInfo, Option<&PortInfo>) {
	let serving = ports
		.iter()
		.find(|p| !is_health_port_name(p.name.as_str()))
		.or_else(|| ports.first())
		.expect("validate() guarantees at least one port");

	let health = ports.iter().find(|p| is_health_port_name(p.name.as_str()) && !std::ptr::eq(*p, serving));

	(serving, health)
}

/// Lowercased `app_protocol` if present, else lowercased `protocol`, else
/// `tcp`.
pub fn derive_protocol(port: &PortInfo) -> Strng {
	port
		.app_protocol
		.as_ref()
		.or(port.protocol.as_ref())
		.map(|p| xds_core::strng::new(p.to_lowercase()))
		.unwrap_or_else(|| xds_core::strng::new("tcp"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::EndpointRecord;

	fn record_with_ports(ports: Vec<PortInfo>) -> EndpointRecord {
		EndpointRecord {
			name: xds_core::strng::new("n"),
			namespace: xds_core::strng::new("ns"),
			service_name: xds_core::strng::new("svc"),
			ports,
			endpoints: Vec::new(),
		}
	}

	#[test]
	fn null_record_rejected() {
		assert_eq!(validate(None), Err(ValidationError::NullRecord));
	}

	#[test]
	fn record_without_ports_rejected() {
		let r = record_with_ports(vec![]);
		assert_eq!(validate(Some(&r)), Err(ValidationError::NoValidPort));
	}

	#[test]
	fn first_non_health_port_is_serving() {
		let ports = vec![PortInfo::new("grpc", 50051), PortInfo::new("health", 9090)];
		let (serving, health) = classify_ports(&ports);
		assert_eq!(serving.port, 50051);
		assert_eq!(health.unwrap().port, 9090);
	}

	#[test]
	fn all_health_named_falls_back_to_first() {
		let ports = vec![PortInfo::new("healthz", 9090), PortInfo::new("healthcheck", 9091)];
		let (serving, _) = classify_ports(&ports);
		assert_eq!(serving.port, 9090);
	}

	#[test]
	fn protocol_derivation_prefers_app_protocol() {
		let mut port = PortInfo::new("grpc", 50051);
		port.protocol = Some(xds_core::strng::new("TCP"));
		port.app_protocol = Some(xds_core::strng::new("GRPC"));
		assert_eq!(derive_protocol(&port).as_str(), "grpc");
	}

	#[test]
	fn protocol_derivation_defaults_to_tcp() {
		let port = PortInfo::new("p", 1);
		assert_eq!(derive_protocol(&port).as_str(), "tcp");
	}
}
