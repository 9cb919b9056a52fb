//! EDS builder (§4.4 item 4): groups an application's endpoints by zone
//! into localities, assigns priority via the locality mapper (C8), and
//! lowers each endpoint address to an Envoy `LbEndpoint`.

use std::collections::BTreeMap;

use envoy_types::pb::envoy::config::core::v3::{
	Address, HealthStatus, Locality, SocketAddress, address::Address as AddressKind,
	socket_address::{PortSpecifier, Protocol},
};
use envoy_types::pb::envoy::config::endpoint::v3::{
	ClusterLoadAssignment, Endpoint as LbTarget, LbEndpoint, LocalityLbEndpoints,
	lb_endpoint::HostIdentifier,
};

use crate::app::{Application, ApplicationEndpoint, EndpointStatus};
use crate::locality::LocalityPriorityMapper;

fn health_status(status: EndpointStatus) -> i32 {
	match status {
		EndpointStatus::Healthy => HealthStatus::Healthy as i32,
		EndpointStatus::Draining => HealthStatus::Draining as i32,
		EndpointStatus::Unhealthy => HealthStatus::Unhealthy as i32,
	}
}

fn lb_endpoint(serving_port: u16, endpoint: &ApplicationEndpoint, address: &str) -> LbEndpoint {
	LbEndpoint {
		host_identifier: Some(HostIdentifier::Endpoint(LbTarget {
			address: Some(Address {
				address: Some(AddressKind::SocketAddress(SocketAddress {
					protocol: Protocol::Tcp as i32,
					address: address.to_string(),
					port_specifier: Some(PortSpecifier::PortValue(serving_port as u32)),
					..Default::default()
				})),
			}),
			..Default::default()
		})),
		health_status: health_status(endpoint.status),
		..Default::default()
	}
}

/// Builds the EDS resource for `app`, ranking localities by zone distance
/// from `client_zone` (empty string collapses every zone into priority 0).
pub fn cluster_load_assignment(app: &Application, client_zone: &str) -> ClusterLoadAssignment {
	let mut by_zone: BTreeMap<&str, Vec<&ApplicationEndpoint>> = BTreeMap::new();
	for ep in &app.endpoints {
		by_zone.entry(ep.zone.as_str()).or_default().push(ep);
	}

	let priorities = LocalityPriorityMapper::assign(client_zone, by_zone.keys().copied());

	// BTreeMap keys already iterate in alphabetical order, matching the
	// deterministic locality ordering the contract requires.
	let endpoints = by_zone
		.into_iter()
		.map(|(zone, eps)| {
			let lb_endpoints = eps
				.iter()
				.flat_map(|ep| ep.addresses.iter().map(move |addr| lb_endpoint(app.serving_port, ep, addr)))
				.collect::<Vec<_>>();
			LocalityLbEndpoints {
				locality: Some(Locality { zone: zone.to_string(), ..Default::default() }),
				lb_endpoints,
				load_balancing_weight: Some((eps.len() as u32).into()),
				priority: priorities.get(zone).copied().unwrap_or(0),
				..Default::default()
			}
		})
		.collect();

	ClusterLoadAssignment {
		cluster_name: app.name.to_string(),
		endpoints,
		// gRPC's xDS bootstrap expects an unscaled distribution across
		// priorities; Envoy's own default of 140 would under-allocate to
		// lower-priority localities when failing over.
		policy: Some(envoy_types::pb::envoy::config::endpoint::v3::cluster_load_assignment::Policy {
			overprovisioning_factor: Some(100u32.into()),
			..Default::default()
		}),
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::{Application, ApplicationEndpoint, EndpointStatus};

	fn app_with(eps: Vec<ApplicationEndpoint>) -> Application {
		Application::new("xds", "sa", "greeter-leaf", "", 50051, None::<&str>, 50051, None::<&str>, eps)
	}

	#[test]
	fn scenario_1_two_localities_priority_by_client_zone() {
		let app = app_with(vec![
			ApplicationEndpoint::new(
				"n1",
				"us-west1-a",
				EndpointStatus::Healthy,
				vec![xds_core::strng::new("10.0.0.1")],
			),
			ApplicationEndpoint::new(
				"n2",
				"us-west1-b",
				EndpointStatus::Healthy,
				vec![xds_core::strng::new("10.0.0.2")],
			),
		]);
		let cla = cluster_load_assignment(&app, "us-west1-a");
		assert_eq!(cla.endpoints.len(), 2);
		let a = cla.endpoints.iter().find(|l| l.locality.as_ref().unwrap().zone == "us-west1-a").unwrap();
		let b = cla.endpoints.iter().find(|l| l.locality.as_ref().unwrap().zone == "us-west1-b").unwrap();
		assert_eq!(a.priority, 0);
		assert_eq!(b.priority, 1);
		assert_eq!(a.lb_endpoints.len(), 1);
		assert_eq!(a.load_balancing_weight.unwrap().value, 1);
	}

	#[test]
	fn draining_status_maps_to_draining_health() {
		let app = app_with(vec![ApplicationEndpoint::new(
			"n1",
			"us-west1-a",
			EndpointStatus::Draining,
			vec![xds_core::strng::new("10.0.0.1")],
		)]);
		let cla = cluster_load_assignment(&app, "us-west1-a");
		let ep = &cla.endpoints[0].lb_endpoints[0];
		assert_eq!(ep.health_status, HealthStatus::Draining as i32);
	}
}
