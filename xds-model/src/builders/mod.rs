//! Pure xDS resource builders (C4). Every function here is referentially
//! transparent: given the same `Application`, `FeatureFlags`, and client
//! zone, it returns byte-identical protobuf messages (P1).

pub mod cluster;
pub mod endpoint;
pub mod listener;
pub mod names;
pub mod pack;
pub mod rbac;
pub mod route;
pub mod tls;

use crate::app::Application;
use crate::flags::FeatureFlags;
use crate::xds_type::XdsType;

use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::endpoint::v3::ClusterLoadAssignment;
use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use envoy_types::pb::google::protobuf::Any;
use prost::Message;

use self::pack::pack_any;

/// The full set of per-application artifacts for a single client zone
/// (§4.4): API listener, its RDS route, the CDS cluster, and the EDS
/// assignment. The server-side listener is built separately since it is
/// per-deployment, not per-application.
pub struct ApplicationResources {
	pub listener: Listener,
	pub route: RouteConfiguration,
	pub cluster: Cluster,
	pub load_assignment: ClusterLoadAssignment,
}

pub fn build_application_resources(
	app: &Application,
	flags: &FeatureFlags,
	client_zone: &str,
	trust_domain: &str,
) -> ApplicationResources {
	ApplicationResources {
		listener: listener::api_listener(app),
		route: route::api_listener_route_config(app),
		cluster: cluster::cluster(app, flags, trust_domain),
		load_assignment: endpoint::cluster_load_assignment(app, client_zone),
	}
}

/// Packs a builder's output as a named, typed `Any` resource, the unit
/// the snapshot cache (C5) and the ADS stream (C6) exchange.
pub fn as_any_resource(xds_type: XdsType, msg: &impl Message) -> Any {
	pack_any(xds_type.type_url(), msg)
}
