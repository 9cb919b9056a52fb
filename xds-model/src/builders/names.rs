//! Constant names and type URLs referenced across the builders (§6).

pub const SERVER_LISTENER_ROUTE_CONFIG: &str = "default_inbound_config";
pub const ENVOY_ROUTE_CONFIG: &str = "envoy-route-configuration";
pub const CERT_PROVIDER_INSTANCE: &str = "google_cloud_private_spiffe";

pub const TYPE_URL_LISTENER: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const TYPE_URL_ROUTE_CONFIGURATION: &str =
	"type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const TYPE_URL_CLUSTER: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const TYPE_URL_CLUSTER_LOAD_ASSIGNMENT: &str =
	"type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const TYPE_URL_SECRET: &str = "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

/// The server-side listener name template from §6. `host:port` must match
/// the data-plane bootstrap's listening address.
pub fn server_listener_name(host: &str, port: u16) -> String {
	format!("grpc/server?xds.resource.listening_address={host}:{port}")
}
