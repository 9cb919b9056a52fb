//! CDS builder (§4.4 item 3): one EDS-type `Cluster` per application, with
//! optional active health checking and TLS transport socket.

use std::collections::HashMap;
use std::time::Duration;

use envoy_types::pb::envoy::config::cluster::v3::{
	Cluster, cluster::{ClusterDiscoveryType, DiscoveryType, EdsClusterConfig, LbPolicy},
};
use envoy_types::pb::envoy::config::core::v3::{
	AggregatedConfigSource, ApiVersion, ConfigSource, GrpcHealthCheck, HealthCheck, HttpHealthCheck,
	TcpHealthCheck, TransportSocket, config_source::ConfigSourceSpecifier, health_check::HealthChecker,
};
use envoy_types::pb::envoy::extensions::upstreams::http::v3::{
	HttpProtocolOptions, http_protocol_options::UpstreamProtocolOptions,
};
use envoy_types::pb::google::protobuf::Any;
use prost_types::Duration as PbDuration;

use crate::app::Application;
use crate::flags::FeatureFlags;

use super::pack::pack_any;
use super::tls;

const HTTP_PROTOCOL_OPTIONS_TYPE_URL: &str =
	"type.googleapis.com/envoy.extensions.upstreams.http.v3.HttpProtocolOptions";

fn ads_eds_config() -> ConfigSource {
	ConfigSource {
		resource_api_version: ApiVersion::V3 as i32,
		config_source_specifier: Some(ConfigSourceSpecifier::Ads(AggregatedConfigSource {})),
		..Default::default()
	}
}

fn http2_protocol_options(app: &Application) -> HashMap<String, Any> {
	let opts = HttpProtocolOptions {
		upstream_protocol_options: Some(UpstreamProtocolOptions::ExplicitHttpConfig(
			envoy_types::pb::envoy::extensions::upstreams::http::v3::http_protocol_options::ExplicitHttpConfig {
				protocol_config: Some(
					envoy_types::pb::envoy::extensions::upstreams::http::v3::http_protocol_options::explicit_http_config::ProtocolConfig::Http2ProtocolOptions(
						envoy_types::pb::envoy::config::core::v3::Http2ProtocolOptions::default(),
					),
				),
			},
		)),
		..Default::default()
	};
	let mut map = HashMap::new();
	map.insert(
		"envoy.upstreams.http.http_protocol_options".to_string(),
		pack_any(HTTP_PROTOCOL_OPTIONS_TYPE_URL, &opts),
	);
	let _ = app;
	map
}

fn health_checker(app: &Application) -> Option<HealthChecker> {
	match app.health_check_protocol.as_str() {
		"grpc" => Some(HealthChecker::GrpcHealthCheck(GrpcHealthCheck {
			service_name: app.name.to_string(),
			..Default::default()
		})),
		"http" => Some(HealthChecker::HttpHealthCheck(HttpHealthCheck {
			path: app.path_prefix.to_string(),
			..Default::default()
		})),
		"tcp" => Some(HealthChecker::TcpHealthCheck(TcpHealthCheck::default())),
		_ => None,
	}
}

fn health_check(app: &Application) -> Option<HealthCheck> {
	let checker = health_checker(app)?;
	let alt_port =
		(app.health_check_port != app.serving_port).then_some(app.health_check_port as u32);
	Some(HealthCheck {
		healthy_threshold: Some(1.into()),
		unhealthy_threshold: Some(1.into()),
		interval: Some(PbDuration { seconds: 30, nanos: 0 }),
		timeout: Some(PbDuration { seconds: 1, nanos: 0 }),
		alt_port: alt_port.map(Into::into),
		health_checker: Some(checker),
		..Default::default()
	})
}

pub fn cluster(app: &Application, flags: &FeatureFlags, trust_domain: &str) -> Cluster {
	let health_checks = health_check(app).into_iter().collect::<Vec<_>>();

	let transport_socket = flags.enable_data_plane_tls.then(|| TransportSocket {
		name: "envoy.transport_sockets.tls".to_string(),
		config_type: Some(envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType::TypedConfig(
			pack_any(
				"type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext",
				&tls::upstream_tls_context(trust_domain, &app.namespace, &app.service_account_name),
			),
		)),
	});

	Cluster {
		name: app.name.to_string(),
		cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
		eds_cluster_config: Some(EdsClusterConfig {
			eds_config: Some(ads_eds_config()),
			service_name: app.name.to_string(),
		}),
		connect_timeout: Some(PbDuration { seconds: 3, nanos: 0 }),
		lb_policy: LbPolicy::RoundRobin as i32,
		ignore_health_on_host_removal: true,
		typed_extension_protocol_options: http2_protocol_options(app),
		health_checks,
		transport_socket,
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::{Application, ApplicationEndpoint, EndpointStatus};

	fn leaf() -> Application {
		Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			Some("grpc"),
			[ApplicationEndpoint::new(
				"n1",
				"us-west1-a",
				EndpointStatus::Healthy,
				vec![xds_core::strng::new("10.0.0.1")],
			)],
		)
	}

	#[test]
	fn cluster_is_eds_type_with_round_robin() {
		let c = cluster(&leaf(), &FeatureFlags::default(), "example.org");
		assert_eq!(c.name, "greeter-leaf");
		assert!(matches!(c.cluster_discovery_type, Some(ClusterDiscoveryType::Type(t)) if t == DiscoveryType::Eds as i32));
		assert_eq!(c.lb_policy, LbPolicy::RoundRobin as i32);
		assert!(c.ignore_health_on_host_removal);
	}

	#[test]
	fn alt_port_set_only_when_distinct() {
		let c = cluster(&leaf(), &FeatureFlags::default(), "example.org");
		let hc = &c.health_checks[0];
		assert!(hc.alt_port.is_none());
	}

	#[test]
	fn tls_adds_transport_socket() {
		let flags = FeatureFlags { enable_data_plane_tls: true, ..FeatureFlags::default() };
		let c = cluster(&leaf(), &flags, "example.org");
		assert!(c.transport_socket.is_some());
	}
}
