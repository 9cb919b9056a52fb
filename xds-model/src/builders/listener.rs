//! LDS builders (§4.4): the API listener used for proxy-less gRPC client
//! resolution (`xds:///<name>`), and the server-side listener used by
//! xDS-enabled gRPC servers.

use envoy_types::pb::envoy::config::core::v3::TransportSocket;
use envoy_types::pb::envoy::config::listener::v3::{ApiListener, Filter, FilterChain, Listener, filter::ConfigType};
use envoy_types::pb::envoy::extensions::filters::http::fault::v3::HttpFault;
use envoy_types::pb::envoy::extensions::filters::http::router::v3::Router;
use envoy_types::pb::envoy::extensions::filters::network::http_connection_manager::v3::{
	HttpConnectionManager, HttpFilter, Rds, http_connection_manager::RouteSpecifier,
	http_filter::ConfigType as HttpFilterConfigType,
};

use crate::app::Application;
use crate::flags::FeatureFlags;

use super::names::server_listener_name;
use super::pack::pack_any;
use super::{rbac, tls};

const HCM_TYPE_URL: &str =
	"type.googleapis.com/envoy.extensions.filters.network.http_connection_manager.v3.HttpConnectionManager";
const ROUTER_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.router.v3.Router";
const FAULT_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.fault.v3.HTTPFault";
const RBAC_TYPE_URL: &str = "type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBAC";

fn router_filter() -> HttpFilter {
	HttpFilter {
		name: "envoy.filters.http.router".to_string(),
		config_type: Some(HttpFilterConfigType::TypedConfig(pack_any(ROUTER_TYPE_URL, &Router::default()))),
		..Default::default()
	}
}

fn fault_filter() -> HttpFilter {
	HttpFilter {
		name: "envoy.filters.http.fault".to_string(),
		config_type: Some(HttpFilterConfigType::TypedConfig(pack_any(FAULT_TYPE_URL, &HttpFault::default()))),
		..Default::default()
	}
}

fn rbac_filter() -> HttpFilter {
	HttpFilter {
		name: "envoy.filters.http.rbac".to_string(),
		config_type: Some(HttpFilterConfigType::TypedConfig(pack_any(
			RBAC_TYPE_URL,
			&rbac::deny_all_http_filter(),
		))),
		..Default::default()
	}
}

/// API Listener (§4.4 item 1): fault injection then Router, Router always
/// last. The route specifier references the application's own RDS route.
pub fn api_listener(app: &Application) -> Listener {
	let hcm = HttpConnectionManager {
		stat_prefix: app.name.to_string(),
		route_specifier: Some(RouteSpecifier::Rds(Rds {
			route_config_name: app.name.to_string(),
			..Default::default()
		})),
		http_filters: vec![fault_filter(), router_filter()],
		..Default::default()
	};

	Listener {
		name: app.name.to_string(),
		api_listener: Some(ApiListener { api_listener: Some(pack_any(HCM_TYPE_URL, &hcm)) }),
		..Default::default()
	}
}

/// Server-side listener (§4.4 item 5), named per §6's
/// `grpc/server?xds.resource.listening_address=<host>:<port>` template.
/// Route configuration is inline or RDS-referenced per
/// `server_listener_uses_rds`; RBAC, when enabled, is prepended ahead of
/// Router.
pub fn server_listener(
	host: &str,
	port: u16,
	flags: &FeatureFlags,
	inline_route_config: Option<envoy_types::pb::envoy::config::route::v3::RouteConfiguration>,
) -> Listener {
	let route_specifier = if flags.server_listener_uses_rds {
		RouteSpecifier::Rds(Rds {
			route_config_name: super::names::SERVER_LISTENER_ROUTE_CONFIG.to_string(),
			..Default::default()
		})
	} else {
		RouteSpecifier::RouteConfig(inline_route_config.unwrap_or_default())
	};

	let mut http_filters = Vec::new();
	if flags.enable_rbac {
		http_filters.push(rbac_filter());
	}
	http_filters.push(router_filter());

	let hcm = HttpConnectionManager {
		stat_prefix: "inbound".to_string(),
		route_specifier: Some(route_specifier),
		http_filters,
		..Default::default()
	};

	let transport_socket = flags.enable_data_plane_tls.then(|| TransportSocket {
		name: "envoy.transport_sockets.tls".to_string(),
		config_type: Some(envoy_types::pb::envoy::config::core::v3::transport_socket::ConfigType::TypedConfig(
			pack_any(
				"type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.DownstreamTlsContext",
				&tls::downstream_tls_context(flags.require_data_plane_client_certs),
			),
		)),
	});

	Listener {
		name: server_listener_name(host, port),
		filter_chains: vec![FilterChain {
			filters: vec![Filter {
				name: "envoy.filters.network.http_connection_manager".to_string(),
				config_type: Some(ConfigType::TypedConfig(pack_any(HCM_TYPE_URL, &hcm))),
			}],
			transport_socket,
			..Default::default()
		}],
		..Default::default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::Application;
	use prost::Message;

	fn leaf() -> Application {
		Application::new("xds", "sa", "greeter-leaf", "", 50051, None::<&str>, 50051, None::<&str>, Vec::new())
	}

	#[test]
	fn api_listener_named_after_application() {
		let l = api_listener(&leaf());
		assert_eq!(l.name, "greeter-leaf");
		assert!(l.api_listener.is_some());
	}

	#[test]
	fn server_listener_name_matches_template() {
		let l = server_listener("0.0.0.0", 7070, &FeatureFlags::default(), None);
		assert_eq!(l.name, "grpc/server?xds.resource.listening_address=0.0.0.0:7070");
	}

	#[test]
	fn rbac_filter_prepended_before_router() {
		let flags = FeatureFlags {
			enable_rbac: true,
			enable_data_plane_tls: true,
			require_data_plane_client_certs: true,
			..FeatureFlags::default()
		};
		let l = server_listener("0.0.0.0", 7070, &flags, None);
		let chain = &l.filter_chains[0];
		assert_eq!(chain.filters.len(), 1);
		let ConfigType::TypedConfig(any) = chain.filters[0].config_type.clone().unwrap() else {
			panic!("expected typed config")
		};
		let hcm = HttpConnectionManager::decode(any.value.as_slice()).unwrap();
		assert_eq!(hcm.http_filters.len(), 2);
		assert_eq!(hcm.http_filters[0].name, "envoy.filters.http.rbac");
		assert_eq!(hcm.http_filters[1].name, "envoy.filters.http.router");
	}
}
