//! RDS builders (§4.4): the route configuration paired with the API
//! listener, the server-listener's locally-terminating route
//! configuration, and the Envoy front-proxy federation variant.

use std::collections::HashMap;

use envoy_types::pb::envoy::config::route::v3::{
	NonForwardingAction, Route, RouteAction, RouteConfiguration, RouteMatch, VirtualHost,
	route::Action, route_match::PathSpecifier,
};

use crate::app::Application;

use super::names::{ENVOY_ROUTE_CONFIG, SERVER_LISTENER_ROUTE_CONFIG};
use super::pack::pack_any;
use super::rbac;

fn prefix_match(prefix: &str) -> RouteMatch {
	RouteMatch { path_specifier: Some(PathSpecifier::Prefix(prefix.to_string())), ..Default::default() }
}

/// RouteConfiguration paired with an application's API listener: one
/// wildcard virtual host, one route naming the CDS cluster.
pub fn api_listener_route_config(app: &Application) -> RouteConfiguration {
	let route = Route {
		r#match: Some(prefix_match(&app.path_prefix)),
		action: Some(Action::Route(RouteAction {
			cluster_specifier: Some(
				envoy_types::pb::envoy::config::route::v3::route_action::ClusterSpecifier::Cluster(
					app.name.to_string(),
				),
			),
			..Default::default()
		})),
		..Default::default()
	};

	RouteConfiguration {
		name: app.name.to_string(),
		virtual_hosts: vec![VirtualHost {
			name: app.name.to_string(),
			domains: vec!["*".to_string()],
			routes: vec![route],
			..Default::default()
		}],
		..Default::default()
	}
}

/// Server-listener route configuration (§4.4): a single route at `/` that
/// terminates locally rather than forwarding, optionally carrying a
/// per-route RBAC override restricted to the helloworld greeter path.
pub fn server_listener_route_config(enable_rbac: bool, allowed_namespaces: &[xds_core::Strng]) -> RouteConfiguration {
	let mut typed_per_filter_config = HashMap::new();
	if enable_rbac {
		typed_per_filter_config.insert(
			"envoy.filters.http.rbac".to_string(),
			pack_any(
				"type.googleapis.com/envoy.extensions.filters.http.rbac.v3.RBACPerRoute",
				&rbac::allow_spiffe_for_path(allowed_namespaces, rbac::GREETER_PATH_PREFIX),
			),
		);
	}

	let route = Route {
		r#match: Some(prefix_match("/")),
		action: Some(Action::NonForwardingAction(NonForwardingAction::default())),
		typed_per_filter_config,
		..Default::default()
	};

	RouteConfiguration {
		name: SERVER_LISTENER_ROUTE_CONFIG.to_string(),
		virtual_hosts: vec![VirtualHost {
			name: "inbound".to_string(),
			domains: vec!["*".to_string()],
			routes: vec![route],
			..Default::default()
		}],
		..Default::default()
	}
}

/// Envoy front-proxy federation variant (§4.4): one wildcard route config
/// with one virtual host per non-federated application. `xdstp://`-named
/// clusters (already a federation authority) are excluded.
pub fn federated_route_config<'a>(apps: impl IntoIterator<Item = &'a Application>, federation_domain: &str) -> RouteConfiguration {
	let virtual_hosts = apps
		.into_iter()
		.filter(|a| !a.name.starts_with("xdstp://"))
		.map(|app| {
			let route = Route {
				r#match: Some(prefix_match("")),
				action: Some(Action::Route(RouteAction {
					cluster_specifier: Some(
						envoy_types::pb::envoy::config::route::v3::route_action::ClusterSpecifier::Cluster(
							app.name.to_string(),
						),
					),
					..Default::default()
				})),
				..Default::default()
			};
			VirtualHost {
				name: app.name.to_string(),
				domains: vec![
					app.name.to_string(),
					format!("{}.{federation_domain}", app.name),
					format!("{}.xds.{federation_domain}", app.name),
				],
				routes: vec![route],
				..Default::default()
			}
		})
		.collect();

	RouteConfiguration { name: ENVOY_ROUTE_CONFIG.to_string(), virtual_hosts, ..Default::default() }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::app::Application;

	fn leaf() -> Application {
		Application::new("xds", "sa", "greeter-leaf", "", 50051, None::<&str>, 50051, None::<&str>, Vec::new())
	}

	#[test]
	fn api_listener_route_names_cluster() {
		let rc = api_listener_route_config(&leaf());
		assert_eq!(rc.name, "greeter-leaf");
		assert_eq!(rc.virtual_hosts.len(), 1);
		assert_eq!(rc.virtual_hosts[0].domains, vec!["*"]);
	}

	#[test]
	fn server_listener_route_terminates_locally() {
		let rc = server_listener_route_config(false, &[]);
		assert_eq!(rc.name, SERVER_LISTENER_ROUTE_CONFIG);
		let route = &rc.virtual_hosts[0].routes[0];
		assert!(matches!(route.action, Some(Action::NonForwardingAction(_))));
	}

	#[test]
	fn rbac_enabled_adds_per_route_override() {
		let ns = vec![xds_core::strng::new("xds")];
		let rc = server_listener_route_config(true, &ns);
		let route = &rc.virtual_hosts[0].routes[0];
		assert!(route.typed_per_filter_config.contains_key("envoy.filters.http.rbac"));
	}

	#[test]
	fn federation_excludes_xdstp_clusters() {
		let federated = Application::new(
			"xds", "sa", "xdstp://mesh/app", "", 1, None::<&str>, 1, None::<&str>, Vec::new(),
		);
		let rc = federated_route_config([&leaf(), &federated], "example.com");
		assert_eq!(rc.virtual_hosts.len(), 1);
		assert_eq!(rc.virtual_hosts[0].domains[1], "greeter-leaf.example.com");
	}
}
