//! RBAC policy (§4.7, §4.4): a deny-by-default HTTP filter prepended ahead
//! of Router, plus a per-route override that allows SPIFFE-authenticated
//! principals to reach a specific path prefix.

use std::collections::HashMap;

use envoy_types::pb::envoy::config::rbac::v3::{
	Policy, Principal, RBAC as RbacConfig, permission::Rule as PermissionRule,
	principal::Identifier as PrincipalIdentifier, rbac::Action,
};
use envoy_types::pb::envoy::extensions::filters::http::rbac::v3::{RBAC as RbacHttpFilter, RBACPerRoute};
use envoy_types::pb::envoy::r#type::matcher::v3::{
	RegexMatcher, StringMatcher, path_matcher::Rule as PathRule, string_matcher::MatchPattern,
};

use super::names;

/// The deny-by-default filter from §4.4/§4.7: `action = ALLOW` with no
/// policies denies every request that a per-route override doesn't
/// explicitly permit.
pub fn deny_all_http_filter() -> RbacHttpFilter {
	RbacHttpFilter {
		rules: Some(RbacConfig { action: Action::Allow as i32, policies: HashMap::new() }),
		..Default::default()
	}
}

/// Per-route override (§4.4, scenario 5): ALLOW principals authenticated
/// with a SPIFFE URI under one of `allowed_namespaces`, restricted to the
/// `/helloworld.Greeter/` path prefix.
pub fn allow_spiffe_for_path(allowed_namespaces: &[xds_core::Strng], path_prefix: &str) -> RBACPerRoute {
	let regex = super::tls::spiffe_regex_for_namespaces(allowed_namespaces);

	let principal = Principal {
		identifier: Some(PrincipalIdentifier::Authenticated(
			envoy_types::pb::envoy::config::rbac::v3::principal::Authenticated {
				principal_name: Some(StringMatcher {
					match_pattern: Some(MatchPattern::SafeRegex(RegexMatcher {
						regex,
						..Default::default()
					})),
					..Default::default()
				}),
			},
		)),
	};

	let permission = envoy_types::pb::envoy::config::rbac::v3::Permission {
		rule: Some(PermissionRule::UrlPath(envoy_types::pb::envoy::r#type::matcher::v3::PathMatcher {
			rule: Some(PathRule::Path(StringMatcher {
				match_pattern: Some(MatchPattern::Prefix(path_prefix.to_string())),
				..Default::default()
			})),
		})),
	};

	let mut policies = HashMap::new();
	policies.insert(
		"allow-helloworld".to_string(),
		Policy { permissions: vec![permission], principals: vec![principal], ..Default::default() },
	);

	RBACPerRoute {
		rbac: Some(RbacConfig { action: Action::Allow as i32, policies }),
	}
}

pub const GREETER_PATH_PREFIX: &str = "/helloworld.Greeter/";
pub use names::CERT_PROVIDER_INSTANCE;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn deny_all_has_no_policies() {
		let f = deny_all_http_filter();
		assert_eq!(f.rules.unwrap().policies.len(), 0);
	}

	#[test]
	fn per_route_allow_targets_greeter_prefix() {
		let ns = vec![xds_core::strng::new("xds"), xds_core::strng::new("host-certs")];
		let r = allow_spiffe_for_path(&ns, GREETER_PATH_PREFIX);
		let rbac = r.rbac.unwrap();
		assert_eq!(rbac.policies.len(), 1);
	}
}
