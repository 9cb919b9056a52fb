//! TLS resource shapes (§4.7): downstream (control-plane and data-plane
//! server) and upstream (data-plane client) transport sockets, both backed
//! by the `google_cloud_private_spiffe` certificate-provider instance and
//! static SDS secret names rather than inline material.

use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::{
	CertificateProviderPluginInstance, CertificateValidationContext, CombinedCertificateValidationContext,
	CommonTlsContext, DownstreamTlsContext, SdsSecretConfig, UpstreamTlsContext,
	common_tls_context::ValidationContextType,
};

use xds_core::Strng;

use super::names::CERT_PROVIDER_INSTANCE;

fn cert_provider(cert_name: &str) -> CertificateProviderPluginInstance {
	CertificateProviderPluginInstance {
		instance_name: CERT_PROVIDER_INSTANCE.to_string(),
		certificate_name: cert_name.to_string(),
	}
}

fn sds(name: &str) -> SdsSecretConfig {
	SdsSecretConfig { name: name.to_string(), ..Default::default() }
}

/// Builds the downstream (server-side) TLS context described in §4.7.
/// `require_client_certs` attaches mTLS validation backed by the `ROOTCA`
/// provider instance.
pub fn downstream_tls_context(require_client_certs: bool) -> DownstreamTlsContext {
	let mut common = CommonTlsContext {
		alpn_protocols: vec!["h2".to_string()],
		tls_certificate_certificate_provider_instance: Some(cert_provider("DEFAULT")),
		tls_certificate_sds_secret_configs: vec![sds("downstream_cert")],
		..Default::default()
	};

	if require_client_certs {
		common.validation_context_type = Some(ValidationContextType::CombinedValidationContext(
			CombinedCertificateValidationContext {
				default_validation_context: Some(CertificateValidationContext::default()),
				validation_context_certificate_provider_instance: Some(cert_provider("ROOTCA")),
				validation_context_sds_secret_config: Some(sds("downstream_validation")),
				..Default::default()
			},
		));
	}

	DownstreamTlsContext {
		common_tls_context: Some(common),
		require_client_certificate: Some(require_client_certs),
		..Default::default()
	}
}

/// Builds the upstream (data-plane client) TLS context for a call to
/// `application`, verifying the peer's SPIFFE URI matches
/// `spiffe://<trust-domain>/ns/<ns>/sa/<sa>`.
pub fn upstream_tls_context(trust_domain: &str, namespace: &str, service_account: &str) -> UpstreamTlsContext {
	let spiffe_uri = format!("spiffe://{trust_domain}/ns/{namespace}/sa/{service_account}");
	let validation = CertificateValidationContext {
		match_typed_subject_alt_names: vec![exact_san_matcher(&spiffe_uri)],
		..Default::default()
	};

	let common = CommonTlsContext {
		alpn_protocols: vec!["h2".to_string()],
		tls_certificate_certificate_provider_instance: Some(cert_provider("DEFAULT")),
		tls_certificate_sds_secret_configs: vec![sds("upstream_cert")],
		validation_context_type: Some(ValidationContextType::CombinedValidationContext(
			CombinedCertificateValidationContext {
				default_validation_context: Some(validation),
				validation_context_certificate_provider_instance: Some(cert_provider("ROOTCA")),
				validation_context_sds_secret_config: Some(sds("upstream_validation")),
				..Default::default()
			},
		)),
		..Default::default()
	};

	UpstreamTlsContext { common_tls_context: Some(common), ..Default::default() }
}

fn exact_san_matcher(
	uri: &str,
) -> envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::SubjectAltNameMatcher {
	use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::subject_alt_name_matcher::SanType;
	use envoy_types::pb::envoy::r#type::matcher::v3::StringMatcher;
	use envoy_types::pb::envoy::r#type::matcher::v3::string_matcher::MatchPattern;

	envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::SubjectAltNameMatcher {
		san_type: SanType::Uri as i32,
		matcher: Some(StringMatcher {
			match_pattern: Some(MatchPattern::Exact(uri.to_string())),
			..Default::default()
		}),
	}
}

pub fn spiffe_regex_for_namespaces(allowed_namespaces: &[Strng]) -> String {
	let piped = allowed_namespaces.iter().map(|n| n.as_str()).collect::<Vec<_>>().join("|");
	format!("spiffe://[^/]+/ns/({piped})/sa/.+")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spiffe_regex_joins_namespaces() {
		let re = spiffe_regex_for_namespaces(&[xds_core::strng::new("xds"), xds_core::strng::new("host-certs")]);
		assert_eq!(re, "spiffe://[^/]+/ns/(xds|host-certs)/sa/.+");
	}

	#[test]
	fn downstream_context_without_client_certs_has_no_validation() {
		let ctx = downstream_tls_context(false);
		assert_eq!(ctx.require_client_certificate, Some(false));
		assert!(
			ctx
				.common_tls_context
				.unwrap()
				.validation_context_type
				.is_none()
		);
	}
}
