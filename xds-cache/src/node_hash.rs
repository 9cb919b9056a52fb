//! Node-hash policy (§4.5): the function from a client's reported `Node`
//! to the key its snapshots are stored under. Because EDS priority depends
//! on the client's zone, the default policy buckets by zone; other Node
//! fields never vary the computed snapshot.

use envoy_types::pb::envoy::config::core::v3::Node;
use xds_core::Strng;

pub trait NodeHash: Send + Sync {
	fn hash(&self, node: &Node) -> Strng;
}

/// Buckets clients by `node.locality.zone`, empty string if absent.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNodeHash;

impl NodeHash for DefaultNodeHash {
	fn hash(&self, node: &Node) -> Strng {
		node
			.locality
			.as_ref()
			.map(|l| xds_core::strng::new(&l.zone))
			.unwrap_or_else(|| xds_core::strng::new(""))
	}
}

/// Ignores the client entirely; every stream shares one snapshot. Useful
/// for deployments that don't need per-zone EDS variants.
#[derive(Debug, Clone)]
pub struct FixedHash(pub Strng);

impl NodeHash for FixedHash {
	fn hash(&self, _node: &Node) -> Strng {
		self.0.clone()
	}
}
