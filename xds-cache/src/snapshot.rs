//! Snapshot cache (C5): per-node-hash resource snapshots with monotonic
//! per-type versions, and the watch mechanism the ADS stream state machine
//! (C6) uses to learn when a new version has resources it hasn't sent yet.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use envoy_types::pb::envoy::config::core::v3::Node;
use envoy_types::pb::google::protobuf::Any;
use tokio::sync::broadcast;
use xds_core::Strng;
use xds_model::builders::{as_any_resource, build_application_resources, listener, route};
use xds_model::{Application, FeatureFlags, XdsType};

use crate::node_hash::NodeHash;

/// One xDS type's share of a [`Snapshot`]: its current version and the
/// named resources that make it up.
#[derive(Debug, Clone, Default)]
pub struct TypeEntry {
	pub version: u64,
	pub resources: BTreeMap<Strng, Any>,
}

/// Immutable, fully-built resource set for one node hash. Replaced
/// wholesale on update, never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
	pub types: HashMap<XdsType, TypeEntry>,
}

impl Snapshot {
	pub fn entry(&self, t: XdsType) -> TypeEntry {
		self.types.get(&t).cloned().unwrap_or_default()
	}
}

/// Emitted on the cache's broadcast channel whenever a node hash's
/// snapshot advances for a given type. The write-task side of an ADS
/// stream (C6) subscribes and re-evaluates its own subscriptions on
/// receipt rather than the cache tracking per-stream interest directly.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
	pub node_hash: Strng,
	pub xds_type: XdsType,
}

pub struct SnapshotCache<H: NodeHash = crate::node_hash::DefaultNodeHash> {
	node_hash: H,
	snapshots: RwLock<HashMap<Strng, Arc<Snapshot>>>,
	changes: broadcast::Sender<ChangeEvent>,
}

impl<H: NodeHash> SnapshotCache<H> {
	pub fn new(node_hash: H) -> Self {
		let (changes, _) = broadcast::channel(4096);
		Self { node_hash, snapshots: RwLock::new(HashMap::new()), changes }
	}

	pub fn node_hash_of(&self, node: &Node) -> Strng {
		self.node_hash.hash(node)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
		self.changes.subscribe()
	}

	/// Every node hash with at least one published snapshot, for
	/// introspection (`/debug/snapshots`).
	pub fn node_hashes(&self) -> Vec<Strng> {
		self.snapshots.read().expect("lock poisoned").keys().cloned().collect()
	}

	pub fn current(&self, node_hash: &str) -> Option<Arc<Snapshot>> {
		self.snapshots.read().expect("lock poisoned").get(node_hash).cloned()
	}

	/// Returns the full current resource set for `node_hash`/`xds_type`
	/// alongside its version, unless `known_version` already matches the
	/// entry's version. A version bump always means there is something new
	/// to push, even when the resource *names* are unchanged (e.g. an
	/// endpoint flipping healthy/unhealthy within an existing
	/// ClusterLoadAssignment) — comparing name sets alone would miss that.
	pub fn diff(&self, node_hash: &str, xds_type: XdsType, known_version: Option<u64>) -> Option<(u64, Vec<Any>)> {
		let snapshot = self.current(node_hash)?;
		let entry = snapshot.types.get(&xds_type)?;
		if known_version == Some(entry.version) {
			return None;
		}
		Some((entry.version, entry.resources.values().cloned().collect()))
	}

	/// Rebuilds the full resource set for `node_hash` from the given
	/// application view (§4.5). Bumps a type's version only if that
	/// type's resource set actually changed, and broadcasts a
	/// [`ChangeEvent`] per type that advanced.
	pub fn rebuild(
		&self,
		node_hash: &str,
		apps: &BTreeSet<Application>,
		flags: &FeatureFlags,
		trust_domain: &str,
		server_listener: Option<(&str, u16)>,
	) {
		let mut types: HashMap<XdsType, BTreeMap<Strng, Any>> = HashMap::new();
		for app in apps {
			let built = build_application_resources(app, flags, node_hash, trust_domain);
			types.entry(XdsType::Listener).or_default().insert(
				xds_core::strng::new(&built.listener.name),
				as_any_resource(XdsType::Listener, &built.listener),
			);
			types.entry(XdsType::RouteConfiguration).or_default().insert(
				xds_core::strng::new(&built.route.name),
				as_any_resource(XdsType::RouteConfiguration, &built.route),
			);
			types.entry(XdsType::Cluster).or_default().insert(
				xds_core::strng::new(&built.cluster.name),
				as_any_resource(XdsType::Cluster, &built.cluster),
			);
			types.entry(XdsType::ClusterLoadAssignment).or_default().insert(
				xds_core::strng::new(&built.load_assignment.cluster_name),
				as_any_resource(XdsType::ClusterLoadAssignment, &built.load_assignment),
			);
		}

		if let Some((host, port)) = server_listener {
			let l = listener::server_listener(host, port, flags, None);
			let rc = route::server_listener_route_config(flags.enable_rbac, &[]);
			types
				.entry(XdsType::Listener)
				.or_default()
				.insert(xds_core::strng::new(&l.name), as_any_resource(XdsType::Listener, &l));
			types
				.entry(XdsType::RouteConfiguration)
				.or_default()
				.insert(xds_core::strng::new(&rc.name), as_any_resource(XdsType::RouteConfiguration, &rc));
		}

		let mut guard = self.snapshots.write().expect("lock poisoned");
		let previous = guard.get(node_hash).cloned().unwrap_or_default();
		let mut next = Snapshot::default();
		let mut advanced = Vec::new();

		for xds_type in XdsType::ALL {
			let resources = types.remove(&xds_type).unwrap_or_default();
			let prev_entry = previous.types.get(&xds_type).cloned().unwrap_or_default();
			let changed = prev_entry.resources != resources;
			let version = if changed { prev_entry.version + 1 } else { prev_entry.version };
			if changed {
				advanced.push(xds_type);
			}
			next.types.insert(xds_type, TypeEntry { version, resources });
		}

		guard.insert(xds_core::strng::new(node_hash), Arc::new(next));
		drop(guard);

		for xds_type in advanced {
			let _ = self.changes.send(ChangeEvent { node_hash: xds_core::strng::new(node_hash), xds_type });
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::node_hash::DefaultNodeHash;
	use xds_model::{ApplicationEndpoint, EndpointStatus};

	fn leaf() -> Application {
		Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[
				ApplicationEndpoint::new("n1", "us-west1-a", EndpointStatus::Healthy, vec![xds_core::strng::new("10.0.0.1")]),
				ApplicationEndpoint::new("n2", "us-west1-b", EndpointStatus::Healthy, vec![xds_core::strng::new("10.0.0.2")]),
			],
		)
	}

	#[test]
	fn rebuild_produces_one_resource_per_type() {
		let cache = SnapshotCache::new(DefaultNodeHash);
		let apps = BTreeSet::from([leaf()]);
		cache.rebuild("us-west1-a", &apps, &FeatureFlags::default(), "example.org", None);
		let snap = cache.current("us-west1-a").unwrap();
		assert_eq!(snap.types[&XdsType::Listener].resources.len(), 1);
		assert_eq!(snap.types[&XdsType::Cluster].resources.len(), 1);
		assert_eq!(snap.types[&XdsType::ClusterLoadAssignment].resources.len(), 1);
	}

	#[test]
	fn unchanged_rebuild_does_not_bump_version() {
		let cache = SnapshotCache::new(DefaultNodeHash);
		let apps = BTreeSet::from([leaf()]);
		cache.rebuild("z", &apps, &FeatureFlags::default(), "example.org", None);
		let v1 = cache.current("z").unwrap().types[&XdsType::Cluster].version;
		cache.rebuild("z", &apps, &FeatureFlags::default(), "example.org", None);
		let v2 = cache.current("z").unwrap().types[&XdsType::Cluster].version;
		assert_eq!(v1, v2);
	}

	#[test]
	fn diff_is_none_when_known_version_matches() {
		let cache = SnapshotCache::new(DefaultNodeHash);
		let apps = BTreeSet::from([leaf()]);
		cache.rebuild("z", &apps, &FeatureFlags::default(), "example.org", None);
		let version = cache.current("z").unwrap().types[&XdsType::Cluster].version;
		assert!(cache.diff("z", XdsType::Cluster, Some(version)).is_none());
		assert!(cache.diff("z", XdsType::Cluster, None).is_some());
	}

	#[test]
	fn diff_fires_on_content_only_change_with_no_new_names() {
		let cache = SnapshotCache::new(DefaultNodeHash);
		let apps = BTreeSet::from([leaf()]);
		cache.rebuild("z", &apps, &FeatureFlags::default(), "example.org", None);
		let v1 = cache.current("z").unwrap().types[&XdsType::ClusterLoadAssignment].version;

		// Same application name, same endpoint node/zone, only the health
		// status flips. No resource name changes, but the EDS payload does.
		let flipped = Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[
				ApplicationEndpoint::new("n1", "us-west1-a", EndpointStatus::Unhealthy, vec![xds_core::strng::new("10.0.0.1")]),
				ApplicationEndpoint::new("n2", "us-west1-b", EndpointStatus::Healthy, vec![xds_core::strng::new("10.0.0.2")]),
			],
		);
		cache.rebuild("z", &BTreeSet::from([flipped]), &FeatureFlags::default(), "example.org", None);
		let v2 = cache.current("z").unwrap().types[&XdsType::ClusterLoadAssignment].version;

		assert!(v2 > v1);
		assert!(cache.diff("z", XdsType::ClusterLoadAssignment, Some(v1)).is_some());
	}
}
