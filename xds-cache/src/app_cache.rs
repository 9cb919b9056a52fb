//! Application cache (C2): the concurrent keyed store of the current
//! application set, written by the endpoint watcher manager (C3) and read
//! by the snapshot cache (C5) whenever it rebuilds a snapshot.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use xds_core::Strng;
use xds_model::Application;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
	pub cluster: Strng,
	pub namespace: Strng,
}

impl Scope {
	pub fn new(cluster: impl Into<Strng>, namespace: impl Into<Strng>) -> Self {
		Self { cluster: cluster.into(), namespace: namespace.into() }
	}
}

#[derive(Debug, Default)]
pub struct ApplicationCache {
	by_scope: RwLock<HashMap<Scope, BTreeSet<Application>>>,
}

impl ApplicationCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Replaces the application set for `scope`. Returns `true` iff the set
	/// actually changed, relying on `Application`'s structural equality
	/// (C1) so unrelated re-deliveries of an unchanged watch never trigger
	/// a snapshot rebuild (P3).
	pub fn put(&self, scope: Scope, apps: BTreeSet<Application>) -> bool {
		let mut guard = self.by_scope.write().expect("lock poisoned");
		match guard.get(&scope) {
			Some(existing) if *existing == apps => false,
			_ => {
				guard.insert(scope, apps);
				true
			},
		}
	}

	pub fn get(&self, scope: &Scope) -> BTreeSet<Application> {
		self.by_scope.read().expect("lock poisoned").get(scope).cloned().unwrap_or_default()
	}

	pub fn get_all(&self) -> BTreeSet<Application> {
		self.by_scope.read().expect("lock poisoned").values().flatten().cloned().collect()
	}

	/// Every application outside `scope`, used when a rebuild needs the
	/// full cross-scope view (e.g. federation, §4.4).
	pub fn get_others(&self, scope: &Scope) -> BTreeSet<Application> {
		self
			.by_scope
			.read()
			.expect("lock poisoned")
			.iter()
			.filter(|(s, _)| *s != scope)
			.flat_map(|(_, apps)| apps.iter().cloned())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use xds_model::{Application, ApplicationEndpoint, EndpointStatus};

	fn app(name: &str) -> Application {
		Application::new(
			"xds",
			"sa",
			name,
			"",
			1,
			None::<&str>,
			1,
			None::<&str>,
			[ApplicationEndpoint::new("n1", "z1", EndpointStatus::Healthy, vec![xds_core::strng::new("10.0.0.1")])],
		)
	}

	#[test]
	fn put_reports_changed_only_on_real_change() {
		let cache = ApplicationCache::new();
		let scope = Scope::new("c1", "ns");
		let apps: BTreeSet<_> = [app("a")].into();
		assert!(cache.put(scope.clone(), apps.clone()));
		assert!(!cache.put(scope.clone(), apps));
	}

	#[test]
	fn get_others_excludes_the_given_scope() {
		let cache = ApplicationCache::new();
		let s1 = Scope::new("c1", "ns1");
		let s2 = Scope::new("c1", "ns2");
		cache.put(s1.clone(), [app("a")].into());
		cache.put(s2.clone(), [app("b")].into());
		let others = cache.get_others(&s1);
		assert_eq!(others.len(), 1);
		assert_eq!(others.iter().next().unwrap().name.as_str(), "b");
	}

	#[test]
	fn missing_scope_returns_empty_set() {
		let cache = ApplicationCache::new();
		assert!(cache.get(&Scope::new("none", "none")).is_empty());
	}
}
