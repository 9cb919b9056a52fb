//! The endpoint-watcher manager's (C3) one external dependency: a stream
//! of endpoint events for a `(cluster, namespace, services)` scope.
//! Kubernetes API client construction is explicitly out of scope (§1); a
//! production deployment supplies its own [`EndpointSource`] backed by a
//! real informer, this crate only provides [`StaticEndpointSource`] for
//! tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use xds_core::Strng;

use crate::record::EndpointEvent;

#[async_trait]
pub trait EndpointSource: Send + Sync {
	/// Establishes a long-lived watch for `services` within
	/// `(cluster, namespace)`. The returned receiver yields one event per
	/// add/update/delete; the watch is torn down when the receiver is
	/// dropped. Retries and back-off on the underlying connection are the
	/// implementation's responsibility (§4.3).
	async fn watch(
		&self,
		cluster: Strng,
		namespace: Strng,
		services: Vec<Strng>,
	) -> anyhow::Result<mpsc::Receiver<EndpointEvent>>;
}

/// In-memory [`EndpointSource`] for tests: `push` feeds an event to every
/// watch registered for a `(cluster, namespace)` scope.
#[derive(Default)]
pub struct StaticEndpointSource {
	senders: Mutex<HashMap<(Strng, Strng), Vec<mpsc::Sender<EndpointEvent>>>>,
}

impl StaticEndpointSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn push(&self, cluster: &str, namespace: &str, event: EndpointEvent) {
		let key = (xds_core::strng::new(cluster), xds_core::strng::new(namespace));
		let guard = self.senders.lock().expect("lock poisoned");
		if let Some(senders) = guard.get(&key) {
			for tx in senders {
				let _ = tx.try_send(event.clone());
			}
		}
	}
}

#[async_trait]
impl EndpointSource for StaticEndpointSource {
	async fn watch(
		&self,
		cluster: Strng,
		namespace: Strng,
		_services: Vec<Strng>,
	) -> anyhow::Result<mpsc::Receiver<EndpointEvent>> {
		let (tx, rx) = mpsc::channel(128);
		self.senders.lock().expect("lock poisoned").entry((cluster, namespace)).or_default().push(tx);
		Ok(rx)
	}
}
