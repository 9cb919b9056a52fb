//! Endpoint watcher manager (C3): one long-lived task per
//! `(cluster, namespace, services)` scope, folding validated endpoint
//! events into [`xds_model::Application`] values and pushing them into the
//! application cache (C2) and, on real change, the snapshot cache (C5).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xds_cache::{ApplicationCache, Scope};
use xds_core::Strng;
use xds_model::{Application, ApplicationEndpoint};

use crate::record::{EndpointRecord, EventKind};
use crate::source::EndpointSource;
use crate::validate::{classify_ports, derive_protocol, validate};

/// Called after a `put` that reports `changed = true`, to ask the
/// snapshot cache (C5) to republish the scopes it affects. Kept as a
/// callback rather than a hard dependency on `xds-cache`'s `SnapshotCache`
/// so the manager stays usable in isolation (e.g. under test).
pub trait ChangeNotifier: Send + Sync {
	fn on_change(&self, cluster: &str, namespace: &str);
}

pub struct NoopNotifier;
impl ChangeNotifier for NoopNotifier {
	fn on_change(&self, _cluster: &str, _namespace: &str) {}
}

pub struct EndpointWatcherManager<S: EndpointSource + 'static> {
	source: Arc<S>,
	cache: Arc<ApplicationCache>,
	notifier: Arc<dyn ChangeNotifier>,
	cancellation: CancellationToken,
}

impl<S: EndpointSource + 'static> EndpointWatcherManager<S> {
	pub fn new(source: Arc<S>, cache: Arc<ApplicationCache>, notifier: Arc<dyn ChangeNotifier>) -> Self {
		Self { source, cache, notifier, cancellation: CancellationToken::new() }
	}

	/// A child token scoped to this manager; cancel it (or drop every
	/// clone and cancel the parent) to stop every watch within one
	/// scheduler turn (P5).
	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancellation.clone()
	}

	/// Establishes one long-lived watch over `services` within
	/// `(cluster, namespace)` and returns the task handle.
	pub async fn add_watch(
		&self,
		cluster: impl Into<Strng>,
		namespace: impl Into<Strng>,
		services: Vec<Strng>,
	) -> anyhow::Result<JoinHandle<()>> {
		let cluster = cluster.into();
		let namespace = namespace.into();
		let mut rx = self.source.watch(cluster.clone(), namespace.clone(), services).await?;

		let cache = self.cache.clone();
		let notifier = self.notifier.clone();
		let cancellation = self.cancellation.clone();
		// One task owns this watch's whole lifetime; it holds no lock
		// across the `recv().await` suspension point.
		let scope = Scope::new(cluster.clone(), namespace.clone());
		let applications: Arc<tokio::sync::Mutex<BTreeMap<Strng, Application>>> =
			Arc::new(tokio::sync::Mutex::new(BTreeMap::new()));

		Ok(tokio::spawn(async move {
			loop {
				let event = tokio::select! {
					_ = cancellation.cancelled() => {
						debug!(cluster = %scope.cluster, namespace = %scope.namespace, "watch cancelled");
						break;
					}
					event = rx.recv() => match event {
						Some(event) => event,
						None => {
							info!(cluster = %scope.cluster, namespace = %scope.namespace, "watch source closed");
							break;
						}
					}
				};

				let record = match validate(event.record.as_ref()) {
					Ok(record) => record,
					Err(err) => {
						warn!(cluster = %scope.cluster, namespace = %scope.namespace, error = %err, "skipping invalid endpoint record");
						continue;
					},
				};

				let mut apps = applications.lock().await;
				apply_event(&mut apps, event.kind, record);
				let snapshot: BTreeSet<Application> = apps.values().cloned().collect();
				drop(apps);

				if cache.put(scope.clone(), snapshot) {
					notifier.on_change(&scope.cluster, &scope.namespace);
				}
			}
		}))
	}
}

/// Folds one validated event into the watch's running application map,
/// rebuilding the single [`Application`] that record maps to.
fn apply_event(apps: &mut BTreeMap<Strng, Application>, kind: EventKind, record: &EndpointRecord) {
	match kind {
		EventKind::Deleted => {
			apps.remove(&record.name);
		},
		EventKind::Added | EventKind::Modified => {
			let (serving, health) = classify_ports(&record.ports);
			let protocol = derive_protocol(serving);
			let health_protocol = health.map(derive_protocol);

			let endpoints = record
				.endpoints
				.iter()
				.filter(|e| e.ready)
				.map(|e| ApplicationEndpoint::new(e.node.clone(), e.zone.clone(), e.status(), vec![e.address.clone()]))
				.collect::<Vec<_>>();

			let app = Application::new(
				record.namespace.clone(),
				record.service_name.clone(),
				record.name.clone(),
				xds_core::strng::new(""),
				serving.port,
				Some(protocol),
				health.map(|h| h.port).unwrap_or(serving.port),
				health_protocol,
				endpoints,
			);
			apps.insert(record.name.clone(), app);
		},
	}
}
