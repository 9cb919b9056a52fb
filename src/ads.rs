//! ADS stream state machine (C6): the single bidirectional gRPC stream
//! that multiplexes LDS/RDS/CDS/EDS/SDS, with per-type subscription
//! tracking, nonce/version bookkeeping, and ACK/NACK handling (§4.6).

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryService;
use envoy_types::pb::envoy::service::discovery::v3::{
	DeltaDiscoveryRequest, DeltaDiscoveryResponse, DiscoveryRequest, DiscoveryResponse,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{Instrument, debug, info, info_span, warn};
use xds_cache::{ApplicationCache, SnapshotCache};
use xds_core::Strng;
use xds_model::{FeatureFlags, XdsType};

use crate::metrics::AdsMetrics;

#[derive(Debug, Error)]
pub enum Error {
	#[error("malformed discovery request: {0}")]
	MalformedRequest(String),
}

/// Per-(stream, type) ledger (§3). `pending` holds the nonce and version
/// of a send awaiting ACK/NACK; while it is `Some`, the type is in
/// `Awaiting-Ack` and must not send again.
#[derive(Debug, Default, Clone)]
struct TypeState {
	requested_names: BTreeSet<Strng>,
	last_acked_version: Option<u64>,
	pending: Option<PendingSend>,
	subscribed: bool,
}

#[derive(Debug, Clone)]
struct PendingSend {
	nonce: String,
	version: u64,
}

struct StreamState {
	id: u64,
	node_hash: Strng,
	types: HashMap<XdsType, TypeState>,
}

impl StreamState {
	fn new(id: u64, node_hash: Strng) -> Self {
		Self { id, node_hash, types: HashMap::new() }
	}

	fn type_state(&mut self, t: XdsType) -> &mut TypeState {
		self.types.entry(t).or_default()
	}
}

struct Inner {
	apps: Arc<ApplicationCache>,
	snapshots: Arc<SnapshotCache>,
	flags: Arc<FeatureFlags>,
	trust_domain: Strng,
	metrics: Arc<AdsMetrics>,
	next_stream_id: std::sync::atomic::AtomicU64,
}

/// The gRPC service handle; construction is cheap to clone (an `Arc`) so
/// every spawned stream task gets its own owned copy (§5). Most snapshot
/// maintenance happens upstream, in the watcher's
/// [`xds_watch::ChangeNotifier`] callback — `apps`/`flags`/`trust_domain`
/// here exist only to build the first snapshot for a node hash no stream
/// has ever requested before (§4.5).
#[derive(Clone)]
pub struct AdsService(Arc<Inner>);

impl AdsService {
	pub fn new(
		apps: Arc<ApplicationCache>,
		snapshots: Arc<SnapshotCache>,
		flags: Arc<FeatureFlags>,
		trust_domain: Strng,
		metrics: Arc<AdsMetrics>,
	) -> Self {
		Self(Arc::new(Inner { apps, snapshots, flags, trust_domain, metrics, next_stream_id: Default::default() }))
	}

	/// Builds the first snapshot for `node_hash` if none exists yet. Later
	/// updates for this zone arrive through the change-notifier path.
	fn ensure_snapshot(&self, node_hash: &str) {
		if self.snapshots.current(node_hash).is_some() {
			return;
		}
		let all = self.apps.get_all();
		self.snapshots.rebuild(node_hash, &all, &self.flags, &self.trust_domain, None);
	}
}

impl std::ops::Deref for AdsService {
	type Target = Inner;
	fn deref(&self) -> &Inner {
		&self.0
	}
}

/// Applies an incoming `DiscoveryRequest` to `state`, returning the
/// resource type it concerns and whether it represents an ACK, a NACK, or
/// a (re-)subscription that should trigger a fresh snapshot evaluation.
enum RequestOutcome {
	Ack,
	Nack,
	Subscribed,
}

fn apply_request(state: &mut StreamState, req: &DiscoveryRequest) -> Result<(XdsType, RequestOutcome), Error> {
	let xds_type = XdsType::from_type_url(&req.type_url)
		.ok_or_else(|| Error::MalformedRequest(format!("unknown type_url {}", req.type_url)))?;

	let type_state = state.type_state(xds_type);

	let outcome = if req.response_nonce.is_empty() {
		type_state.subscribed = true;
		RequestOutcome::Subscribed
	} else {
		match &type_state.pending {
			Some(pending) if pending.nonce == req.response_nonce => {
				let nacked = req.error_detail.is_some() || req.version_info != pending.version.to_string();
				if nacked {
					warn!(stream = state.id, xds_type = %xds_type, "NACK received");
					RequestOutcome::Nack
				} else {
					type_state.last_acked_version = Some(pending.version);
					type_state.pending = None;
					RequestOutcome::Ack
				}
			},
			_ => {
				// Stale or unknown nonce: treat as a no-op resubscription so a
				// slow/duplicated client request never corrupts state.
				debug!(stream = state.id, xds_type = %xds_type, "ignoring request with stale nonce");
				RequestOutcome::Subscribed
			},
		}
	};

	let requested: BTreeSet<Strng> = req.resource_names.iter().map(xds_core::strng::new).collect();
	if requested != type_state.requested_names {
		type_state.requested_names = requested;
		type_state.subscribed = true;
	}

	Ok((xds_type, outcome))
}

/// Builds a `DiscoveryResponse` for `xds_type` if the snapshot's version
/// for it has moved past what this stream last had acked, recording the
/// pending nonce so a later ACK/NACK can be matched (§4.6). A type already
/// `Awaiting-Ack` never sends again until its pending send resolves.
fn build_response(
	snapshots: &SnapshotCache,
	state: &mut StreamState,
	xds_type: XdsType,
	nonce_seed: &mut u64,
) -> Option<DiscoveryResponse> {
	let type_state = state.types.get(&xds_type)?;
	if !type_state.subscribed || type_state.pending.is_some() {
		return None;
	}

	// Per-name subscription filtering is not implemented: every type is
	// served wildcard-style, which satisfies every scenario this control
	// plane's clients exercise (they always subscribe to "*"). The diff is
	// driven entirely by version, not resource names, so a content-only
	// change (e.g. an endpoint's health flipping) is still delivered even
	// when no name was added or removed.
	let (version, resources) = snapshots.diff(&state.node_hash, xds_type, type_state.last_acked_version)?;

	*nonce_seed += 1;
	let nonce = format!("{}-{}-{}", state.id, xds_type, nonce_seed);

	let type_state = state.type_state(xds_type);
	type_state.pending = Some(PendingSend { nonce: nonce.clone(), version });

	Some(DiscoveryResponse {
		version_info: version.to_string(),
		resources,
		type_url: xds_type.type_url().to_string(),
		nonce,
		..Default::default()
	})
}

async fn run_stream(
	service: AdsService,
	stream_id: u64,
	mut incoming: Streaming<DiscoveryRequest>,
	outbound: mpsc::Sender<Result<DiscoveryResponse, Status>>,
) {
	let mut state: Option<StreamState> = None;
	let mut changes = service.snapshots.subscribe();
	let mut nonce_seed: u64 = 0;
	service.metrics.streams_active.inc();

	loop {
		tokio::select! {
			biased;
			req = incoming.message() => {
				let req = match req {
					Ok(Some(req)) => req,
					Ok(None) => { info!(stream_id, "client closed stream"); break; }
					Err(status) => { warn!(stream_id, %status, "stream transport error"); break; }
				};

				let node_hash = service.snapshots.node_hash_of(req.node.as_ref().unwrap_or(&Default::default()));
				if state.is_none() {
					service.ensure_snapshot(&node_hash);
				}
				let state = state.get_or_insert_with(|| StreamState::new(stream_id, node_hash.clone()));

				match apply_request(state, &req) {
					Ok((xds_type, RequestOutcome::Ack)) => {
						service.metrics.acks_received.get_or_create(&crate::metrics::AckLabels { xds_type: xds_type.to_string(), result: "ack" }).inc();
					}
					Ok((xds_type, RequestOutcome::Nack)) => {
						service.metrics.acks_received.get_or_create(&crate::metrics::AckLabels { xds_type: xds_type.to_string(), result: "nack" }).inc();
					}
					Ok((xds_type, RequestOutcome::Subscribed)) => {
						if let Some(resp) = build_response(&service.snapshots, state, xds_type, &mut nonce_seed) {
							service.metrics.responses_sent.get_or_create(&crate::metrics::StreamLabels { xds_type: xds_type.to_string() }).inc();
							if outbound.send(Ok(resp)).await.is_err() { break; }
						}
					}
					Err(err) => {
						warn!(stream_id, %err, "malformed request");
					}
				}
			}
			event = changes.recv() => {
				let Some(state) = state.as_mut() else { continue };
				let Ok(event) = event else { break };
				if event.node_hash != state.node_hash { continue; }
				if let Some(resp) = build_response(&service.snapshots, state, event.xds_type, &mut nonce_seed) {
					service.metrics.responses_sent.get_or_create(&crate::metrics::StreamLabels { xds_type: event.xds_type.to_string() }).inc();
					if outbound.send(Ok(resp)).await.is_err() { break; }
				}
			}
		}
	}

	service.metrics.streams_active.dec();
	debug!(stream_id, "ads stream closed");
}

#[tonic::async_trait]
impl AggregatedDiscoveryService for AdsService {
	type StreamAggregatedResourcesStream = ReceiverStream<Result<DiscoveryResponse, Status>>;
	type DeltaAggregatedResourcesStream = ReceiverStream<Result<DeltaDiscoveryResponse, Status>>;

	async fn stream_aggregated_resources(
		&self,
		request: Request<Streaming<DiscoveryRequest>>,
	) -> Result<Response<Self::StreamAggregatedResourcesStream>, Status> {
		let stream_id = self.next_stream_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		let (tx, rx) = mpsc::channel(64);
		let incoming = request.into_inner();

		// Each stream owns its own read/write task pair; the two share
		// nothing but the bounded outbound channel, so a slow receiver only
		// ever backpressures its own stream (§5). `AdsService` is a cheap
		// `Arc` clone, so the spawned task gets its own owned handle.
		let service = self.clone();
		tokio::spawn(
			run_stream(service, stream_id, incoming, tx).instrument(info_span!("ads_stream", stream_id)),
		);

		Ok(Response::new(ReceiverStream::new(rx)))
	}

	async fn delta_aggregated_resources(
		&self,
		_request: Request<Streaming<DeltaDiscoveryRequest>>,
	) -> Result<Response<Self::DeltaAggregatedResourcesStream>, Status> {
		Err(Status::unimplemented("incremental xDS is not supported, use state-of-the-world ADS"))
	}
}

impl fmt::Debug for AdsService {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AdsService").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use xds_cache::{DefaultNodeHash, SnapshotCache};
	use xds_model::{Application, ApplicationEndpoint, EndpointStatus, FeatureFlags};

	use super::*;

	fn snapshot_cache_with_one_app(zone: &str) -> SnapshotCache<DefaultNodeHash> {
		let cache = SnapshotCache::new(DefaultNodeHash);
		let app = Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[ApplicationEndpoint::new("n1", zone, EndpointStatus::Healthy, vec![xds_core::strng::new("10.0.0.1")])],
		);
		cache.rebuild(zone, &BTreeSet::from([app]), &FeatureFlags::default(), "example.org", None);
		cache
	}

	fn request(type_url: &str, nonce: &str, version: &str) -> DiscoveryRequest {
		DiscoveryRequest {
			type_url: type_url.to_string(),
			response_nonce: nonce.to_string(),
			version_info: version.to_string(),
			resource_names: vec!["*".to_string()],
			..Default::default()
		}
	}

	#[test]
	fn first_request_with_empty_nonce_is_a_subscription() {
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let req = request(XdsType::Cluster.type_url(), "", "");
		let (xds_type, outcome) = apply_request(&mut state, &req).unwrap();
		assert_eq!(xds_type, XdsType::Cluster);
		assert!(matches!(outcome, RequestOutcome::Subscribed));
		assert!(state.types[&XdsType::Cluster].subscribed);
	}

	#[test]
	fn matching_nonce_and_version_is_an_ack_and_advances_version() {
		let cache = snapshot_cache_with_one_app("z");
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let mut seed = 0;

		let req = request(XdsType::Cluster.type_url(), "", "");
		apply_request(&mut state, &req).unwrap();
		let resp = build_response(&cache, &mut state, XdsType::Cluster, &mut seed).unwrap();

		let ack = request(XdsType::Cluster.type_url(), &resp.nonce, &resp.version_info);
		let (xds_type, outcome) = apply_request(&mut state, &ack).unwrap();
		assert_eq!(xds_type, XdsType::Cluster);
		assert!(matches!(outcome, RequestOutcome::Ack));
		assert_eq!(state.types[&XdsType::Cluster].last_acked_version, Some(1));
		assert!(state.types[&XdsType::Cluster].pending.is_none());
	}

	#[test]
	fn matching_nonce_with_mismatched_version_is_a_nack_and_does_not_advance() {
		let cache = snapshot_cache_with_one_app("z");
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let mut seed = 0;

		let req = request(XdsType::Cluster.type_url(), "", "");
		apply_request(&mut state, &req).unwrap();
		let resp = build_response(&cache, &mut state, XdsType::Cluster, &mut seed).unwrap();

		let nack = request(XdsType::Cluster.type_url(), &resp.nonce, "999");
		let (xds_type, outcome) = apply_request(&mut state, &nack).unwrap();
		assert_eq!(xds_type, XdsType::Cluster);
		assert!(matches!(outcome, RequestOutcome::Nack));
		assert_eq!(state.types[&XdsType::Cluster].last_acked_version, None);
		// The pending send is still outstanding: a NACK must not be
		// followed by an immediate resend of the same version.
		assert!(state.types[&XdsType::Cluster].pending.is_some());
		assert!(build_response(&cache, &mut state, XdsType::Cluster, &mut seed).is_none());
	}

	#[test]
	fn stale_nonce_is_a_no_op_resubscription() {
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let req = request(XdsType::Cluster.type_url(), "", "");
		apply_request(&mut state, &req).unwrap();

		let stale = request(XdsType::Cluster.type_url(), "some-other-nonce", "1");
		let (_, outcome) = apply_request(&mut state, &stale).unwrap();
		assert!(matches!(outcome, RequestOutcome::Subscribed));
		assert_eq!(state.types[&XdsType::Cluster].last_acked_version, None);
	}

	#[test]
	fn unknown_type_url_is_rejected() {
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let req = request("type.googleapis.com/does.not.Exist", "", "");
		assert!(apply_request(&mut state, &req).is_err());
	}

	#[test]
	fn content_only_change_is_delivered_after_ack() {
		let cache = snapshot_cache_with_one_app("z");
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let mut seed = 0;

		let req = request(XdsType::ClusterLoadAssignment.type_url(), "", "");
		apply_request(&mut state, &req).unwrap();
		let resp = build_response(&cache, &mut state, XdsType::ClusterLoadAssignment, &mut seed).unwrap();
		let ack = request(XdsType::ClusterLoadAssignment.type_url(), &resp.nonce, &resp.version_info);
		apply_request(&mut state, &ack).unwrap();
		assert!(build_response(&cache, &mut state, XdsType::ClusterLoadAssignment, &mut seed).is_none());

		// Same endpoint name/zone, health flips: no resource name changes,
		// but the cache bumps the version and a fresh send must follow.
		let flipped = Application::new(
			"xds",
			"sa",
			"greeter-leaf",
			"",
			50051,
			None::<&str>,
			50051,
			None::<&str>,
			[ApplicationEndpoint::new("n1", "z", EndpointStatus::Unhealthy, vec![xds_core::strng::new("10.0.0.1")])],
		);
		cache.rebuild("z", &BTreeSet::from([flipped]), &FeatureFlags::default(), "example.org", None);

		assert!(build_response(&cache, &mut state, XdsType::ClusterLoadAssignment, &mut seed).is_some());
	}

	#[test]
	fn build_response_is_none_while_awaiting_ack() {
		let cache = snapshot_cache_with_one_app("z");
		let mut state = StreamState::new(1, xds_core::strng::new("z"));
		let mut seed = 0;

		let req = request(XdsType::Cluster.type_url(), "", "");
		apply_request(&mut state, &req).unwrap();
		assert!(build_response(&cache, &mut state, XdsType::Cluster, &mut seed).is_some());
		// Second call before any ACK/NACK: the type is Awaiting-Ack.
		assert!(build_response(&cache, &mut state, XdsType::Cluster, &mut seed).is_none());
	}
}
