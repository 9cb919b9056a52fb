use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use envoy_types::pb::envoy::service::discovery::v3::aggregated_discovery_service_server::AggregatedDiscoveryServiceServer;
use prometheus_client::registry::Registry;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use xds_cache::{ApplicationCache, DefaultNodeHash, SnapshotCache};
use xds_model::FeatureFlags;
use xds_watch::{ChangeNotifier, EndpointWatcherManager, StaticEndpointSource};

use xds_controlplane::ads::AdsService;
use xds_controlplane::config::{self, ProcessEnv};
use xds_controlplane::metrics::AdsMetrics;
use xds_controlplane::{admin, metrics};

/// xDS control-plane management server: one verb, no subcommands.
/// Unrecognized flags are rejected by `clap` before this struct is built.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Trust domain used to build SPIFFE identities for RBAC and TLS SAN
	/// matching (§4.6/§4.7).
	#[arg(long, default_value = "cluster.local")]
	trust_domain: String,
}

/// Rebuilds every node hash this process has ever served a snapshot for,
/// whenever the watcher manager (C3) reports a real application-set
/// change for some `(cluster, namespace)` scope (§4.5). The scope itself
/// doesn't narrow the rebuild: a snapshot is always built from the full
/// cross-cluster application view.
struct SnapshotRebuilder {
	apps: Arc<ApplicationCache>,
	snapshots: Arc<SnapshotCache>,
	flags: Arc<FeatureFlags>,
	trust_domain: String,
}

impl ChangeNotifier for SnapshotRebuilder {
	fn on_change(&self, cluster: &str, namespace: &str) {
		let all = self.apps.get_all();
		let zones: Vec<_> = self.snapshots.node_hashes();
		// A zone with no snapshot yet is built lazily by `AdsService` the
		// first time a client from it connects; here we only refresh zones
		// already known to be in use.
		for zone in zones {
			self.snapshots.rebuild(&zone, &all, &self.flags, &self.trust_domain, None);
		}
		info!(cluster, namespace, "application set changed, snapshots refreshed");
	}
}

fn init_tracing() {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();
	init_tracing();

	if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
		let cfg = xds_controlplane::telemetry::Config {
			tracer: xds_controlplane::telemetry::Tracer::Otlp { endpoint: Some(endpoint) },
		};
		if let Err(err) = xds_controlplane::telemetry::init_tracer(cfg) {
			warn!(%err, "failed to initialize OTLP tracer, continuing without distributed tracing");
		}
	}

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(Error::Config(err)) => {
			error!(%err, "configuration error");
			ExitCode::from(1)
		},
		Err(Error::Bind(err)) => {
			error!(%err, "failed to bind listener");
			ExitCode::from(2)
		},
	}
}

#[derive(Debug, thiserror::Error)]
enum Error {
	#[error(transparent)]
	Config(#[from] config::Error),
	#[error(transparent)]
	Bind(#[from] std::io::Error),
}

async fn run(args: Args) -> Result<(), Error> {
	let env = ProcessEnv::from_env();

	let informers = config::load_informers(&env.config_dir).await?;
	let flags = Arc::new(config::load_feature_flags(&env.config_dir).await?);

	let apps = Arc::new(ApplicationCache::new());
	let snapshots = Arc::new(SnapshotCache::new(DefaultNodeHash));

	let mut registry = Registry::default();
	let ads_metrics = Arc::new(AdsMetrics::register(metrics::sub_registry(&mut registry)));
	let registry = Arc::new(registry);

	let source = Arc::new(StaticEndpointSource::new());
	let notifier = Arc::new(SnapshotRebuilder {
		apps: apps.clone(),
		snapshots: snapshots.clone(),
		flags: flags.clone(),
		trust_domain: args.trust_domain.clone(),
	});
	let watcher = EndpointWatcherManager::new(source, apps.clone(), notifier);
	let cancellation = watcher.cancellation_token();

	let mut run_set = JoinSet::new();
	for cluster_cfg in &informers.clusters {
		for informer in &cluster_cfg.informers {
			let services: Vec<_> = informer.services.iter().map(xds_core::strng::new).collect();
			watcher
				.add_watch(xds_core::strng::new(&cluster_cfg.cluster), xds_core::strng::new(&informer.namespace), services)
				.await
				.map_err(|err| Error::Config(config::Error::InvalidInformers(err.to_string())))?;
		}
	}

	let ads_service =
		AdsService::new(apps.clone(), snapshots.clone(), flags.clone(), xds_core::strng::new(&args.trust_domain), ads_metrics);
	// Bound here, not inside the spawned task, so a port conflict fails
	// `run()` directly and maps to exit code 2 (§6) instead of a silently
	// dead background task.
	let ads_listener = tokio::net::TcpListener::bind(("0.0.0.0", env.port)).await?;
	let ads_cancellation = cancellation.clone();
	run_set.spawn(async move {
		let result = tonic::transport::Server::builder()
			.add_service(AggregatedDiscoveryServiceServer::new(ads_service))
			.serve_with_incoming_shutdown(
				tokio_stream::wrappers::TcpListenerStream::new(ads_listener),
				ads_cancellation.cancelled_owned(),
			)
			.await;
		if let Err(err) = result {
			error!(%err, "ads server exited with error");
		}
	});

	let health_listener = tokio::net::TcpListener::bind(("0.0.0.0", env.health_port)).await?;
	let admin_app = admin::App::new(snapshots.clone());
	let metrics_app = metrics::App::new(registry);
	let health_router = admin_app.router().merge(metrics_app.router());
	let health_cancellation = cancellation.clone();
	run_set.spawn(async move {
		let result = axum::serve(health_listener, health_router)
			.with_graceful_shutdown(health_cancellation.cancelled_owned())
			.await;
		if let Err(err) = result {
			error!(%err, "health/admin server exited with error");
		}
	});

	info!(port = env.port, health_port = env.health_port, "xds-controlplane started");

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!("received shutdown signal");
		}
		_ = cancellation.cancelled() => {}
	}

	cancellation.cancel();
	// §5: 5s to drain in-flight sends, then force close.
	let drain = tokio::time::timeout(std::time::Duration::from_secs(5), async {
		while let Some(result) = run_set.join_next().await {
			if let Err(err) = result {
				warn!(%err, "server task panicked during shutdown");
			}
		}
	});
	if drain.await.is_err() {
		warn!("graceful shutdown timed out, forcing close");
		run_set.abort_all();
	}

	Ok(())
}
