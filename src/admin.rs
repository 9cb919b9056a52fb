// Copyright Istio Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Serialize;
use xds_cache::SnapshotCache;

#[derive(Clone)]
pub struct App {
	snapshots: Arc<SnapshotCache>,
}

impl App {
	pub fn new(snapshots: Arc<SnapshotCache>) -> Self {
		Self { snapshots }
	}

	pub fn router(&self) -> Router {
		Router::new()
			.route("/healthz", get(healthz))
			.route("/readyz", get(readyz))
			.route("/debug/snapshots", get(list_snapshots))
			.route("/debug/snapshots/{node_hash}", get(snapshot_detail))
			.with_state(self.clone())
	}
}

async fn healthz() -> &'static str {
	"ok"
}

/// Ready once at least one snapshot has been published; before that, the
/// process is up but has nothing to serve an ADS client yet.
async fn readyz(State(app): State<App>) -> Result<&'static str, StatusCode> {
	if app.snapshots.node_hashes().is_empty() {
		Err(StatusCode::SERVICE_UNAVAILABLE)
	} else {
		Ok("ok")
	}
}

async fn list_snapshots(State(app): State<App>) -> Result<String, StatusCode> {
	let hashes: Vec<String> = app.snapshots.node_hashes().into_iter().map(|h| h.to_string()).collect();
	serde_json::to_string(&hashes).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

#[derive(Serialize)]
struct TypeSummary {
	xds_type: String,
	version: u64,
	resources: Vec<String>,
}

async fn snapshot_detail(State(app): State<App>, Path(node_hash): Path<String>) -> Result<String, StatusCode> {
	let snapshot = app.snapshots.current(&node_hash).ok_or(StatusCode::NOT_FOUND)?;
	let summary: Vec<TypeSummary> = xds_model::XdsType::ALL
		.into_iter()
		.map(|t| {
			let entry = snapshot.entry(t);
			TypeSummary {
				xds_type: t.to_string(),
				version: entry.version,
				resources: entry.resources.keys().map(|k| k.to_string()).collect(),
			}
		})
		.collect();
	serde_json::to_string(&summary).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
