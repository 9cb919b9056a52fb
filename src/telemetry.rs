//! Structured logging and distributed tracing setup (ambient stack): an
//! OTLP tracer provider plus the `tracing` subscriber every binary entry
//! point installs first.

use std::borrow::Cow;
use std::sync::OnceLock;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{SpanBuilder, Tracer as _};
use opentelemetry_otlp::{ExporterBuildError, SpanExporter, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{SdkTracerProvider, SpanProcessor};
use opentelemetry::{Context, KeyValue, baggage::BaggageExt, propagation::TextMapCompositePropagator};
use serde::{Deserialize, Serialize};
use tracing::info;

pub fn get_tracer() -> &'static BoxedTracer {
	static TRACER: OnceLock<BoxedTracer> = OnceLock::new();
	TRACER.get_or_init(|| global::tracer("xds-controlplane"))
}

pub fn start_span(span_name: impl Into<Cow<'static, str>>) -> SpanBuilder {
	get_tracer().span_builder(span_name)
}

fn get_resource() -> Resource {
	static RESOURCE: OnceLock<Resource> = OnceLock::new();
	RESOURCE.get_or_init(|| Resource::builder().with_service_name("xds-controlplane").build()).clone()
}

/// Baggage isn't copied onto spans automatically; this processor does it
/// on span start so request-scoped tags (e.g. a federation authority)
/// survive into the exported trace.
#[derive(Debug)]
struct EnrichWithBaggageSpanProcessor;
impl SpanProcessor for EnrichWithBaggageSpanProcessor {
	fn force_flush(&self) -> OTelSdkResult {
		Ok(())
	}

	fn shutdown(&self) -> OTelSdkResult {
		Ok(())
	}

	fn on_start(&self, span: &mut opentelemetry_sdk::trace::Span, cx: &Context) {
		use opentelemetry::trace::Span as _;
		for (kk, vv) in cx.baggage().iter() {
			span.set_attribute(KeyValue::new(kk.clone(), vv.0.clone()));
		}
	}

	fn on_end(&self, _span: opentelemetry_sdk::trace::SpanData) {}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub tracer: Tracer,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum Tracer {
	#[serde(rename = "otlp")]
	Otlp { endpoint: Option<String> },
}

pub fn init_tracer(config: Config) -> Result<SdkTracerProvider, ExporterBuildError> {
	let propagator = TextMapCompositePropagator::new(vec![
		Box::new(BaggagePropagator::new()),
		Box::new(TraceContextPropagator::new()),
	]);

	info!(cfg = ?config, "initializing tracer");
	global::set_text_map_propagator(propagator);

	let exporter = match config.tracer {
		Tracer::Otlp { endpoint } => {
			let builder = SpanExporter::builder().with_tonic();
			match endpoint {
				Some(endpoint) => builder.with_endpoint(endpoint),
				None => builder,
			}
			.build()?
		},
	};

	let provider = SdkTracerProvider::builder()
		.with_span_processor(EnrichWithBaggageSpanProcessor)
		.with_resource(get_resource())
		.with_batch_exporter(exporter)
		.build();

	global::set_tracer_provider(provider.clone());
	Ok(provider)
}
