//! Tracing layers and formatters

use tracing::{Subscriber, span};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::config::JsonlConfig;
use crate::context::{DeviceContextData, DeviceContextGuard};

/// Layer that tags new spans with the active device
///
/// A span picks up the thread's [`DeviceContextGuard`] if one is set, and
/// otherwise inherits from its parent span. Work spawned onto other runtime
/// threads therefore keeps its device as long as it runs inside a tagged
/// span.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceContextLayer;

impl DeviceContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct DeviceContextExtension {
    pub data: DeviceContextData,
}

impl<S> Layer<S> for DeviceContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };

        let data = DeviceContextGuard::current().or_else(|| {
            span.parent().and_then(|parent| {
                parent
                    .extensions()
                    .get::<DeviceContextExtension>()
                    .map(|ext| ext.data.clone())
            })
        });

        if let Some(data) = data {
            span.extensions_mut().insert(DeviceContextExtension { data });
        }
    }
}

/// JSONL formatting layer writing to `writer`
pub fn jsonl_layer<S, W>(writer: W, options: &JsonlConfig) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(options.include_spans)
        .flatten_event(options.flatten_events)
        .with_file(options.include_location)
        .with_line_number(options.include_location)
        .with_thread_ids(options.include_thread_info)
        .with_thread_names(options.include_thread_info)
        .with_writer(writer)
}
