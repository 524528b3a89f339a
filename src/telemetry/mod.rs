//! Tracing setup helpers.
//!
//! The library itself only emits `tracing` events and spans; installing a
//! subscriber is the host application's call. These helpers wire up the
//! layered subscriber most embedders want so binaries and tests stay short.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the default subscriber: env-filtered fmt output on stderr plus
/// span-trace capture for error reports.
///
/// `RUST_LOG` overrides the default `error,taskmesh=info` directive. Calling
/// this when a global subscriber is already set is a no-op, so tests can call
/// it freely.
///
/// # Examples
///
/// ```rust
/// taskmesh::telemetry::init();
/// ```
pub fn init() {
    init_with_filter("error,taskmesh=info");
}

/// Like [`init`] but with an explicit fallback filter directive, used when
/// `RUST_LOG` is unset.
pub fn init_with_filter(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("error"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    // try_init: a second call (another test in the same process) is fine.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}
