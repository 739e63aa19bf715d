//! One-call tracing and error-report setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; nothing here runs unless
//! the embedding application asks for it. `RUST_LOG` always wins over the
//! programmatic default.

use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the default subscriber: global `warn`, this crate at `info`.
pub fn init() {
    init_with_filter("warn,topicloom=info");
}

/// Installs a subscriber with the given directives unless `RUST_LOG` is set.
///
/// Safe to call more than once; later calls are no-ops, which keeps test
/// binaries that share a process happy.
pub fn init_with_filter(directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::CLOSE);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .try_init();
}

/// Routes panic reports through miette's fancy renderer.
pub fn install_panic_hook() {
    miette::set_panic_hook();
}
