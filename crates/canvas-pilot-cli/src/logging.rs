//! tracing-subscriber setup from the `logging` config section.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use canvas_pilot_core::config::LoggingConfig;

/// Filter directives used when `RUST_LOG` is unset.
///
/// The configured level wins over `--verbose`; per-crate filters are appended.
pub fn filter_directives(logging: Option<&LoggingConfig>, verbose: bool) -> String {
    let fallback = if verbose { "debug" } else { "info" };
    let mut directives = logging
        .and_then(|l| l.level.clone())
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    for filter in logging.map(|l| l.filters.as_slice()).unwrap_or_default() {
        directives.push(',');
        directives.push_str(filter);
    }
    directives
}

pub fn init(logging: Option<&LoggingConfig>, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(logging, verbose)));

    let writer = match logging.map(|l| l.output.as_str()) {
        Some("stdout") => BoxMakeWriter::new(std::io::stdout),
        _ => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);
    if logging.is_some_and(|l| l.format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
