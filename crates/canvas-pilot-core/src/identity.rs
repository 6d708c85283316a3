//! Installation name resolution.

use tracing::{debug, warn};

use crate::config::Config;

/// Name used when neither configuration nor the OS provides one.
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Resolve the installation name this process registers as.
///
/// Uses `client.installation_name` when set, then the local host name.
/// Always produces a non-empty name.
pub fn resolve_installation_name(config: &Config) -> String {
    if let Some(name) = config.installation_name() {
        debug!(name, "Using configured installation name");
        return name.trim().to_string();
    }

    match host_name() {
        Some(name) => {
            debug!(name = %name, "No installation name configured, using host name");
            name
        }
        None => {
            warn!("Could not determine host name, using {UNKNOWN_HOST}");
            UNKNOWN_HOST.to_string()
        }
    }
}

fn host_name() -> Option<String> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
