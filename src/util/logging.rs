//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `GEOSET_LOG=geoset=debug`.
pub const LOG_ENV: &str = "GEOSET_LOG";

static INIT: Once = Once::new();

/// Install a global `fmt` subscriber filtered by [`LOG_ENV`].
///
/// Safe to call more than once; only the first call has an effect. An already
/// installed global subscriber is left in place.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
        tracing::debug!("logging initialized");
    }
}
