//! Tracing setup for pagesim binaries.
//!
//! `RUST_LOG` wins when set; otherwise the caller's default directives apply.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directives used when neither `RUST_LOG` nor the caller supplies any.
pub const DEFAULT_DIRECTIVES: &str = "pagesim_vis=info,pagesim=info";

/// Build the filter from `RUST_LOG`, falling back to `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into())
}

/// Install the global subscriber.
///
/// Returns an error if a global subscriber is already set.
pub fn try_init(default_directives: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
}

/// Install the global subscriber, ignoring a second call.
pub fn init(default_directives: &str) {
    if try_init(default_directives).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        init(DEFAULT_DIRECTIVES);
        assert!(try_init(DEFAULT_DIRECTIVES).is_err());
    }

    #[test]
    fn default_directives_parse() {
        let filter = EnvFilter::try_new(DEFAULT_DIRECTIVES);
        assert!(filter.is_ok());
    }
}
