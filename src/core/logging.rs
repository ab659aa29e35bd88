//! Sets up `tracing` output for the CLI.

use tracing_subscriber::EnvFilter;

/// Log filter for a `-v` count; `RUST_LOG` takes precedence when set.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "prompt_pipeline=info",
        2 => "prompt_pipeline=debug",
        _ => "trace",
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout only carries
/// pipeline output.
pub fn init(verbosity: u8, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // A subscriber may already be installed (tests, embedding applications).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_directive(0), "warn");
        assert_eq!(default_directive(2), "prompt_pipeline=debug");
        assert_eq!(default_directive(9), "trace");
    }
}
