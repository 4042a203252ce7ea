//! Version details embedded by `build.rs`.

use chrono::{TimeZone, Utc};

/// Formats build time as human-readable UTC if the embedded value is an epoch.
fn build_time() -> String {
    let raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    raw.parse::<i64>()
        .ok()
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// One-line summary logged at startup.
pub fn describe() -> String {
    format!(
        "{} {} (branch {}, tag {}, commit {}, built {}, os {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_BRANCH").unwrap_or("unknown"),
        option_env!("GIT_TAG").unwrap_or("unknown"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        build_time(),
        option_env!("CARGO_CFG_TARGET_OS").unwrap_or("unknown"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_names_package() {
        let line = describe();
        assert!(line.starts_with("sp500-ingestor "));
        assert!(line.contains("commit "));
    }
}
