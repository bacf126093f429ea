use std::path::Path;

use anyhow::{Context, bail};
use indoc::formatdoc;

use crate::{Config, StorageConfig};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| format!("Failed to parse configuration file {}", path.display()))?;

    let warnings = validate(&config)?;

    for warning in warnings {
        log::warn!("{warning}");
    }

    Ok(config)
}

/// Checks settings the server cannot start with. Returns warnings for settings that are
/// accepted but adjusted.
pub(crate) fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let health = &config.server.health;

    if health.enabled && !health.path.starts_with('/') {
        bail!(
            "Invalid health endpoint path '{}': server.health.path must start with '/'",
            health.path
        );
    }

    validate_rate_limits(config)
}

/// Rejects rate limit settings the limiter cannot honor. Returns warnings for settings that
/// are accepted but adjusted.
fn validate_rate_limits(config: &Config) -> anyhow::Result<Vec<String>> {
    let rate_limits = &config.server.rate_limits;
    let mut warnings = Vec::new();

    if rate_limits.limit == 0 {
        bail!(formatdoc! {r#"
            Invalid rate limit: server.rate_limits.limit must be at least 1.

            To reject every request, remove the route instead. To disable rate limiting:

              [server.rate_limits]
              enabled = false
        "#});
    }

    if rate_limits.window.as_secs() == 0 {
        bail!(
            "Invalid rate limit window {:?}: server.rate_limits.window must be at least one second",
            rate_limits.window
        );
    }

    if rate_limits.window.subsec_nanos() != 0 {
        warnings.push(format!(
            "Rate limit window {:?} is not a whole number of seconds, counters will expire after {}s",
            rate_limits.window,
            rate_limits.quota().window_secs()
        ));
    }

    if let StorageConfig::Redis(redis) = &rate_limits.storage
        && !(redis.url.starts_with("redis://") || redis.url.starts_with("rediss://"))
    {
        bail!(
            "Invalid Redis URL '{}': expected a redis:// or rediss:// scheme",
            redis.url
        );
    }

    if !rate_limits.enabled && matches!(rate_limits.storage, StorageConfig::Redis(_)) {
        warnings.push("Redis storage is configured but rate limiting is disabled".to_string());
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use indoc::indoc;
    use insta::assert_snapshot;

    use crate::Config;

    use super::*;

    fn parse(config: &str) -> Config {
        toml::from_str(config).unwrap()
    }

    #[test]
    fn default_config_is_valid() {
        let warnings = validate_rate_limits(&Config::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn zero_limit_fails() {
        let config = parse(indoc! {r#"
            [server.rate_limits]
            enabled = true
            limit = 0
        "#});

        let error = validate_rate_limits(&config).unwrap_err();

        assert_snapshot!(error.to_string(), @r#"
        Invalid rate limit: server.rate_limits.limit must be at least 1.

        To reject every request, remove the route instead. To disable rate limiting:

          [server.rate_limits]
          enabled = false
        "#);
    }

    #[test]
    fn sub_second_window_fails() {
        let config = parse(indoc! {r#"
            [server.rate_limits]
            enabled = true
            window = "500ms"
        "#});

        let error = validate_rate_limits(&config).unwrap_err();

        assert_snapshot!(error.to_string(), @"Invalid rate limit window 500ms: server.rate_limits.window must be at least one second");
    }

    #[test]
    fn fractional_window_warns() {
        let config = parse(indoc! {r#"
            [server.rate_limits]
            enabled = true
            window = "1500ms"
        "#});

        let warnings = validate_rate_limits(&config).unwrap();

        insta::assert_debug_snapshot!(warnings, @r#"
        [
            "Rate limit window 1.5s is not a whole number of seconds, counters will expire after 1s",
        ]
        "#);
    }

    #[test]
    fn invalid_redis_scheme_fails() {
        let config = parse(indoc! {r#"
            [server.rate_limits]
            enabled = true

            [server.rate_limits.storage]
            type = "redis"
            url = "http://localhost:6379"
        "#});

        let error = validate_rate_limits(&config).unwrap_err();

        assert_snapshot!(error.to_string(), @"Invalid Redis URL 'http://localhost:6379': expected a redis:// or rediss:// scheme");
    }

    #[test]
    fn disabled_redis_storage_warns() {
        let config = parse(indoc! {r#"
            [server.rate_limits]
            enabled = false

            [server.rate_limits.storage]
            type = "redis"
            url = "redis://localhost:6379"
        "#});

        let warnings = validate_rate_limits(&config).unwrap();

        assert_eq!(warnings, vec!["Redis storage is configured but rate limiting is disabled"]);
    }

    #[test]
    fn relative_health_path_fails() {
        let config = parse(indoc! {r#"
            [server.health]
            path = "health"
        "#});

        let error = validate(&config).unwrap_err();

        assert_snapshot!(error.to_string(), @"Invalid health endpoint path 'health': server.health.path must start with '/'");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        write!(
            file,
            "{}",
            indoc! {r#"
                [server.rate_limits]
                enabled = true
                limit = 3
                window = "10s"
            "#}
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert!(config.server.rate_limits.enabled);
        assert_eq!(config.server.rate_limits.limit, 3);
        assert_eq!(config.server.rate_limits.window, std::time::Duration::from_secs(10));
    }

    #[test]
    fn load_rejects_invalid_limits() {
        let mut file = tempfile::NamedTempFile::new().unwrap();

        write!(
            file,
            "{}",
            indoc! {r#"
                [server.rate_limits]
                limit = 0
            "#}
        )
        .unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn load_missing_file_fails() {
        let error = Config::load("/nonexistent/gatekeeper.toml").unwrap_err();

        assert!(error.to_string().starts_with("Failed to read configuration file"));
    }
}
