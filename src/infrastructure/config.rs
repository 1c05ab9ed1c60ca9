use crate::application::backoff::Backoff;
use crate::domain::series::RetentionPolicy;
use anyhow::Context;
use chrono::TimeDelta;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub source: SourceSettings,
    pub stream: StreamSettings,
    pub retention: RetentionSettings,
    pub display: DisplaySettings,
    pub http: HttpSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceSettings {
    /// Base URL of the telemetry server, e.g. `https://host:8443`
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamSettings {
    pub heartbeat_interval_secs: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_ms: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RetentionKind {
    Count,
    Window,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetentionSettings {
    pub policy: RetentionKind,
    pub max_samples: usize,
    pub window_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    pub voltage_axis_margin: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    pub listen_addr: String,
}

/// Load settings from defaults, `config/dashboard.*` and
/// `BATTERY_DASHBOARD_<SECTION>__<KEY>` environment variables
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let builder = with_defaults(config::Config::builder())?
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("BATTERY_DASHBOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    Ok(builder.build()?.try_deserialize()?)
}

fn with_defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> anyhow::Result<config::ConfigBuilder<config::builder::DefaultState>> {
    Ok(builder
        .set_default("source.base_url", "http://127.0.0.1:8080")?
        .set_default("stream.heartbeat_interval_secs", 30)?
        .set_default("stream.reconnect_base_ms", 1000)?
        .set_default("stream.reconnect_max_ms", 5000)?
        .set_default("stream.connect_timeout_secs", 10)?
        .set_default("retention.policy", "count")?
        .set_default("retention.max_samples", 20)?
        .set_default("retention.window_secs", 300)?
        .set_default("display.voltage_axis_margin", 0)?
        .set_default("http.listen_addr", "127.0.0.1:3000")?)
}

impl DashboardConfig {
    pub fn retention_policy(&self) -> anyhow::Result<RetentionPolicy> {
        let settings = &self.retention;
        match settings.policy {
            RetentionKind::Count => {
                anyhow::ensure!(settings.max_samples > 0, "retention.max_samples must be positive");
                Ok(RetentionPolicy::CountLimited(settings.max_samples))
            }
            RetentionKind::Window => {
                anyhow::ensure!(settings.window_secs > 0, "retention.window_secs must be positive");
                let window = i64::try_from(settings.window_secs)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .context("retention.window_secs is too large")?;
                Ok(RetentionPolicy::TimeWindow(window))
            }
        }
    }

    pub fn backoff(&self) -> anyhow::Result<Backoff> {
        let stream = &self.stream;
        anyhow::ensure!(
            stream.reconnect_base_ms <= stream.reconnect_max_ms,
            "stream.reconnect_base_ms must not exceed stream.reconnect_max_ms"
        );
        Ok(Backoff::new(
            Duration::from_millis(stream.reconnect_base_ms),
            Duration::from_millis(stream.reconnect_max_ms),
        ))
    }

    pub fn heartbeat_interval(&self) -> anyhow::Result<Duration> {
        anyhow::ensure!(
            self.stream.heartbeat_interval_secs > 0,
            "stream.heartbeat_interval_secs must be positive"
        );
        Ok(Duration::from_secs(self.stream.heartbeat_interval_secs))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.stream.connect_timeout_secs)
    }
}

/// WebSocket endpoint for a server base URL; the scheme follows the
/// server's transport security (`http` -> `ws`, `https` -> `wss`)
pub fn stream_url(base_url: &str) -> anyhow::Result<Url> {
    let mut url = parse_base(base_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => anyhow::bail!("unsupported scheme '{}' in {}", other, base_url),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot use scheme {} for {}", scheme, base_url))?;
    url.set_path("/ws");
    Ok(url)
}

/// Reset command endpoint for a server base URL
pub fn reset_url(base_url: &str) -> anyhow::Result<Url> {
    let mut url = parse_base(base_url)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => anyhow::bail!("unsupported scheme '{}' in {}", other, base_url),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot use scheme {} for {}", scheme, base_url))?;
    url.set_path("/api/reset");
    Ok(url)
}

fn parse_base(base_url: &str) -> anyhow::Result<Url> {
    let mut url =
        Url::parse(base_url).with_context(|| format!("invalid server URL: {}", base_url))?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> DashboardConfig {
        with_defaults(config::Config::builder())
            .unwrap()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("");
        assert_eq!(config.source.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.retention_policy().unwrap(), RetentionPolicy::CountLimited(20));
        assert_eq!(config.backoff().unwrap(), Backoff::default());
        assert_eq!(config.heartbeat_interval().unwrap(), Duration::from_secs(30));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.display.voltage_axis_margin, 0);
    }

    #[test]
    fn test_window_policy() {
        let config = parse(
            r#"
            [retention]
            policy = "window"
            window_secs = 120
            "#,
        );
        assert_eq!(
            config.retention_policy().unwrap(),
            RetentionPolicy::TimeWindow(TimeDelta::seconds(120))
        );
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let config = parse("[retention]\nmax_samples = 0");
        assert!(config.retention_policy().is_err());

        let config = parse("[stream]\nreconnect_base_ms = 9000");
        assert!(config.backoff().is_err());

        let config = parse("[stream]\nheartbeat_interval_secs = 0");
        assert!(config.heartbeat_interval().is_err());
    }

    #[test]
    fn test_stream_url_follows_transport_security() {
        assert_eq!(
            stream_url("http://localhost:8080").unwrap().as_str(),
            "ws://localhost:8080/ws"
        );
        assert_eq!(
            stream_url("https://battery.example.com/dashboard?x=1").unwrap().as_str(),
            "wss://battery.example.com/ws"
        );
        assert!(stream_url("ftp://example.com").is_err());
        assert!(stream_url("not a url").is_err());
    }

    #[test]
    fn test_reset_url() {
        assert_eq!(
            reset_url("http://localhost:8080/").unwrap().as_str(),
            "http://localhost:8080/api/reset"
        );
        assert_eq!(
            reset_url("wss://battery.example.com").unwrap().as_str(),
            "https://battery.example.com/api/reset"
        );
    }
}
