use crate::{
    engine::ThresholdConfig, models::AlarmReason, notifier::GoveeDevice, window::ActiveWindow,
};
use std::{net::SocketAddr, time::Duration};
use thiserror::Error;
use url::Url;

/// Validated process configuration. Built once before any scheduling starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub nightscout_url: Url,
    pub govee_base_url: Url,
    pub govee_api_key: String,
    pub govee_device: GoveeDevice,
    pub thresholds: ThresholdConfig,
    pub poll_interval: Duration,
    pub admin_addr: SocketAddr,
    /// Serve readings from a settable in-memory value and enable `/simulate`.
    pub testing: bool,
    pub simulation_initial: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(String),
    #[error("invalid url in {name}: {source}")]
    InvalidUrl {
        name: String,
        source: url::ParseError,
    },
    #[error("unsupported url scheme in {name}: {scheme}")]
    UnsupportedScheme { name: String, scheme: String },
    #[error("invalid thresholds: low ({low}) must be finite and below high ({high})")]
    InvalidThresholds { low: f64, high: f64 },
    #[error("{0} cooldown must be greater than zero")]
    InvalidCooldown(AlarmReason),
    #[error("poll interval must be greater than zero")]
    InvalidInterval,
    #[error("invalid active window {0}: hours must be distinct and within 0..=23")]
    InvalidWindow(ActiveWindow),
    #[error("simulated initial value must be finite, got {0}")]
    InvalidSimulation(f64),
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("nightscout url", &self.nightscout_url)?;
        check_scheme("govee base url", &self.govee_base_url)?;

        if self.govee_api_key.trim().is_empty() {
            return Err(ConfigError::Missing("govee api key".to_owned()));
        }
        if self.govee_device.device.trim().is_empty() {
            return Err(ConfigError::Missing("govee device id".to_owned()));
        }
        if self.govee_device.sku.trim().is_empty() {
            return Err(ConfigError::Missing("govee device sku".to_owned()));
        }

        let ThresholdConfig {
            low,
            high,
            cooldown_low,
            cooldown_high,
            active_window,
        } = &self.thresholds;

        if !low.is_finite() || !high.is_finite() || low >= high {
            return Err(ConfigError::InvalidThresholds {
                low: *low,
                high: *high,
            });
        }
        if cooldown_low.is_zero() {
            return Err(ConfigError::InvalidCooldown(AlarmReason::Low));
        }
        if cooldown_high.is_zero() {
            return Err(ConfigError::InvalidCooldown(AlarmReason::High));
        }
        if let Some(window) = active_window
            && !window.is_valid()
        {
            return Err(ConfigError::InvalidWindow(*window));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        if !self.simulation_initial.is_finite() {
            return Err(ConfigError::InvalidSimulation(self.simulation_initial));
        }

        Ok(())
    }
}

/// Returns the trimmed value, treating blank strings as missing.
pub fn read_required(name: &str, value: Option<&str>) -> Result<String, ConfigError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ConfigError::Missing(name.to_owned()))
}

pub fn parse_url(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl {
        name: name.to_owned(),
        source,
    })?;
    check_scheme(name, &url)?;
    Ok(url)
}

fn check_scheme(name: &str, url: &Url) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::UnsupportedScheme {
            name: name.to_owned(),
            scheme: scheme.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn valid_config() -> Option<AppConfig> {
        Some(AppConfig {
            nightscout_url: Url::parse("https://ns.example.com/api/v1/entries.txt").ok()?,
            govee_base_url: Url::parse("https://openapi.api.govee.com").ok()?,
            govee_api_key: "secret".to_owned(),
            govee_device: GoveeDevice {
                device: "D7:B0:60:74:F4:DB:FB:6A".to_owned(),
                sku: "H6008".to_owned(),
            },
            thresholds: ThresholdConfig::default(),
            poll_interval: Duration::from_secs(10),
            admin_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
            testing: false,
            simulation_initial: 100.0,
        })
    }

    #[test]
    fn default_policy_is_valid() {
        let Some(config) = valid_config() else { return };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_or_non_finite_thresholds() {
        let Some(mut config) = valid_config() else { return };

        config.thresholds.low = 200.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));

        config.thresholds.low = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));

        config.thresholds.low = 180.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn rejects_zero_cooldowns_and_interval() {
        let Some(mut config) = valid_config() else { return };
        config.thresholds.cooldown_high = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCooldown(AlarmReason::High))
        ));

        let Some(mut config) = valid_config() else { return };
        config.poll_interval = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidInterval)));
    }

    #[test]
    fn rejects_blank_credentials_and_device() {
        let Some(mut config) = valid_config() else { return };
        config.govee_api_key = "  ".to_owned();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));

        let Some(mut config) = valid_config() else { return };
        config.govee_device.sku = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn rejects_empty_window() {
        let Some(mut config) = valid_config() else { return };
        config.thresholds.active_window = Some(ActiveWindow::new(3, 3));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(_))));
    }

    #[test]
    fn read_required_treats_blank_as_missing() {
        assert!(matches!(
            read_required("NIGHTSCOUT_API_URL", None),
            Err(ConfigError::Missing(name)) if name == "NIGHTSCOUT_API_URL"
        ));
        assert!(read_required("GOVEE_API_KEY", Some("   ")).is_err());
        assert_eq!(
            read_required("GOVEE_API_KEY", Some(" abc ")).ok(),
            Some("abc".to_owned())
        );
    }

    #[test]
    fn parse_url_requires_http_scheme() {
        assert!(parse_url("nightscout url", "https://ns.example.com").is_ok());
        assert!(matches!(
            parse_url("nightscout url", "not a url"),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_url("nightscout url", "ftp://ns.example.com"),
            Err(ConfigError::UnsupportedScheme { .. })
        ));
    }
}
