use std::{
    fmt::Display,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use clap::{ArgAction, Parser as ClapParser};
use nightlight_alarm::{
    admin::AdminError,
    config::{AppConfig, ConfigError, parse_url, read_required},
    engine::ThresholdConfig,
    notifier::{GOVEE_API_BASE_URL, GoveeDevice},
    window::ActiveWindow,
};
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Admin(#[from] AdminError),
}

#[derive(ClapParser, Debug, Clone)]
#[command(
    name = "nightlight",
    version,
    about = "Switches on a Govee light when Nightscout glucose readings leave the target range"
)]
pub struct Options {
    #[arg(
        long = "nightscout.url",
        value_name = "URL",
        help = "Nightscout entries endpoint returning tab-separated readings.",
        long_help = "Usually https://<site>/api/v1/entries.txt?token=<token>. Required even in testing mode.",
        help_heading = "Source options",
        env = "NIGHTSCOUT_API_URL"
    )]
    pub nightscout_url: Option<String>,
    #[arg(
        long = "govee.api-key",
        value_name = "API_KEY",
        help = "Govee OpenAPI key.",
        help_heading = "Notifier options",
        env = "GOVEE_API_KEY",
        hide_env_values = true
    )]
    pub govee_api_key: Option<String>,
    #[arg(
        long = "govee.device",
        value_name = "DEVICE_ID",
        help = "Identifier of the light to switch on.",
        help_heading = "Notifier options",
        env = "GOVEE_DEVICE_ID"
    )]
    pub govee_device: Option<String>,
    #[arg(
        long = "govee.sku",
        value_name = "SKU",
        help = "Model of the light to switch on, e.g. H6008.",
        help_heading = "Notifier options",
        env = "GOVEE_DEVICE_SKU"
    )]
    pub govee_sku: Option<String>,
    #[arg(
        long = "govee.base-url",
        value_name = "URL",
        default_value = GOVEE_API_BASE_URL,
        help_heading = "Notifier options",
        env = "GOVEE_API_BASE_URL"
    )]
    pub govee_base_url: String,
    #[arg(
        long = "threshold.low",
        value_name = "MG_DL",
        default_value_t = 70.0,
        help = "Readings strictly below this value raise a Low alarm.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_LOW"
    )]
    pub threshold_low: f64,
    #[arg(
        long = "threshold.high",
        value_name = "MG_DL",
        default_value_t = 180.0,
        help = "Readings strictly above this value raise a High alarm.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_HIGH"
    )]
    pub threshold_high: f64,
    #[arg(
        long = "cooldown.low",
        value_name = "MINUTES",
        default_value_t = 30,
        help = "Minimum time between repeated Low alarms.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_COOLDOWN_LOW_MINUTES"
    )]
    pub cooldown_low_minutes: u64,
    #[arg(
        long = "cooldown.high",
        value_name = "MINUTES",
        default_value_t = 150,
        help = "Minimum time between repeated High alarms.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_COOLDOWN_HIGH_MINUTES"
    )]
    pub cooldown_high_minutes: u64,
    #[arg(
        long = "poll.interval",
        value_name = "SECONDS",
        default_value_t = 10,
        help = "Time between reading fetches.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_POLL_SECONDS"
    )]
    pub poll_seconds: u64,
    #[arg(
        long = "window",
        value_name = "START-END",
        help = "Local hours during which readings are evaluated, e.g. 22-6.",
        long_help = "Half-open range of local hours. When START is greater than END the window wraps past midnight. Readings are evaluated around the clock if unset.",
        help_heading = "Alarm options",
        env = "NIGHTLIGHT_ACTIVE_WINDOW"
    )]
    pub window: Option<ActiveWindow>,
    #[arg(
        long = "http.addr",
        default_value = "127.0.0.1",
        value_name = "ADDRESS",
        help = "Listening address for the admin http server.",
        help_heading = "Admin options",
        env = "NIGHTLIGHT_HTTP_ADDR"
    )]
    pub http_addr: IpAddr,
    #[arg(
        long = "http.port",
        default_value_t = 3000,
        value_name = "PORT",
        help = "Listening port for the admin http server.",
        help_heading = "Admin options",
        env = "NIGHTLIGHT_HTTP_PORT"
    )]
    pub http_port: u16,
    #[arg(
        long = "testing",
        action = ArgAction::SetTrue,
        help = "Read glucose from a settable in-memory value instead of Nightscout.",
        long_help = "Enables POST /simulate on the admin server. Alarms still reach the configured light.",
        help_heading = "Admin options",
        env = "NIGHTLIGHT_TESTING"
    )]
    pub testing: bool,
    #[arg(
        long = "simulation.initial",
        value_name = "MG_DL",
        default_value_t = 100.0,
        help = "Starting simulated value in testing mode.",
        help_heading = "Admin options",
        env = "NIGHTLIGHT_SIMULATION_INITIAL"
    )]
    pub simulation_initial: f64,
    #[arg(
        long = "log.level",
        default_value_t = Level::INFO,
        value_name = "LOG_LEVEL",
        env = "NIGHTLIGHT_LOG_LEVEL",
        help = "The verbosity level used for logs.",
        long_help = "Possible values: info, debug, trace, warn, error. RUST_LOG takes precedence when set.",
        help_heading = "Logging options"
    )]
    pub log_level: Level,
    #[arg(
        long = "log.color",
        default_value_t = LogColor::Auto,
        help = "Output logs with ANSI color codes.",
        long_help = "Possible values: auto, always, never",
        help_heading = "Logging options",
        env = "NIGHTLIGHT_LOG_COLOR"
    )]
    pub log_color: LogColor,
}

impl Options {
    /// Resolves the flags into a validated configuration.
    pub fn to_config(&self) -> Result<AppConfig, ConfigError> {
        let nightscout_url = read_required("NIGHTSCOUT_API_URL", self.nightscout_url.as_deref())?;
        let govee_api_key = read_required("GOVEE_API_KEY", self.govee_api_key.as_deref())?;
        let device = read_required("GOVEE_DEVICE_ID", self.govee_device.as_deref())?;
        let sku = read_required("GOVEE_DEVICE_SKU", self.govee_sku.as_deref())?;

        let config = AppConfig {
            nightscout_url: parse_url("NIGHTSCOUT_API_URL", &nightscout_url)?,
            govee_base_url: parse_url("GOVEE_API_BASE_URL", &self.govee_base_url)?,
            govee_api_key,
            govee_device: GoveeDevice { device, sku },
            thresholds: ThresholdConfig {
                low: self.threshold_low,
                high: self.threshold_high,
                cooldown_low: minutes(self.cooldown_low_minutes),
                cooldown_high: minutes(self.cooldown_high_minutes),
                active_window: self.window,
            },
            poll_interval: Duration::from_secs(self.poll_seconds),
            admin_addr: SocketAddr::new(self.http_addr, self.http_port),
            testing: self.testing,
            simulation_initial: self.simulation_initial,
        };

        config.validate()?;
        Ok(config)
    }
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.saturating_mul(60))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogColor {
    #[default]
    Auto,
    Always,
    Never,
}

impl Display for LogColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogColor::Auto => write!(f, "auto"),
            LogColor::Always => write!(f, "always"),
            LogColor::Never => write!(f, "never"),
        }
    }
}

impl FromStr for LogColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(LogColor::Auto),
            "always" => Ok(LogColor::Always),
            "never" => Ok(LogColor::Never),
            _ => Err(format!(
                "Invalid log color '{s}'. Expected: auto, always, or never"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nightlight_alarm::models::AlarmReason;

    const REQUIRED: [&str; 9] = [
        "nightlight",
        "--nightscout.url",
        "https://ns.example.com/api/v1/entries.txt?token=abc",
        "--govee.api-key",
        "secret",
        "--govee.device",
        "D7:B0:60:74:F4:DB:FB:6A",
        "--govee.sku",
        "H6008",
    ];

    fn parse(extra: &[&str]) -> Option<Options> {
        Options::try_parse_from(REQUIRED.iter().chain(extra).copied()).ok()
    }

    #[test]
    fn defaults_match_the_bedside_policy() {
        let opts = parse(&[]);
        assert!(opts.is_some());
        let Some(opts) = opts else { return };
        let config = opts.to_config();
        assert!(config.is_ok());
        let Ok(config) = config else { return };

        assert_eq!(config.thresholds.low, 70.0);
        assert_eq!(config.thresholds.high, 180.0);
        assert_eq!(
            config.thresholds.cooldown_for(AlarmReason::Low),
            Duration::from_secs(30 * 60)
        );
        assert_eq!(
            config.thresholds.cooldown_for(AlarmReason::High),
            Duration::from_secs(150 * 60)
        );
        assert_eq!(config.thresholds.active_window, None);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.admin_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.govee_base_url.as_str(), "https://openapi.api.govee.com/");
        assert!(!config.testing);
    }

    #[test]
    fn parses_wrapping_window_and_overrides() {
        let opts = parse(&[
            "--window",
            "22-6",
            "--cooldown.high",
            "60",
            "--testing",
            "--log.color",
            "never",
        ]);
        assert!(opts.is_some());
        let Some(opts) = opts else { return };

        assert_eq!(opts.window, Some(ActiveWindow::new(22, 6)));
        assert_eq!(opts.log_color, LogColor::Never);

        let config = opts.to_config();
        assert!(config.is_ok());
        let Ok(config) = config else { return };
        assert!(config.testing);
        assert_eq!(config.thresholds.cooldown_high, Duration::from_secs(60 * 60));
    }

    #[test]
    fn rejects_malformed_window() {
        assert!(parse(&["--window", "25-3"]).is_none());
        assert!(parse(&["--window", "night"]).is_none());
    }

    #[test]
    fn blank_required_setting_is_missing() {
        let Some(mut opts) = parse(&[]) else { return };
        opts.govee_api_key = Some("   ".to_owned());

        assert!(matches!(
            opts.to_config(),
            Err(ConfigError::Missing(name)) if name == "GOVEE_API_KEY"
        ));
    }

    #[test]
    fn inverted_thresholds_fail_validation() {
        let Some(opts) = parse(&["--threshold.low", "200"]) else { return };

        assert!(matches!(
            opts.to_config(),
            Err(ConfigError::InvalidThresholds { .. })
        ));
    }

    #[test]
    fn log_color_round_trips_through_text() {
        for color in [LogColor::Auto, LogColor::Always, LogColor::Never] {
            assert_eq!(LogColor::from_str(&color.to_string()), Ok(color));
        }
        assert!(LogColor::from_str("rainbow").is_err());
    }
}
