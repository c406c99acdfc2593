use std::{io::IsTerminal, sync::Arc};

use nightlight_alarm::{
    config::AppConfig,
    notifier::GoveeNotifier,
    source::{NightscoutSource, ReadingSource, SimulatedSource},
};
use tracing::{Level, info};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    filter::Directive,
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::cli::{LogColor, Options};

pub fn init_tracing(opts: &Options) -> Result<(), TryInitError> {
    let log_filter = EnvFilter::builder()
        .with_default_directive(Directive::from(opts.log_level))
        .from_env_lossy();

    let use_color = match opts.log_color {
        LogColor::Always => true,
        LogColor::Never => false,
        LogColor::Auto => std::io::stdout().is_terminal(),
    };

    let include_target = matches!(opts.log_level, Level::DEBUG | Level::TRACE);

    let fmt_layer = fmt::layer()
        .with_target(include_target)
        .with_ansi(use_color);

    Registry::default()
        .with(fmt_layer.with_filter(log_filter))
        .try_init()
}

/// Builds the reading source for the configured mode.
///
/// In testing mode the returned [`SimulatedSource`] handle shares its value
/// with the boxed source, so the admin server can drive what gets evaluated.
pub fn init_source(config: &AppConfig) -> (Box<dyn ReadingSource>, Option<SimulatedSource>) {
    if config.testing {
        let simulation = SimulatedSource::new(config.simulation_initial);
        info!(
            initial = config.simulation_initial,
            "Testing mode: readings come from the simulated source"
        );
        (Box::new(simulation.clone()), Some(simulation))
    } else {
        info!(url = %redacted(&config.nightscout_url), "Reading glucose from Nightscout");
        (
            Box::new(NightscoutSource::new(config.nightscout_url.clone())),
            None,
        )
    }
}

pub fn init_notifier(config: &AppConfig) -> Arc<GoveeNotifier> {
    info!(
        device = %config.govee_device.device,
        sku = %config.govee_device.sku,
        "Alarms will switch on Govee device"
    );
    Arc::new(GoveeNotifier::new(
        config.govee_base_url.clone(),
        config.govee_api_key.clone(),
        config.govee_device.clone(),
    ))
}

/// Strips the query string, which usually carries the Nightscout token.
fn redacted(url: &url::Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_drops_token_query() {
        let Ok(url) = url::Url::parse("https://ns.example.com/api/v1/entries.txt?token=abc") else {
            return;
        };
        assert_eq!(redacted(&url), "https://ns.example.com/api/v1/entries.txt");
    }
}
