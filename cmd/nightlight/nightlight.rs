use clap::Parser;
use nightlight::{
    cli::{CliError, Options},
    initializers::{init_notifier, init_source, init_tracing},
};
use nightlight_alarm::{
    admin::{self, AdminState},
    engine::AlarmEngine,
    scheduler::{Scheduler, SystemClock},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let opts = Options::parse();

    if let Err(error) = init_tracing(&opts) {
        eprintln!("failed to initialize logging: {error}");
        std::process::exit(1);
    }

    if let Err(error) = run(opts).await {
        error!(error = %error, "nightlight failed");
        std::process::exit(1);
    }
}

async fn run(opts: Options) -> Result<(), CliError> {
    let config = opts.to_config()?;

    let (source, simulation) = init_source(&config);
    let notifier = init_notifier(&config);
    let admin_state = AdminState::new(notifier.clone(), simulation);

    let engine = AlarmEngine::new(config.thresholds.clone());
    let scheduler = Scheduler::new(engine, source, notifier, SystemClock);

    info!(
        low = config.thresholds.low,
        high = config.thresholds.high,
        cooldown_low_mins = config.thresholds.cooldown_low.as_secs() / 60,
        cooldown_high_mins = config.thresholds.cooldown_high.as_secs() / 60,
        window = ?config.thresholds.active_window.map(|window| window.to_string()),
        testing = config.testing,
        "nightlight started"
    );

    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                signal_token.cancel();
            }
            Err(error) => warn!(error = %error, "failed to install Ctrl+C handler"),
        }
    });

    let admin_addr = config.admin_addr;
    let admin_token = shutdown.clone();
    let admin_server = async move {
        let served = admin::serve(admin_addr, admin_state, admin_token.clone()).await;
        // Stop polling if the admin server exits early.
        admin_token.cancel();
        served
    };

    let ((), served) = tokio::join!(
        scheduler.run(config.poll_interval, shutdown.clone()),
        admin_server
    );
    served?;

    info!("nightlight stopped");
    Ok(())
}
