use anyhow::{Context, Result};
use std::time::Duration;
use tokio::{signal, time};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use yolink_poller::{
    config::{Config, SinkKind},
    credentials::Credentials,
    db::{self, csv::CsvSink, postgres::PgSink, Sink},
    sensors::PollService,
    yolink::YoLinkClient,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (ignore error if file absent; env vars may be set externally)
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let credentials = Credentials::load(&config.credentials_path)?;
    let yolink = YoLinkClient::new(&config, &credentials.account()?);

    match config.sink {
        SinkKind::Csv => {
            let sink = CsvSink::new(&config.data_dir);
            info!(dir = %sink.dir().display(), "Writing readings to CSV");
            run(&config, yolink, sink).await
        }
        SinkKind::Postgres => {
            let options = match &config.database_url {
                Some(url) => url.parse().context("DATABASE_URL is not a valid Postgres URL")?,
                None => credentials.database(&config.db_profile)?.connect_options(),
            };
            let pool = db::create_pool(options).await?;
            let sink = PgSink::connect(pool, &config.db_schema, config.db_reset_on_start).await?;
            run(&config, yolink, sink).await
        }
    }
}

async fn run<S: Sink>(config: &Config, yolink: YoLinkClient, sink: S) -> Result<()> {
    let mut service = PollService::new(
        yolink,
        sink,
        config.poll_types.clone(),
        config.temperature_unit,
    );

    if config.poll_interval_secs == 0 {
        service.run_once().await?;
        return Ok(());
    }

    let interval = Duration::from_secs(config.poll_interval_secs);
    let mut ticker = time::interval(interval);
    info!(interval_secs = interval.as_secs(), "Polling loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
        service.run_once().await?;
    }
}
