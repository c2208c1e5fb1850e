use ais_consumer::{error::Result, settings::Settings, startup::App};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    settings.init_tracer()?;

    let app = App::build(&settings).await?;
    let token = app.cancellation_token();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested, draining pipeline...");
                token.cancel();
            }
            Err(e) => error!("failed to listen for shutdown signal: {e:?}"),
        }
    });

    info!("starting ais-consumer in {:?}", settings.environment);
    app.run().await
}
