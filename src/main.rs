use anyhow::Context;
use tracing_subscriber::EnvFilter;

use bus_predictor::{config::Config, form::FormInput, model::Model, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_env()?;
    tracing::info!(
        encoder = %cfg.encoder_path.display(),
        scaler = %cfg.scaler_path.display(),
        model = %cfg.model_path.display(),
        "loading artifacts"
    );

    let mdl = Model::load(&cfg.encoder_path, &cfg.scaler_path, &cfg.model_path)
        .context("failed to load model artifacts")?
        .with_trace(cfg.log_predictions);

    // Warmup on the page defaults; an encoder that cannot handle them is
    // incompatible with this form.
    let record = FormInput::default().to_record()?;
    let warm = mdl.predict(&record).context("warmup prediction failed")?;
    tracing::info!(
        "warmup ok: {} ({})",
        warm.outcome.label(),
        warm.confidence_text()
    );
    tracing::info!("loaded model; columns[{}]: {:?}", mdl.n_features(), mdl.columns());

    let app = server::router(server::AppState::new(mdl));

    let addr = cfg.addr();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
