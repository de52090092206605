//! Keyword News Bot daemon entrypoint.
//! Loads configuration, announces itself, then runs the daily scheduler
//! (and the optional status server) until Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;

use keyword_news_bot::api::{self, ApiState};
use keyword_news_bot::app::App;
use keyword_news_bot::config::NewsConfig;
use keyword_news_bot::metrics::Metrics;
use keyword_news_bot::notify::{startup_notice, DeliverySink};
use keyword_news_bot::scheduler::SystemClock;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    keyword_news_bot::init_tracing();

    let config = match NewsConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration, not starting");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("news bot failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: NewsConfig) -> anyhow::Result<()> {
    let app = App::from_config(config).await;
    let cfg = &app.config;
    tracing::info!(
        at = %cfg.schedule,
        keywords = cfg.keywords.len(),
        feeds = cfg.feeds.len(),
        identity = ?cfg.identity,
        order = ?cfg.order,
        "configuration loaded"
    );

    let sink: Arc<dyn DeliverySink> = Arc::new(app.sinks());
    let notice = startup_notice(&cfg.schedule.to_string(), &cfg.keywords, cfg.feeds.len());
    if let Err(e) = sink.announce(&notice).await {
        tracing::warn!(error = %e, "startup notice not delivered");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = match cfg.status_bind {
        Some(addr) => {
            let mut state = ApiState::new(app.status.clone());
            match Metrics::init(cfg.cache_hours) {
                Ok(m) => state = state.with_metrics(m),
                Err(e) => tracing::warn!("metrics disabled: {e:#}"),
            }
            Some(api::spawn_server(addr, state, shutdown_rx.clone()))
        }
        None => None,
    };

    let scheduler = app.scheduler(sink, Arc::new(SystemClock));
    let scheduler = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);

    scheduler.await?;
    if let Some(server) = server {
        // a failure was already logged by the server task
        if let Ok(Err(e)) = server.await {
            tracing::debug!("status server exit: {e:#}");
        }
    }
    Ok(())
}
