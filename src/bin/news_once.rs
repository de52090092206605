//! Dry run: one aggregation pass with the normal configuration, printed to stdout.
//! Nothing is delivered and the dedup snapshot is not rewritten.

use anyhow::Context;
use chrono::Utc;
use keyword_news_bot::app::App;
use keyword_news_bot::config::NewsConfig;
use keyword_news_bot::notify::summary_preview;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let config = NewsConfig::from_env().context("loading configuration")?;
    let app = App::from_config(config).await;

    let result = app.engine.run_once(Utc::now()).await;

    for (i, a) in result.articles.iter().enumerate() {
        println!(
            "{}. [{}] {}\n   {}\n   {} ({})\n",
            i + 1,
            a.matched_keyword.as_deref().unwrap_or("-"),
            a.title,
            summary_preview(a),
            a.link,
            a.source_domain()
        );
    }
    for e in &result.errors {
        eprintln!("error: {e}");
    }

    println!(
        "news-once done: {} selected, {} fetched, {} unmatched, {} duplicates, {} capped, {} feed errors",
        result.articles.len(),
        result.stats.fetched,
        result.stats.unmatched,
        result.stats.duplicates,
        result.stats.capped,
        result.errors.len()
    );
    Ok(())
}
