//! One-shot expiry sweep over the short-url store, meant to run from cron.

use shortlink::config::Config;
use shortlink::error::ShortUrlError;
use shortlink::service::ShortUrlService;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    match run(&config).await {
        Ok(deleted) => {
            println!(
                "Deleted {} expired short URLs from {}",
                deleted,
                config.db_path.display()
            );
        }
        Err(err) => {
            eprintln!("Failed to clean up short URLs: {}", err);
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config) -> Result<usize, ShortUrlError> {
    let service = ShortUrlService::open(&config.db_path).await?;
    service.cleanup().await
}
