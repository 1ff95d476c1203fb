use shortlink::config::Config;
use shortlink::http::{router, AppState};
use shortlink::service::ShortUrlService;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shortlink=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let service = ShortUrlService::open(&config.db_path)
        .await
        .expect("failed to open the short url store");
    info!(db = %config.db_path.display(), "short url store ready");

    let app = router(AppState {
        service,
        base_url: config.base_url.clone(),
    });

    info!(addr = %config.listen_addr, "listening");
    axum::Server::bind(&config.listen_addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
