use anyhow::Result;
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use persona_chat::core::Config;
use persona_chat::features::chat::ChatRequestHandler;
use persona_chat::features::personas::PersonaManager;
use persona_chat::features::rate_limiting::RateLimiter;
use persona_chat::server::{bind_with_fallback, serve, AppState};

/// Ports tried after the configured one is found taken
const PORT_ATTEMPTS: u16 = 10;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    if !config.has_credentials() {
        error!("GEMINI_API_KEY is missing. Set it in your .env file.");
    }

    let personas = match &config.personas_path {
        Some(path) => {
            info!("Loading personas from {}", path.display());
            PersonaManager::load(path)?
        }
        None => PersonaManager::builtin()?,
    };
    info!("Loaded {} personas", personas.len());

    let chat = ChatRequestHandler::from_config(&config, Arc::new(personas))?;
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window,
    ));

    // Forget clients that have gone quiet
    let purge_limiter = rate_limiter.clone();
    tokio::spawn(async move {
        let period = purge_limiter.time_window().max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let purged = purge_limiter.purge_expired();
            if purged > 0 {
                info!("Rate limiter purged {purged} idle clients");
            }
        }
    });

    let listener = bind_with_fallback("0.0.0.0", config.port, PORT_ATTEMPTS).await?;
    if listener.local_addr()?.port() != config.port {
        warn!("Configured port {} was busy", config.port);
    }

    serve(
        listener,
        AppState {
            chat: Arc::new(chat),
            rate_limiter,
        },
    )
    .await
}
