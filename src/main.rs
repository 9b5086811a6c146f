use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::{registry::GuildRegistry, scheduler::Scheduler, voice::SongbirdVoice};
use crate::bot::JukeboxBot;
use crate::config::Config;
use crate::sources::{TrackResolver, YtDlp};
use crate::ui::DiscordChat;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración; sin token no hay bot
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Catálogo (yt-dlp)
    let catalog = Arc::new(YtDlp::new(
        config.ytdlp_path.clone(),
        config.extractor_concurrency,
    ));
    if let Err(e) = catalog.verify_dependencies().await {
        warn!("⚠️ Dependencias no disponibles, la reproducción fallará: {:?}", e);
    }
    let resolver = TrackResolver::new(catalog, config.max_track_duration, config.search_limit);

    // Voz y chat
    let manager = Songbird::serenity();
    let voice = Arc::new(SongbirdVoice::new(manager.clone()));
    let chat = Arc::new(DiscordChat::new(Arc::new(Http::new(&config.discord_token))));

    // Scheduler de reproducción
    let (scheduler, events) = Scheduler::new(
        Arc::new(GuildRegistry::new()),
        resolver.clone(),
        voice.clone(),
        chat,
        config.idle_timeout,
    );
    tokio::spawn(scheduler.clone().run(events));

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    // Crear handler del bot
    let handler = JukeboxBot::new(config.clone(), scheduler, resolver, voice);

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(manager)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("⚠️ Señal de shutdown recibida, cerrando...");
                shard_manager.shutdown_all().await;
            }
            Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
        }
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    dotenvy::dotenv().ok();
    let binary = std::env::var("YTDLP_PATH").unwrap_or_else(|_| Config::default().ytdlp_path);

    // Verificar dependencias críticas
    YtDlp::new(binary, 1).verify_dependencies().await?;
    println!("OK");
    Ok(())
}
