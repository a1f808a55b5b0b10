//! Headless skirmish host
//!
//! Creates a room with a host and a scripted bot, starts it, and runs both
//! sessions at the configured tick rate against the configured store.

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use street_strike::config::{Config, StoreBackend};
use street_strike::game::{Catalog, GameTuning, Player, PlayerId, SimEvent};
use street_strike::host::location::resolve_or_fallback;
use street_strike::host::{CityDirectory, LogRenderer, NullRenderer};
use street_strike::lobby::{RoomPhase, RoomService};
use street_strike::store::{MemoryStore, RestStore, RoomStore};
use street_strike::sync::{SyncConfig, SyncGateway};
use street_strike::util::time::Timer;
use street_strike::GameSession;

const POWER_UP_EVERY_MS: u64 = 5_000;
const BOT_STRAFE_EVERY_MS: u64 = 2_000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    init_tracing(&config.log_level);

    info!(
        tick_rate = config.tick_rate,
        secs = config.skirmish_secs,
        city = %config.default_city,
        "Starting Street Strike skirmish"
    );

    match config.store.clone() {
        StoreBackend::Memory => run_skirmish(Arc::new(MemoryStore::new()), &config).await?,
        StoreBackend::Rest { url, api_key } => {
            info!(url = %url, "Using REST room store");
            run_skirmish(Arc::new(RestStore::new(url, api_key)), &config).await?
        }
    }

    info!("Skirmish complete");
    Ok(())
}

async fn run_skirmish<S: RoomStore>(store: Arc<S>, config: &Config) -> anyhow::Result<()> {
    let seed = config.rng_seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let catalog = Arc::new(Catalog::standard());
    let service = RoomService::new(store.clone(), config.max_players, Some(seed));
    let location = resolve_or_fallback(&CityDirectory::popular(), &config.default_city);

    let spawn = |name: &str, at: Vec3| -> anyhow::Result<Player> {
        let weapon = catalog
            .create_weapon(street_strike::game::catalog::DEFAULT_WEAPON)
            .ok_or_else(|| anyhow::anyhow!("catalog has no default weapon"))?;
        Ok(Player::new(PlayerId::new(), name, weapon, at))
    };
    let host_player = spawn("Host", Vec3::new(0.0, 1.8, 0.0))?;
    let bot_player = spawn("Bot", Vec3::new(0.0, 1.8, -12.0))?;
    let (host_id, bot_id) = (host_player.id, bot_player.id);

    let room = service.create_room("Skirmish", host_player, location).await?;
    let room = service.join_by_code(&room.join_code, bot_player).await?;
    info!(room_id = %room.id, join_code = %room.join_code, "Skirmish room ready");

    let host_gateway = SyncGateway::connect(store.clone(), room.id, host_id, SyncConfig::default()).await?;
    let bot_gateway = SyncGateway::connect(store.clone(), room.id, bot_id, SyncConfig::default()).await?;
    let tuning = GameTuning::default();
    let mut host = GameSession::new(
        room.clone(),
        host_id,
        catalog.clone(),
        tuning,
        host_gateway,
        LogRenderer::new(),
        seed,
    )?;
    let mut bot = GameSession::new(
        room,
        bot_id,
        catalog.clone(),
        tuning,
        bot_gateway,
        NullRenderer,
        seed.wrapping_add(1),
    )?;
    host.on_reload(|| info!("Host reloading"));

    host.request_start()?;

    let mut ticker = interval(Duration::from_secs_f64(1.0 / f64::from(config.tick_rate)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let deadline = tokio::time::sleep(Duration::from_secs(config.skirmish_secs));
    tokio::pin!(deadline);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut frame = Timer::new();
    let mut next_power_up = POWER_UP_EVERY_MS;
    let mut next_strafe = 0;
    let mut kills = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut deadline => {
                info!("Skirmish time elapsed");
                break;
            }
            _ = &mut shutdown => break,
        }

        let dt = frame.elapsed_secs_f32();
        frame.reset();

        let playing = host.room().phase == RoomPhase::Playing;
        let now = host.simulation().now_ms();
        if playing {
            host.fire();
            if now >= next_strafe {
                let left = rng.gen_bool(0.5);
                bot.set_movement(false, false, left, !left);
                next_strafe = now + BOT_STRAFE_EVERY_MS;
            }
            if now >= next_power_up {
                let at = Vec3::new(rng.gen_range(-10.0..10.0), 1.0, rng.gen_range(-20.0..0.0));
                host.spawn_power_up(None, at);
                next_power_up = now + POWER_UP_EVERY_MS;
            }
        }

        let report = host.tick(dt);
        for event in &report.events {
            if let SimEvent::Died { victim, killer_kills, .. } = event {
                kills = killer_kills.unwrap_or(kills);
                info!(victim = %victim, kills, "Bot down");
            }
        }
        bot.tick(dt);

        if host.is_closed() {
            warn!("Host session closed early");
            break;
        }
    }

    if let Err(e) = host.end_room() {
        error!(error = %e, "Failed to end room");
    }
    bot.teardown();

    let stats = host.simulation().local_player().map(|p| (p.kills, p.deaths));
    info!(?stats, "Final host score");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
