use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_client::{
    auto_start_variant, ChannelObserver, ClientSettings, Controller, LoggingObserver, NewGameSink,
};
use protocol::{variant, PeerChannel, VariantId};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = ClientSettings::load();

    // 初始化日志
    let level = settings.log_level.as_str();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(format!("game_client={level}").parse()?)
            .add_directive(format!("protocol={level}").parse()?))
        .init();

    // 可选参数：自动开局使用的变体
    let preferred: Option<VariantId> = std::env::args()
        .nth(1)
        .map(|arg| arg.parse())
        .transpose()
        .context("Variant must be a number between 1 and 4")?;
    if let Some(id) = preferred {
        let layout = variant::lookup(id).with_context(|| format!("Unknown variant {id}"))?;
        info!("Auto-start enabled, preferred variant: {}", layout.name);
    }

    let addr = settings.network.addr();
    info!("Connecting to {}", addr);
    let channel = PeerChannel::connect(&addr).await?;

    let mut controller = Controller::new(channel)?;
    let (observer, mut states) = ChannelObserver::new();
    controller.subscribe(Arc::new(LoggingObserver));
    controller.subscribe(Arc::new(observer));
    let handle = controller.start()?;
    info!("Playing as peer {}", handle.network_id());

    let mut started = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
            _ = handle.closed() => {
                warn!("Connection to relay lost");
                break;
            }
            Some(state) = states.recv() => {
                if started {
                    continue;
                }
                let Some(id) = preferred.and_then(|id| auto_start_variant(&state, id)) else {
                    continue;
                };
                handle.new_game(id).await?;
                started = true;
            }
        }
    }

    Ok(())
}
