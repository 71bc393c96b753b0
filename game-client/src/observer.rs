//! 观察者接口
//!
//! 界面层通过三个单方法接口与同步器交互：
//! 接收状态变化、提交动作、开始新对局。

use async_trait::async_trait;
use tokio::sync::mpsc;

use protocol::{Action, GameState, Location, Piece, VariantId};

use crate::error::Result;

/// 接收对局状态变化
pub trait StateChangeSink: Send + Sync {
    fn on_state_change(&self, state: &GameState);
}

/// 提交本地动作
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn perform_action(&self, action: Action, piece: Piece, to: Location) -> Result<()>;
}

/// 开始新对局
#[async_trait]
pub trait NewGameSink: Send + Sync {
    async fn new_game(&self, variant: VariantId) -> Result<()>;
}

/// 把状态变化写入日志
pub struct LoggingObserver;

impl StateChangeSink for LoggingObserver {
    fn on_state_change(&self, state: &GameState) {
        tracing::info!(
            "Turn: {} ({}/{} moves), verdict: {}, peer connected: {}",
            state.current_player,
            state.moves_made,
            state.max_moves,
            state.verdict,
            state.peer_connected,
        );
        tracing::debug!("Board:\n{}", state.board);
    }
}

/// 把状态快照转发到通道
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<GameState>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<GameState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StateChangeSink for ChannelObserver {
    fn on_state_change(&self, state: &GameState) {
        // 接收端已关闭时丢弃
        let _ = self.tx.send(state.clone());
    }
}
