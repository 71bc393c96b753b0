//! 对局同步
//!
//! 一个工作任务独占 [`GameState`]，按顺序处理来自同一队列的命令：
//! 本地动作、新对局和中继转发来的帧。监听任务负责把通道收到的帧放入该队列。
//!
//! 中继会把每条消息回显给发送方，所以本地动作只发送不执行，
//! 等回显到达后与对手一样经由规则引擎执行，双方状态由同一消息序列推导。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use protocol::{
    Action, Frame, GameState, Location, Message, PeerChannel, PeerId, PeerSender, Piece,
    ProtocolError, RuleEngine, Side, VariantId,
};

use crate::error::{ClientError, Result};
use crate::observer::{ActionSink, NewGameSink, StateChangeSink};

/// 工作任务处理的命令
pub enum Command {
    /// 本地玩家发起的动作
    LocalAction {
        action: Action,
        piece: Piece,
        to: Location,
        reply: oneshot::Sender<Result<()>>,
    },
    /// 本地玩家开始新对局
    NewGame {
        variant: VariantId,
        reply: oneshot::Sender<Result<()>>,
    },
    /// 中继转发来的帧
    Inbound(Frame),
    /// 获取当前状态快照
    Snapshot { reply: oneshot::Sender<GameState> },
}

/// 同步器：把本地意图和收到的消息转换为状态变化
pub struct Synchronizer {
    state: GameState,
    network_id: PeerId,
    side: Side,
    sender: PeerSender,
    observers: Vec<Arc<dyn StateChangeSink>>,
    /// 已发出、等待回显的本地动作
    awaiting_echo: bool,
}

impl Synchronizer {
    pub fn new(network_id: PeerId, sender: PeerSender) -> Result<Self> {
        let side = Side::from_peer_id(network_id).ok_or_else(|| {
            ProtocolError::malformed(format!("invalid peer id {network_id}"))
        })?;

        let mut state = GameState::default();
        state.network_id = Some(network_id);
        // 玩家 2 加入时玩家 1 一定已在线
        state.peer_connected = network_id == 2;

        Ok(Self {
            state,
            network_id,
            side,
            sender,
            observers: Vec::new(),
            awaiting_echo: false,
        })
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// 本地玩家执哪一方
    pub fn side(&self) -> Side {
        self.side
    }

    pub fn subscribe(&mut self, observer: Arc<dyn StateChangeSink>) {
        self.observers.push(observer);
    }

    /// 宣告加入并广播初始状态
    pub fn start(&mut self) -> Result<()> {
        self.sender.send(
            Message::PlayerIn {
                pid: self.network_id,
            }
            .encode(),
        )?;
        self.notify();
        Ok(())
    }

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::LocalAction {
                action,
                piece,
                to,
                reply,
            } => {
                let _ = reply.send(self.local_action(action, piece, to));
            }
            Command::NewGame { variant, reply } => {
                let _ = reply.send(self.new_game(variant));
            }
            Command::Inbound(frame) => self.on_frame(&frame),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }
        }
    }

    /// 校验并发送本地动作，状态在回显到达后才改变
    ///
    /// 上一个动作的回显到达前拒绝新的动作，校验总是基于已执行的状态。
    pub fn local_action(&mut self, action: Action, piece: Piece, to: Location) -> Result<()> {
        if self.awaiting_echo {
            return Err(ClientError::ActionPending);
        }
        RuleEngine::validate_action(&self.state, self.side, action, piece, to)?;

        let message = Message::MadeAction {
            moves: self.state.moves_made,
            action,
            piece,
            to,
        };
        self.sender.send(message.encode())?;
        self.awaiting_echo = true;
        Ok(())
    }

    /// 宣告变体并以该变体重新开局
    pub fn new_game(&mut self, variant: VariantId) -> Result<()> {
        let mut state = GameState::new(variant)?;
        self.sender.send(Message::SendConfig { variant }.encode())?;

        state.network_id = self.state.network_id;
        state.peer_connected = self.state.peer_connected;
        state.chosen_variant = Some(variant);
        self.state = state;

        tracing::info!("New game started with variant {}", variant);
        self.notify();
        Ok(())
    }

    /// 处理中继转发来的帧
    pub fn on_frame(&mut self, frame: &Frame) {
        let message = match frame.message() {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping message from peer {}: {}", frame.source, e);
                return;
            }
        };
        tracing::debug!("Received from peer {}: {:?}", frame.source, message);

        match message {
            Message::PlayerIn { pid } => {
                if self.network_id == 1 && pid == 2 {
                    tracing::info!("Opponent connected");
                    self.state.peer_connected = true;
                    self.notify();
                }
            }
            Message::SendConfig { variant } => {
                self.state.chosen_variant = Some(variant);
                self.notify();
            }
            Message::MadeAction {
                moves,
                action,
                piece,
                to,
            } => {
                if frame.source == self.network_id {
                    self.awaiting_echo = false;
                }

                // 以发送方的计数为准，执行失败时保留原状态
                let mut next = self.state.clone();
                next.moves_made = moves;
                match RuleEngine::perform_action(&mut next, action, piece, to) {
                    Ok(_) => self.state = next,
                    Err(e) => {
                        tracing::warn!("Action from peer {} rejected: {}", frame.source, e)
                    }
                }
                self.notify();
            }
        }
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer.on_state_change(&self.state);
        }
    }
}

/// 自动开局时应使用的变体
///
/// 玩家 1 在对手连接后使用自己选择的变体，玩家 2 跟随玩家 1 宣告的变体。
pub fn auto_start_variant(state: &GameState, preferred: VariantId) -> Option<VariantId> {
    match state.network_id {
        Some(1) if state.peer_connected => Some(preferred),
        Some(2) => state.chosen_variant,
        _ => None,
    }
}

/// 控制器：连接通道与同步器，启动后台任务
pub struct Controller {
    channel: PeerChannel,
    synchronizer: Synchronizer,
}

impl Controller {
    pub fn new(channel: PeerChannel) -> Result<Self> {
        let synchronizer = Synchronizer::new(channel.id(), channel.sender())?;
        Ok(Self {
            channel,
            synchronizer,
        })
    }

    pub fn subscribe(&mut self, observer: Arc<dyn StateChangeSink>) {
        self.synchronizer.subscribe(observer);
    }

    /// 宣告加入并启动监听任务和工作任务
    pub fn start(self) -> Result<ControllerHandle> {
        let Controller {
            channel,
            mut synchronizer,
        } = self;
        synchronizer.start()?;

        let channel = Arc::new(channel);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let listener_channel = channel.clone();
        let listener_tx = tx.clone();
        tokio::spawn(async move {
            while listener_channel.wait_received().await {
                for frame in listener_channel.drain_received() {
                    if listener_tx.send(Command::Inbound(frame)).is_err() {
                        return;
                    }
                }
            }
            tracing::debug!("Listener stopped");
        });

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                synchronizer.handle(command);
            }
            tracing::debug!("Synchronizer stopped");
        });

        Ok(ControllerHandle { tx, channel })
    }
}

/// 运行中的控制器句柄，丢弃时关闭连接
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Command>,
    channel: Arc<PeerChannel>,
}

impl ControllerHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| ClientError::WorkerStopped)?;
        rx.await.map_err(|_| ClientError::WorkerStopped)
    }

    /// 当前状态快照
    pub async fn state(&self) -> Result<GameState> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// 本端编号
    pub fn network_id(&self) -> PeerId {
        self.channel.id()
    }

    /// 等待连接关闭
    pub async fn closed(&self) {
        self.channel.closed().await
    }

    pub fn close(&self) {
        self.channel.close();
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.channel.close();
    }
}

#[async_trait]
impl ActionSink for ControllerHandle {
    async fn perform_action(&self, action: Action, piece: Piece, to: Location) -> Result<()> {
        self.request(|reply| Command::LocalAction {
            action,
            piece,
            to,
            reply,
        })
        .await?
    }
}

#[async_trait]
impl NewGameSink for ControllerHandle {
    async fn new_game(&self, variant: VariantId) -> Result<()> {
        self.request(|reply| Command::NewGame { variant, reply })
            .await?
    }
}
