//! 水晶棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘、玩家、对局状态等核心数据结构
//! - 走法表和棋盘变体
//! - 规则引擎（动作执行、回合切换、胜负判定）
//! - 消息编解码 (Message, Frame)
//! - 传输层抽象 (Connector, Connection, Listener traits) 与对等通道

mod board;
mod constants;
mod error;
mod message;
pub mod movement;
mod piece;
mod player;
mod rules;
mod state;
mod transport;
pub mod variant;

pub use board::{Board, Tile};
pub use constants::*;
pub use error::{GameError, ProtocolError, Result};
pub use message::{Frame, Message, MessageType};
pub use piece::{Location, PeerId, Piece, PieceKind, Side};
pub use player::Player;
pub use rules::{Action, RuleEngine};
pub use state::{GameState, Verdict};
pub use transport::{
    Connection, Connector, Listener,
    TcpConnection, TcpConnector, TcpListener,
    NetworkConfig,
    FrameReader, FrameWriter,
    PeerChannel, PeerSender, Shutdown,
};
pub use variant::{Variant, VariantId, DEFAULT_VARIANT, VARIANTS};
