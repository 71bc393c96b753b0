//! 错误类型定义

use thiserror::Error;

use crate::piece::{Location, PieceKind};

/// 规则引擎错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// 位置越界
    #[error("Invalid location: {0}")]
    InvalidLocation(Location),

    /// 不可通行地形
    #[error("Impassable terrain at {0}")]
    ImpassableTerrain(Location),

    /// 目标位置已有棋子
    #[error("Destination {0} is occupied")]
    OccupiedDestination(Location),

    /// 无效的走法
    #[error("Illegal move: from {from} to {to}")]
    IllegalMove { from: Location, to: Location },

    /// 储备中没有该类棋子
    #[error("No {kind} left in reserve")]
    EmptyReserve { kind: PieceKind },

    /// 没有棋子
    #[error("No piece at {0}")]
    NoPiece(Location),

    /// 不是你的回合
    #[error("Not your turn")]
    NotYourTurn,

    /// 游戏已结束
    #[error("Game is already over")]
    GameOver,

    /// 未知的棋盘变体
    #[error("Unknown board variant: {0}")]
    UnknownVariant(u8),
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 无法解析或字段不全的消息
    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    /// 未知的消息类型
    #[error("Unknown message type: {0}")]
    UnknownMessageType(i64),

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// 构造 MalformedMessage
    pub fn malformed(reason: impl Into<String>) -> Self {
        ProtocolError::MalformedMessage {
            reason: reason.into(),
        }
    }
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
