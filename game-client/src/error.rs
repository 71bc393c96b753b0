//! 客户端错误类型

use thiserror::Error;

use protocol::{GameError, ProtocolError};

/// 客户端错误
#[derive(Error, Debug)]
pub enum ClientError {
    /// 规则错误（本地动作未通过校验等）
    #[error(transparent)]
    Game(#[from] GameError),

    /// 网络或编解码错误
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// 上一个本地动作还没有收到中继回显
    #[error("Previous action is still waiting for the relay")]
    ActionPending,

    /// 同步任务已退出
    #[error("Synchronizer is no longer running")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, ClientError>;
