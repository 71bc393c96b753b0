//! 协议常量定义

use std::time::Duration;

/// 每回合可执行的动作数
pub const MAX_MOVES: u32 = 3;

/// 中继服务器默认端口
pub const DEFAULT_PORT: u16 = 15000;

/// 中继支持的最大玩家数
pub const MAX_PEERS: u8 = 2;

/// 单帧消息最大字节数（不含换行符）
pub const MAX_FRAME_SIZE: usize = 202;

/// 中继转发帧（带来源编号前缀）的最大字节数
pub const MAX_RELAYED_FRAME_SIZE: usize = MAX_FRAME_SIZE + 4;

/// 中继为每个客户端缓冲的待发送帧数
pub const CLIENT_BUFFER_SIZE: usize = 256;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
