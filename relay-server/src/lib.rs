//! 水晶棋中继服务端
//!
//! 包含:
//! - 玩家编号分配
//! - 广播转发（包括回显给发送方）
//! - 单个连接的收发循环

pub mod relay;
pub mod session;

pub use relay::{ClientRegistry, RelayServer};
pub use session::Session;
