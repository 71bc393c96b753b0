//! 水晶棋客户端
//!
//! 包含:
//! - 对局同步（本地动作、中继消息、新对局）
//! - 界面层使用的观察者接口
//! - 客户端设置

pub mod controller;
pub mod error;
pub mod observer;
pub mod settings;

pub use controller::{auto_start_variant, Command, Controller, ControllerHandle, Synchronizer};
pub use error::{ClientError, Result};
pub use observer::{ActionSink, ChannelObserver, LoggingObserver, NewGameSink, StateChangeSink};
pub use settings::{ClientSettings, LogLevel};
