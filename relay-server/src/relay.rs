//! 中继主逻辑
//!
//! 前两个连接的客户端分别成为玩家 1 和玩家 2，之后的连接直接拒绝。
//! 任一玩家发来的消息都会转发给所有玩家（包括发送方自己）。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use protocol::{Connection, Frame, Listener, PeerId, CLIENT_BUFFER_SIZE, MAX_PEERS};

use crate::session::Session;

/// 玩家编号 -> 待发送帧通道
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<StdMutex<BTreeMap<PeerId, mpsc::Sender<Frame>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配最小的空闲编号，玩家已满时返回 None
    pub fn register(&self, tx: mpsc::Sender<Frame>) -> Option<PeerId> {
        let mut clients = self.clients.lock().ok()?;
        let id = (1..=MAX_PEERS).find(|id| !clients.contains_key(id))?;
        clients.insert(id, tx);
        Some(id)
    }

    /// 释放编号
    pub fn unregister(&self, id: PeerId) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.remove(&id);
        }
    }

    /// 已注册的玩家数
    pub fn len(&self) -> usize {
        self.clients.lock().map(|clients| clients.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把一帧交给所有已注册玩家的发送队列
    pub fn deliver(&self, frame: &Frame) {
        let Ok(clients) = self.clients.lock() else {
            return;
        };
        for (id, tx) in clients.iter() {
            debug!("转发给玩家 {}: {}", id, frame.to_line());
            match tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("玩家 {} 的发送缓冲已满，丢弃消息", id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("玩家 {} 已断开，跳过", id);
                }
            }
        }
    }
}

/// 广播循环：按到达顺序转发，保证两名玩家看到相同的消息序列
pub async fn broadcast_loop(registry: ClientRegistry, mut rx: mpsc::Receiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        registry.deliver(&frame);
    }
}

/// 中继服务器
#[derive(Clone, Default)]
pub struct RelayServer {
    registry: ClientRegistry,
}

impl RelayServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// 接受连接直到监听器出错
    pub async fn run<L>(&self, mut listener: L) -> protocol::Result<()>
    where
        L: Listener,
        L::Conn: 'static,
    {
        if let Some(addr) = listener.local_addr() {
            info!("中继服务器监听于 {}", addr);
        }

        let (broadcast_tx, broadcast_rx) = mpsc::channel(CLIENT_BUFFER_SIZE);
        tokio::spawn(broadcast_loop(self.registry.clone(), broadcast_rx));

        loop {
            let conn = listener.accept().await?;
            let addr = conn.peer_addr().unwrap_or_else(|| "unknown".to_string());

            let (tx, rx) = mpsc::channel(CLIENT_BUFFER_SIZE);
            let Some(id) = self.registry.register(tx) else {
                info!("拒绝 {}：玩家已满", addr);
                continue;
            };
            info!("{} 成为玩家 {}", addr, id);

            let session = Session::new(id, self.registry.clone(), broadcast_tx.clone());
            tokio::spawn(session.run(conn, rx));
        }
    }
}
