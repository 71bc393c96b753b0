//! 单个玩家的连接会话

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use protocol::{
    Connection, Frame, FrameReader, FrameWriter, PeerId, ProtocolError, Shutdown,
    MAX_RELAYED_FRAME_SIZE,
};

use crate::relay::ClientRegistry;

/// 玩家会话
pub struct Session {
    id: PeerId,
    registry: ClientRegistry,
    /// 发往广播循环
    broadcast: mpsc::Sender<Frame>,
}

impl Session {
    pub fn new(id: PeerId, registry: ClientRegistry, broadcast: mpsc::Sender<Frame>) -> Self {
        Self {
            id,
            registry,
            broadcast,
        }
    }

    /// 发送握手帧后运行收发循环，连接断开时释放编号
    pub async fn run<C: Connection>(self, conn: C, outbox: mpsc::Receiver<Frame>) {
        let (reader, writer) = conn.split();
        let reader = FrameReader::new(reader);
        let mut writer = FrameWriter::with_max_size(writer, MAX_RELAYED_FRAME_SIZE);

        match writer.write_frame(&Frame::new(self.id, "").to_line()).await {
            Ok(()) => {
                let shutdown = Shutdown::new();
                let send = tokio::spawn(send_loop(self.id, writer, outbox, shutdown.clone()));
                recv_loop(self.id, reader, self.broadcast.clone(), shutdown.clone()).await;
                shutdown.trigger();
                let _ = send.await;
            }
            Err(e) => warn!("向玩家 {} 发送握手失败: {}", self.id, e),
        }

        self.registry.unregister(self.id);
        info!("玩家 {} 已断开", self.id);
    }
}

/// 把广播帧写给客户端
async fn send_loop<W>(
    id: PeerId,
    mut writer: FrameWriter<W>,
    mut outbox: mpsc::Receiver<Frame>,
    shutdown: Shutdown,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let frame = tokio::select! {
            _ = shutdown.wait() => break,
            frame = outbox.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        if let Err(e) = writer.write_frame(&frame.to_line()).await {
            warn!("向玩家 {} 发送失败: {}", id, e);
            shutdown.trigger();
            break;
        }
    }
}

/// 读取客户端消息并交给广播循环
async fn recv_loop<R>(
    id: PeerId,
    mut reader: FrameReader<R>,
    broadcast: mpsc::Sender<Frame>,
    shutdown: Shutdown,
) where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let result = tokio::select! {
            _ = shutdown.wait() => break,
            result = reader.read_frame() => result,
        };

        match result {
            Ok(payload) => {
                debug!("收到玩家 {} 的消息: {}", id, payload);
                if broadcast.send(Frame::new(id, payload)).await.is_err() {
                    break;
                }
            }
            Err(e @ (ProtocolError::FrameTooLarge { .. } | ProtocolError::MalformedMessage { .. })) => {
                warn!("丢弃玩家 {} 的消息: {}", id, e);
            }
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e) => {
                warn!("读取玩家 {} 的消息失败: {}", id, e);
                break;
            }
        }
    }
}
