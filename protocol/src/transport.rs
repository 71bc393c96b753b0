//! 传输层
//!
//! 提供 Connector/Connection/Listener traits 使上层协议与具体传输实现解耦，
//! 以及客户端使用的 [`PeerChannel`]：握手后由后台发送/接收两个循环驱动，
//! 上层只与两个队列打交道。

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;

use crate::error::{ProtocolError, Result};
use crate::message::Frame;
use crate::piece::{PeerId, Side};
use crate::{CONNECT_TIMEOUT, DEFAULT_PORT, MAX_FRAME_SIZE, MAX_RELAYED_FRAME_SIZE};

/// 网络配置
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
}

impl NetworkConfig {
    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// 已建立的连接，可拆分为帧读写端
pub trait Connection: Send + Sized {
    type Reader: AsyncRead + Unpin + Send + 'static;
    type Writer: AsyncWrite + Unpin + Send + 'static;

    /// 分离读写端
    fn split(self) -> (Self::Reader, Self::Writer);

    /// 获取远端地址
    fn peer_addr(&self) -> Option<String>;
}

/// 连接器 trait（客户端使用）
#[async_trait]
pub trait Connector: Send + Sync {
    type Conn: Connection;

    /// 建立连接
    async fn connect(&self, addr: &str) -> Result<Self::Conn>;
}

/// 监听器 trait（中继使用）
#[async_trait]
pub trait Listener: Send + Sync + Sized {
    type Conn: Connection;

    /// 绑定地址
    async fn bind(addr: &str) -> Result<Self>;

    /// 接受连接
    async fn accept(&mut self) -> Result<Self::Conn>;

    /// 获取本地地址
    fn local_addr(&self) -> Option<String>;
}

// ============================================================================
// TCP 实现
// ============================================================================

/// TCP 连接器
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Conn = TcpConnection;

    async fn connect(&self, addr: &str) -> Result<Self::Conn> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ProtocolError::ConnectionTimeout)?
            .map_err(ProtocolError::Io)?;

        TcpConnection::from_stream(stream)
    }
}

/// TCP 连接
pub struct TcpConnection {
    stream: TcpStream,
    peer_addr: Option<String>,
}

impl TcpConnection {
    /// 从 TcpStream 创建（中继使用）
    pub fn from_stream(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr().ok().map(|a| a.to_string());
        Ok(Self { stream, peer_addr })
    }
}

impl Connection for TcpConnection {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    fn split(self) -> (OwnedReadHalf, OwnedWriteHalf) {
        self.stream.into_split()
    }

    fn peer_addr(&self) -> Option<String> {
        self.peer_addr.clone()
    }
}

/// TCP 监听器
pub struct TcpListener {
    listener: tokio::net::TcpListener,
}

#[async_trait]
impl Listener for TcpListener {
    type Conn = TcpConnection;

    async fn bind(addr: &str) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ProtocolError::Io)?;
        Ok(Self { listener })
    }

    async fn accept(&mut self) -> Result<Self::Conn> {
        let (stream, _addr) = self.listener.accept().await.map_err(ProtocolError::Io)?;
        TcpConnection::from_stream(stream)
    }

    fn local_addr(&self) -> Option<String> {
        self.listener.local_addr().ok().map(|a| a.to_string())
    }
}

// ============================================================================
// 帧编解码
// ============================================================================

/// 帧读取器：按行读取，每行一帧
pub struct FrameReader<R> {
    reader: BufReader<R>,
    max_size: usize,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    /// 创建新的帧读取器，单帧上限为 [`MAX_FRAME_SIZE`]
    pub fn new(reader: R) -> Self {
        Self::with_max_size(reader, MAX_FRAME_SIZE)
    }

    pub fn with_max_size(reader: R, max_size: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_size,
        }
    }

    /// 读取一帧（不含换行符）
    ///
    /// 超长的行会被整行丢弃并返回 `FrameTooLarge`，之后可继续读取下一帧。
    pub async fn read_frame(&mut self) -> Result<String> {
        // 行尾最多有 \r\n 两个字节
        let limit = (self.max_size + 2) as u64;
        let mut line = Vec::with_capacity(self.max_size);
        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Err(ProtocolError::ConnectionClosed);
        }

        if !line.ends_with(b"\n") && n as u64 == limit {
            let size = n + self.skip_line().await?;
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_size,
            });
        }

        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        if line.len() > self.max_size {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: self.max_size,
            });
        }

        String::from_utf8(line).map_err(|_| ProtocolError::malformed("frame is not valid UTF-8"))
    }

    /// 丢弃当前行剩余部分，返回丢弃的字节数（不含换行符）
    async fn skip_line(&mut self) -> Result<usize> {
        let mut skipped = 0;
        loop {
            let (consumed, done) = {
                let buf = self.reader.fill_buf().await?;
                match buf.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (buf.len(), buf.is_empty()),
                }
            };
            self.reader.consume(consumed);
            if done {
                return Ok(skipped + consumed.saturating_sub(1));
            }
            skipped += consumed;
        }
    }
}

/// 帧写入器
pub struct FrameWriter<W> {
    writer: W,
    max_size: usize,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    /// 创建新的帧写入器，单帧上限为 [`MAX_FRAME_SIZE`]
    pub fn new(writer: W) -> Self {
        Self::with_max_size(writer, MAX_FRAME_SIZE)
    }

    pub fn with_max_size(writer: W, max_size: usize) -> Self {
        Self { writer, max_size }
    }

    /// 写入一帧并追加换行符
    pub async fn write_frame(&mut self, line: &str) -> Result<()> {
        if line.len() > self.max_size {
            return Err(ProtocolError::FrameTooLarge {
                size: line.len(),
                max: self.max_size,
            });
        }
        if line.contains('\n') {
            return Err(ProtocolError::malformed("frame contains a line break"));
        }

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

// ============================================================================
// 对等通道
// ============================================================================

/// 共享关闭信号，只会被触发一次
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// 触发关闭，只有第一次调用返回 true
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// 等待关闭信号
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // 发送端由自身持有，不会提前关闭
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// 发送队列的句柄，可在任务间克隆
#[derive(Clone, Debug)]
pub struct PeerSender {
    tx: mpsc::UnboundedSender<String>,
    shutdown: Shutdown,
}

impl PeerSender {
    /// 创建未连接网络的发送端，返回队列的接收端
    pub fn pair() -> (PeerSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = PeerSender {
            tx,
            shutdown: Shutdown::new(),
        };
        (sender, rx)
    }

    /// 加入发送队列，不等待送达
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        let payload = payload.into();
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        if self.shutdown.is_triggered() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.tx
            .send(payload)
            .map_err(|_| ProtocolError::ConnectionClosed)
    }
}

/// 接收队列
#[derive(Default)]
struct Inbox {
    queue: StdMutex<VecDeque<Frame>>,
    notify: Notify,
}

impl Inbox {
    fn push(&self, frame: Frame) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(frame);
        }
        self.notify.notify_one();
    }

    fn is_empty(&self) -> bool {
        self.queue.lock().map(|queue| queue.is_empty()).unwrap_or(true)
    }
}

/// 与中继之间的通道
///
/// 握手得到本端编号后，后台发送循环和接收循环开始运行。
/// 任一循环遇到连接错误都会触发共享关闭信号，另一个循环随之退出。
pub struct PeerChannel {
    id: PeerId,
    sender: PeerSender,
    inbox: Arc<Inbox>,
    shutdown: Shutdown,
}

impl PeerChannel {
    /// 通过 TCP 连接中继
    pub async fn connect(addr: &str) -> Result<Self> {
        Self::connect_with(&TcpConnector, addr).await
    }

    pub async fn connect_with<C: Connector>(connector: &C, addr: &str) -> Result<Self> {
        let conn = connector.connect(addr).await?;
        tracing::info!("Connected to relay: {}", conn.peer_addr().as_deref().unwrap_or(addr));
        let (reader, writer) = conn.split();
        Self::handshake(
            FrameReader::with_max_size(reader, MAX_RELAYED_FRAME_SIZE),
            FrameWriter::new(writer),
        )
        .await
    }

    /// 读取握手帧并启动后台循环
    pub async fn handshake<R, W>(mut reader: FrameReader<R>, writer: FrameWriter<W>) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let frame = Frame::parse(&reader.read_frame().await?)?;
        if Side::from_peer_id(frame.source).is_none() {
            return Err(ProtocolError::malformed(format!(
                "invalid peer id {} in handshake",
                frame.source
            )));
        }
        tracing::info!("Assigned peer id {}", frame.source);

        let shutdown = Shutdown::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let inbox = Arc::new(Inbox::default());

        tokio::spawn(send_loop(writer, rx, shutdown.clone()));
        tokio::spawn(recv_loop(reader, inbox.clone(), shutdown.clone()));

        Ok(Self {
            id: frame.source,
            sender: PeerSender {
                tx,
                shutdown: shutdown.clone(),
            },
            inbox,
            shutdown,
        })
    }

    /// 中继分配的本端编号
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// 加入发送队列
    pub fn send(&self, payload: impl Into<String>) -> Result<()> {
        self.sender.send(payload)
    }

    pub fn sender(&self) -> PeerSender {
        self.sender.clone()
    }

    /// 取出当前接收队列中的全部帧（按到达顺序）
    pub fn drain_received(&self) -> Vec<Frame> {
        match self.inbox.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 等待接收队列非空
    ///
    /// 队列中有数据时返回 true；通道已关闭且队列为空时返回 false。
    pub async fn wait_received(&self) -> bool {
        loop {
            let notified = self.inbox.notify.notified();
            if !self.inbox.is_empty() {
                return true;
            }
            if self.shutdown.is_triggered() {
                return false;
            }
            tokio::select! {
                _ = notified => {}
                _ = self.shutdown.wait() => {}
            }
        }
    }

    /// 关闭通道
    pub fn close(&self) {
        if self.shutdown.trigger() {
            tracing::debug!("Peer channel {} closed", self.id);
        }
    }

    /// 等待通道关闭
    pub async fn closed(&self) {
        self.shutdown.wait().await
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_triggered()
    }
}

impl Drop for PeerChannel {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// 发送循环：队列非空时一次性发完
async fn send_loop<W>(
    mut writer: FrameWriter<W>,
    mut outbox: mpsc::UnboundedReceiver<String>,
    shutdown: Shutdown,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let first = tokio::select! {
            _ = shutdown.wait() => break,
            next = outbox.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        let mut batch = vec![first];
        while let Ok(payload) = outbox.try_recv() {
            batch.push(payload);
        }

        for payload in batch {
            match writer.write_frame(&payload).await {
                Ok(()) => {}
                Err(e @ ProtocolError::FrameTooLarge { .. }) => {
                    tracing::warn!("Dropping outbound frame: {}", e);
                }
                Err(e) => {
                    tracing::warn!("Send failed: {}", e);
                    if shutdown.trigger() {
                        tracing::info!("Connection to relay lost");
                    }
                    return;
                }
            }
        }
    }
}

/// 接收循环：每帧拆分为来源编号和负载后放入接收队列
async fn recv_loop<R>(mut reader: FrameReader<R>, inbox: Arc<Inbox>, shutdown: Shutdown)
where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let result = tokio::select! {
            _ = shutdown.wait() => break,
            result = reader.read_frame() => result,
        };

        match result {
            Ok(line) => match Frame::parse(&line) {
                Ok(frame) => inbox.push(frame),
                Err(e) => tracing::warn!("Dropping inbound frame {:?}: {}", line, e),
            },
            Err(e @ (ProtocolError::FrameTooLarge { .. } | ProtocolError::MalformedMessage { .. })) => {
                tracing::warn!("Dropping inbound frame: {}", e);
            }
            Err(e) => {
                tracing::debug!("Receive loop stopped: {}", e);
                if shutdown.trigger() {
                    tracing::info!("Connection to relay lost");
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

    type RelayEnd = (FrameReader<ReadHalf<DuplexStream>>, FrameWriter<WriteHalf<DuplexStream>>);

    /// 返回 (客户端读写端, 模拟中继读写端)
    fn pipe() -> (
        (FrameReader<ReadHalf<DuplexStream>>, FrameWriter<WriteHalf<DuplexStream>>),
        RelayEnd,
    ) {
        let (client, relay) = duplex(4096);
        let (client_r, client_w) = split(client);
        let (relay_r, relay_w) = split(relay);
        (
            (
                FrameReader::with_max_size(client_r, MAX_RELAYED_FRAME_SIZE),
                FrameWriter::new(client_w),
            ),
            (
                FrameReader::new(relay_r),
                FrameWriter::with_max_size(relay_w, MAX_RELAYED_FRAME_SIZE),
            ),
        )
    }

    async fn connected(id: PeerId) -> (PeerChannel, RelayEnd) {
        let ((reader, writer), (relay_r, mut relay_w)) = pipe();
        relay_w.write_frame(&Frame::new(id, "").to_line()).await.unwrap();
        let channel = PeerChannel::handshake(reader, writer).await.unwrap();
        (channel, (relay_r, relay_w))
    }

    #[tokio::test]
    async fn test_frame_reader_lines() {
        let (mut tx, rx) = duplex(1024);
        let mut reader = FrameReader::new(rx);
        tx.write_all(b"1 \n2 type:1/pid:2\r\nlast").await.unwrap();
        drop(tx);

        assert_eq!(reader.read_frame().await.unwrap(), "1 ");
        assert_eq!(reader.read_frame().await.unwrap(), "2 type:1/pid:2");
        assert_eq!(reader.read_frame().await.unwrap(), "last");
        assert!(matches!(
            reader.read_frame().await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_frame_reader_skips_oversize_line() {
        let (mut tx, rx) = duplex(4096);
        let mut reader = FrameReader::new(rx);
        let long = "x".repeat(MAX_FRAME_SIZE + 100);
        tx.write_all(format!("{long}\nok\n").as_bytes()).await.unwrap();

        match reader.read_frame().await {
            Err(ProtocolError::FrameTooLarge { size, max }) => {
                assert_eq!(size, long.len());
                assert_eq!(max, MAX_FRAME_SIZE);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(reader.read_frame().await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_frame_writer_limits() {
        let (tx, _rx) = duplex(4096);
        let mut writer = FrameWriter::new(tx);
        assert!(matches!(
            writer.write_frame(&"y".repeat(MAX_FRAME_SIZE + 1)).await,
            Err(ProtocolError::FrameTooLarge { .. })
        ));
        assert!(matches!(
            writer.write_frame("a\nb").await,
            Err(ProtocolError::MalformedMessage { .. })
        ));
        writer.write_frame(&"y".repeat(MAX_FRAME_SIZE)).await.unwrap();
    }

    #[test]
    fn test_shutdown_triggers_once() {
        let shutdown = Shutdown::new();
        let other = shutdown.clone();
        assert!(!shutdown.is_triggered());
        assert!(other.trigger());
        assert!(!shutdown.trigger());
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_handshake_and_exchange() {
        let (channel, (mut relay_r, mut relay_w)) = connected(2).await;
        assert_eq!(channel.id(), 2);

        relay_w.write_frame("1 type:1/pid:1").await.unwrap();
        assert!(channel.wait_received().await);
        assert_eq!(channel.drain_received(), vec![Frame::new(1, "type:1/pid:1")]);
        assert!(channel.drain_received().is_empty());

        channel.send("type:1/pid:2").unwrap();
        assert_eq!(relay_r.read_frame().await.unwrap(), "type:1/pid:2");
    }

    #[tokio::test]
    async fn test_outbound_order() {
        let (channel, (mut relay_r, _relay_w)) = connected(1).await;
        let sender = channel.sender();
        for moves in 0..5 {
            sender.send(format!("type:3/moves:{moves}")).unwrap();
        }
        for moves in 0..5 {
            assert_eq!(
                relay_r.read_frame().await.unwrap(),
                format!("type:3/moves:{moves}")
            );
        }
    }

    #[tokio::test]
    async fn test_inbound_order_and_malformed_frames() {
        let (channel, (relay_r, mut relay_w)) = connected(1).await;
        relay_w.write_frame("x type:1/pid:1").await.unwrap();
        relay_w.write_frame("1 type:2/variant:1").await.unwrap();
        relay_w.write_frame("2 type:2/variant:3").await.unwrap();
        // 模拟中继关闭，接收循环处理完已有数据后退出
        drop((relay_r, relay_w));
        channel.closed().await;

        assert!(channel.wait_received().await);
        assert_eq!(
            channel.drain_received(),
            vec![
                Frame::new(1, "type:2/variant:1"),
                Frame::new(2, "type:2/variant:3"),
            ]
        );
    }

    #[tokio::test]
    async fn test_send_rejects_oversize_payload() {
        let (channel, _relay) = connected(1).await;
        assert!(matches!(
            channel.send("z".repeat(MAX_FRAME_SIZE + 1)),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_on_relay_close() {
        let (channel, relay) = connected(1).await;
        drop(relay);

        channel.closed().await;
        assert!(channel.is_closed());
        assert!(!channel.wait_received().await);
        assert!(matches!(
            channel.send("type:1/pid:1"),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (channel, _relay) = connected(2).await;
        channel.close();
        channel.close();
        channel.closed().await;
        assert!(!channel.wait_received().await);
    }

    #[tokio::test]
    async fn test_handshake_rejects_bad_id() {
        let ((reader, writer), (_relay_r, mut relay_w)) = pipe();
        relay_w.write_frame("7 ").await.unwrap();
        assert!(matches!(
            PeerChannel::handshake(reader, writer).await,
            Err(ProtocolError::MalformedMessage { .. })
        ));

        let ((reader, writer), relay) = pipe();
        drop(relay);
        assert!(matches!(
            PeerChannel::handshake(reader, writer).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_peer_sender_pair() {
        let (sender, mut rx) = PeerSender::pair();
        sender.send("type:2/variant:2").unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("type:2/variant:2"));
    }

    #[tokio::test]
    async fn test_tcp_connection() {
        let mut listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let relay = tokio::spawn(async move {
            let conn = listener.accept().await.unwrap();
            assert!(conn.peer_addr().is_some());
            let (reader, writer) = conn.split();
            let mut reader = FrameReader::new(reader);
            let mut writer = FrameWriter::with_max_size(writer, MAX_RELAYED_FRAME_SIZE);

            writer.write_frame("1 ").await.unwrap();
            let payload = reader.read_frame().await.unwrap();
            writer.write_frame(&Frame::new(1, payload).to_line()).await.unwrap();
        });

        let channel = PeerChannel::connect(&addr).await.unwrap();
        assert_eq!(channel.id(), 1);
        channel.send("type:1/pid:1").unwrap();

        assert!(channel.wait_received().await);
        assert_eq!(channel.drain_received(), vec![Frame::new(1, "type:1/pid:1")]);
        relay.await.unwrap();
    }
}
