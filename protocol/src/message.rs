//! 消息编解码
//!
//! 消息为一行文本：`type:<int>/key:value/key:value/...`。
//! 中继在每条消息前加上来源编号，组成帧 `<source> <payload>`。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};
use crate::piece::{Location, PeerId, Piece, PieceKind, Side};
use crate::rules::Action;
use crate::variant::{self, VariantId};

/// 消息类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// 玩家加入
    PlayerIn,
    /// 选定变体
    SendConfig,
    /// 执行了动作
    MadeAction,
}

impl MessageType {
    pub fn code(&self) -> i64 {
        match self {
            MessageType::PlayerIn => 1,
            MessageType::SendConfig => 2,
            MessageType::MadeAction => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<MessageType> {
        match code {
            1 => Some(MessageType::PlayerIn),
            2 => Some(MessageType::SendConfig),
            3 => Some(MessageType::MadeAction),
            _ => None,
        }
    }
}

/// 对等端之间交换的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// 发送方已加入，`pid` 为其玩家编号
    PlayerIn { pid: PeerId },
    /// 玩家 1 选定的变体
    SendConfig { variant: VariantId },
    /// 一次动作
    ///
    /// `moves` 为发送时本回合已执行的动作数；`piece` 的位置为移动起点，
    /// 落子时为 (-1, -1)。
    MadeAction {
        moves: u32,
        action: Action,
        piece: Piece,
        to: Location,
    },
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::PlayerIn { .. } => MessageType::PlayerIn,
            Message::SendConfig { .. } => MessageType::SendConfig,
            Message::MadeAction { .. } => MessageType::MadeAction,
        }
    }

    /// 编码为单行文本
    pub fn encode(&self) -> String {
        let code = self.message_type().code();
        match self {
            Message::PlayerIn { pid } => format!("type:{code}/pid:{pid}"),
            Message::SendConfig { variant } => format!("type:{code}/variant:{variant}"),
            Message::MadeAction {
                moves,
                action,
                piece,
                to,
            } => format!(
                "type:{code}/moves:{moves}/action:{}/pkind:{}/pside:{}/prow:{}/pcol:{}/torow:{}/tocol:{}",
                action.code(),
                piece.kind.name(),
                piece.side.code(),
                piece.location.row,
                piece.location.col,
                to.row,
                to.col,
            ),
        }
    }

    /// 解码单行文本
    ///
    /// 第一个字段必须是 `type`；其余字段顺序不限，多余字段忽略。
    pub fn decode(payload: &str) -> Result<Message> {
        let mut tokens = payload.trim().split('/');
        let head = tokens.next().unwrap_or_default();
        let (key, value) = split_field(head)?;
        if key != "type" {
            return Err(ProtocolError::malformed(format!(
                "expected leading `type` field, got `{key}`"
            )));
        }
        let code: i64 = value
            .parse()
            .map_err(|_| ProtocolError::malformed(format!("invalid message type `{value}`")))?;
        let message_type =
            MessageType::from_code(code).ok_or(ProtocolError::UnknownMessageType(code))?;

        let fields = Fields::from_tokens(tokens)?;
        match message_type {
            MessageType::PlayerIn => {
                let pid: PeerId = fields.parse("pid")?;
                if Side::from_peer_id(pid).is_none() {
                    return Err(ProtocolError::malformed(format!("invalid pid {pid}")));
                }
                Ok(Message::PlayerIn { pid })
            }
            MessageType::SendConfig => {
                let variant: VariantId = fields.parse("variant")?;
                if variant::lookup(variant).is_none() {
                    return Err(ProtocolError::malformed(format!(
                        "unknown variant {variant}"
                    )));
                }
                Ok(Message::SendConfig { variant })
            }
            MessageType::MadeAction => {
                let moves = fields.parse("moves")?;
                let action_code: u8 = fields.parse("action")?;
                let action = Action::from_code(action_code).ok_or_else(|| {
                    ProtocolError::malformed(format!("invalid action {action_code}"))
                })?;
                let kind: PieceKind = fields.parse("pkind")?;
                let side_code: u8 = fields.parse("pside")?;
                let side = Side::from_code(side_code)
                    .ok_or_else(|| ProtocolError::malformed(format!("invalid pside {side_code}")))?;
                let from = Location::new(fields.parse("prow")?, fields.parse("pcol")?);
                // 早期客户端把目标列写成 `toloc`
                let to_col = match fields.get("tocol") {
                    Ok(_) => fields.parse("tocol")?,
                    Err(_) => fields.parse("toloc")?,
                };
                let to = Location::new(fields.parse("torow")?, to_col);

                Ok(Message::MadeAction {
                    moves,
                    action,
                    piece: Piece::new(kind, side, from),
                    to,
                })
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

fn split_field(token: &str) -> Result<(&str, &str)> {
    token
        .split_once(':')
        .ok_or_else(|| ProtocolError::malformed(format!("field `{token}` is not key:value")))
}

/// 已拆分的 `key:value` 字段
struct Fields<'a>(HashMap<&'a str, &'a str>);

impl<'a> Fields<'a> {
    fn from_tokens(tokens: impl Iterator<Item = &'a str>) -> Result<Self> {
        let mut fields = HashMap::new();
        for token in tokens.filter(|t| !t.is_empty()) {
            let (key, value) = split_field(token)?;
            fields.insert(key, value);
        }
        Ok(Self(fields))
    }

    fn get(&self, key: &str) -> Result<&'a str> {
        self.0
            .get(key)
            .copied()
            .ok_or_else(|| ProtocolError::malformed(format!("missing field `{key}`")))
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        value
            .parse()
            .map_err(|_| ProtocolError::malformed(format!("invalid value `{value}` for `{key}`")))
    }
}

/// 中继转发的一帧：来源编号 + 消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub source: PeerId,
    pub payload: String,
}

impl Frame {
    pub fn new(source: PeerId, payload: impl Into<String>) -> Self {
        Self {
            source,
            payload: payload.into(),
        }
    }

    /// 解析 `<source> <payload>`
    ///
    /// 握手帧只有来源编号，负载为空。
    pub fn parse(line: &str) -> Result<Frame> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (source, payload) = line.split_once(' ').unwrap_or((line, ""));
        let source = source
            .parse()
            .map_err(|_| ProtocolError::malformed(format!("invalid source tag `{source}`")))?;
        Ok(Frame::new(source, payload))
    }

    /// 编码为一行（不含换行符）
    pub fn to_line(&self) -> String {
        format!("{} {}", self.source, self.payload)
    }

    /// 解码负载
    pub fn message(&self) -> Result<Message> {
        Message::decode(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn made_action() -> Message {
        Message::MadeAction {
            moves: 2,
            action: Action::Move,
            piece: Piece::new(PieceKind::Swordsman, Side::Blue, Location::new(9, 0)),
            to: Location::new(8, 0),
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(Message::PlayerIn { pid: 2 }.encode(), "type:1/pid:2");
        assert_eq!(Message::SendConfig { variant: 4 }.encode(), "type:2/variant:4");
        assert_eq!(
            made_action().encode(),
            "type:3/moves:2/action:1/pkind:Swordsman/pside:2/prow:9/pcol:0/torow:8/tocol:0"
        );
    }

    #[test]
    fn test_decode_made_action() {
        let decoded = Message::decode(&made_action().encode()).unwrap();
        assert_eq!(decoded, made_action());

        let drop = Message::MadeAction {
            moves: 0,
            action: Action::Drop,
            piece: Piece::new(PieceKind::Guard, Side::Red, Location::new(-1, -1)),
            to: Location::new(3, 7),
        };
        assert_eq!(Message::decode(&drop.encode()).unwrap(), drop);
    }

    #[test]
    fn test_made_action_round_trip_all_kinds() {
        // Prime 棋盘最大到 (15, 20)，War 到 (18, 12)
        let squares = [
            (Location::new(0, 0), Location::new(1, 0)),
            (Location::new(18, 12), Location::new(17, 11)),
            (Location::new(15, 20), Location::new(11, 20)),
        ];
        for kind in PieceKind::ALL {
            for side in [Side::Red, Side::Blue] {
                for action in [Action::Move, Action::Drop] {
                    for (moves, &(from, to)) in squares.iter().enumerate() {
                        let from = match action {
                            Action::Move => from,
                            Action::Drop => Location::new(-1, -1),
                        };
                        let message = Message::MadeAction {
                            moves: moves as u32,
                            action,
                            piece: Piece::new(kind, side, from),
                            to,
                        };
                        let encoded = message.encode();
                        assert_eq!(Message::decode(&encoded).unwrap(), message, "{encoded}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_decode_field_order_and_extras() {
        let payload =
            "type:3/tocol:0/torow:8/pcol:0/prow:9/pside:2/pkind:Swordsman/action:1/moves:2/extra:x\n";
        assert_eq!(Message::decode(payload).unwrap(), made_action());
        assert_eq!(
            Message::decode("type:1/pid:1/").unwrap(),
            Message::PlayerIn { pid: 1 }
        );
    }

    #[test]
    fn test_decode_legacy_column_key() {
        let payload = "type:3/moves:2/action:1/pkind:Swordsman/pside:2/prow:9/pcol:0/torow:8/toloc:0";
        assert_eq!(Message::decode(payload).unwrap(), made_action());
    }

    #[test]
    fn test_decode_unknown_type() {
        assert!(matches!(
            Message::decode("type:7/pid:1"),
            Err(ProtocolError::UnknownMessageType(7))
        ));
        assert!(matches!(
            Message::decode("type:x/pid:1"),
            Err(ProtocolError::MalformedMessage { .. })
        ));
        assert!(matches!(
            Message::decode("pid:1/type:1"),
            Err(ProtocolError::MalformedMessage { .. })
        ));
        assert!(matches!(
            Message::decode(""),
            Err(ProtocolError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn test_decode_missing_field() {
        let payload = "type:3/moves:2/action:1/pkind:Swordsman/pside:2/prow:9/pcol:0/torow:8";
        match Message::decode(payload) {
            Err(ProtocolError::MalformedMessage { reason }) => assert!(reason.contains("toloc")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            Message::decode("type:2"),
            Err(ProtocolError::MalformedMessage { .. })
        ));
    }

    #[test]
    fn test_decode_invalid_values() {
        for payload in [
            "type:1/pid:3",
            "type:1/pid:-1",
            "type:2/variant:0",
            "type:2/variant:5",
            "type:3/moves:0/action:3/pkind:Mage/pside:1/prow:0/pcol:0/torow:1/tocol:0",
            "type:3/moves:0/action:1/pkind:King/pside:1/prow:0/pcol:0/torow:1/tocol:0",
            "type:3/moves:0/action:1/pkind:Mage/pside:0/prow:0/pcol:0/torow:1/tocol:0",
            "type:3/moves:0/action:1/pkind:Mage/pside:1/prow:a/pcol:0/torow:1/tocol:0",
            "type:3/moves:0/action:1/pkind:Mage/pside:1/prow:0/pcol",
        ] {
            assert!(
                matches!(
                    Message::decode(payload),
                    Err(ProtocolError::MalformedMessage { .. })
                ),
                "{payload}"
            );
        }
    }

    #[test]
    fn test_frame_parse() {
        let frame = Frame::parse("2 type:1/pid:2\n").unwrap();
        assert_eq!(frame, Frame::new(2, "type:1/pid:2"));
        assert_eq!(frame.message().unwrap(), Message::PlayerIn { pid: 2 });
        assert_eq!(frame.to_line(), "2 type:1/pid:2");

        // 握手帧
        assert_eq!(Frame::parse("1 ").unwrap(), Frame::new(1, ""));
        assert_eq!(Frame::parse("1").unwrap(), Frame::new(1, ""));
        assert_eq!(Frame::new(1, "").to_line(), "1 ");

        assert!(Frame::parse("x type:1/pid:1").is_err());
        assert!(Frame::parse("").is_err());
    }
}
