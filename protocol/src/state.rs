//! 对局状态

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::constants::MAX_MOVES;
use crate::error::GameError;
use crate::piece::{PeerId, Side};
use crate::player::Player;
use crate::variant::{VariantId, DEFAULT_VARIANT};

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Continue,
    Draw,
    RedWinner,
    BlueWinner,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Continue => "CONTINUE",
            Verdict::Draw => "DRAW",
            Verdict::RedWinner => "RED_WINNER",
            Verdict::BlueWinner => "BLUE_WINNER",
        };
        f.write_str(s)
    }
}

/// 完整的对局状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub red_player: Player,
    pub blue_player: Player,
    /// 当前行动方
    pub current_player: Side,
    /// 本回合已执行的动作数
    pub moves_made: u32,
    pub max_moves: u32,
    pub verdict: Verdict,
    /// 中继分配的玩家编号
    pub network_id: Option<PeerId>,
    /// 对手是否已连接
    pub peer_connected: bool,
    /// 玩家 1 选定的变体（None 表示尚未选择）
    pub chosen_variant: Option<VariantId>,
}

impl GameState {
    /// 按变体创建新对局
    pub fn new(variant: VariantId) -> Result<Self, GameError> {
        Ok(Self::with_board(Board::from_variant(variant)?))
    }

    /// 从棋盘创建对局（蓝方先手）
    pub fn with_board(board: Board) -> Self {
        Self {
            board,
            red_player: Player::new(Side::Red),
            blue_player: Player::new(Side::Blue),
            current_player: Side::Blue,
            moves_made: 0,
            max_moves: MAX_MOVES,
            verdict: Verdict::Continue,
            network_id: None,
            peer_connected: false,
            chosen_variant: None,
        }
    }

    /// 以当前变体重新开局
    pub fn new_game(&self) -> Result<Self, GameError> {
        Self::new(self.board.variant())
    }

    pub fn player(&self, side: Side) -> &Player {
        match side {
            Side::Red => &self.red_player,
            Side::Blue => &self.blue_player,
        }
    }

    pub fn player_mut(&mut self, side: Side) -> &mut Player {
        match side {
            Side::Red => &mut self.red_player,
            Side::Blue => &mut self.blue_player,
        }
    }

    /// 本地玩家执哪一方
    pub fn local_side(&self) -> Option<Side> {
        self.network_id.and_then(Side::from_peer_id)
    }

    pub fn is_over(&self) -> bool {
        self.verdict != Verdict::Continue
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(DEFAULT_VARIANT).expect("默认变体必须存在")
    }
}
