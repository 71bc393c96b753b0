//! 玩家与储备

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::piece::{Piece, PieceKind, Side};

/// 玩家
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub side: Side,
    /// 已吃掉、可用于落子的棋子
    reserve: BTreeMap<PieceKind, Vec<Piece>>,
}

impl Player {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            reserve: PieceKind::RESERVABLE
                .into_iter()
                .map(|kind| (kind, Vec::new()))
                .collect(),
        }
    }

    /// 收入被吃掉的棋子，棋子改为己方阵营
    ///
    /// 水晶不能进入储备，返回起止点都是水晶所在格的 `IllegalMove`；
    /// 走子时 [`RuleEngine`](crate::RuleEngine) 会改报实际的起止点。
    pub fn capture(&mut self, piece: Piece) -> Result<(), GameError> {
        if piece.kind == PieceKind::Crystal {
            return Err(GameError::IllegalMove {
                from: piece.location,
                to: piece.location,
            });
        }
        self.reserve
            .entry(piece.kind)
            .or_default()
            .push(piece.with_side(self.side));
        Ok(())
    }

    /// 取出一枚储备棋子
    pub fn take(&mut self, kind: PieceKind) -> Result<Piece, GameError> {
        self.reserve
            .get_mut(&kind)
            .and_then(Vec::pop)
            .ok_or(GameError::EmptyReserve { kind })
    }

    /// 储备中某类棋子的数量
    pub fn count(&self, kind: PieceKind) -> usize {
        self.reserve.get(&kind).map_or(0, Vec::len)
    }

    /// 储备（按棋子类型）
    pub fn reserve(&self) -> &BTreeMap<PieceKind, Vec<Piece>> {
        &self.reserve
    }
}
