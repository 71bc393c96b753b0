//! 规则引擎
//!
//! 对局状态只由一个执行者修改，因此这里不做任何加锁。
//!
//! 回合切换有两个检查点：
//! - [`RuleEngine::apply_action`] 开头的前置检查（`moves_made >= max_moves` 时先换手）；
//! - [`RuleEngine::perform_action`] 在动作完成后的后置检查。
//!
//! 以后置检查为准：经由 `perform_action` 时每次换手只触发后置检查，
//! 前置检查只在状态从外部带入满额计数时（例如网络同步的 `moves`）才会触发。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GameError;
use crate::piece::{Location, Piece, PieceKind, Side};
use crate::state::{GameState, Verdict};

/// 动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// 移动棋盘上的棋子（可吃子）
    Move,
    /// 从储备中落子
    Drop,
}

impl Action {
    /// 消息中使用的编号
    pub fn code(&self) -> u8 {
        match self {
            Action::Move => 1,
            Action::Drop => 2,
        }
    }

    /// 从消息编号解析
    pub fn from_code(code: u8) -> Option<Action> {
        match code {
            1 => Some(Action::Move),
            2 => Some(Action::Drop),
            _ => None,
        }
    }
}

/// 规则引擎
pub struct RuleEngine;

impl RuleEngine {
    /// 执行动作并推进回合、重新判定胜负
    ///
    /// 返回被吃掉的棋子（如果有）。
    pub fn perform_action(
        state: &mut GameState,
        action: Action,
        piece: Piece,
        to: Location,
    ) -> Result<Option<Piece>, GameError> {
        let captured = Self::apply_action(state, action, piece, to)?;
        if state.moves_made >= state.max_moves {
            Self::next_turn(state);
        }
        state.verdict = Self::evaluate_verdict(&state.board);
        Ok(captured)
    }

    /// 执行单个动作（不判定胜负）
    ///
    /// `piece` 只用于定位：移动时取棋盘上 `piece.location` 处的棋子，
    /// 落子时按 `piece.kind` 从当前行动方的储备中取出。
    ///
    /// 失败时状态不变（包括前置检查已切换的行动方和计数）。
    pub fn apply_action(
        state: &mut GameState,
        action: Action,
        piece: Piece,
        to: Location,
    ) -> Result<Option<Piece>, GameError> {
        let turn = (state.current_player, state.moves_made);
        if state.moves_made >= state.max_moves {
            Self::next_turn(state);
        }

        let acting = state.current_player;
        let result = match action {
            Action::Move => Self::apply_move(state, acting, piece.location, to),
            Action::Drop => Self::apply_drop(state, acting, piece.kind, to).map(|()| None),
        };

        match result {
            Ok(captured) => {
                state.moves_made += 1;
                Ok(captured)
            }
            Err(e) => {
                (state.current_player, state.moves_made) = turn;
                Err(e)
            }
        }
    }

    fn apply_move(
        state: &mut GameState,
        acting: Side,
        from: Location,
        to: Location,
    ) -> Result<Option<Piece>, GameError> {
        let mover = state.board.get(from).ok_or(GameError::NoPiece(from))?;
        let tile = state.board.tile(to).ok_or(GameError::InvalidLocation(to))?;
        if !tile.walkable {
            return Err(GameError::ImpassableTerrain(to));
        }

        let target = tile.occupant;
        if from == to || target.is_some_and(|t| t.kind == PieceKind::Crystal) {
            return Err(GameError::IllegalMove { from, to });
        }

        // 以下操作的前置条件均已检查
        if let Some(captured) = state.board.remove(to)? {
            state
                .player_mut(acting)
                .capture(captured)
                .map_err(|_| GameError::IllegalMove { from, to })?;
        }
        state.board.remove(from)?;
        state.board.place(mover, to)?;

        Ok(target)
    }

    fn apply_drop(
        state: &mut GameState,
        acting: Side,
        kind: PieceKind,
        to: Location,
    ) -> Result<(), GameError> {
        state.board.check_vacant(to)?;
        let reserved = state.player_mut(acting).take(kind)?;
        state.board.place(reserved, to)
    }

    /// 换手
    pub fn next_turn(state: &mut GameState) {
        state.current_player = state.current_player.opponent();
        state.moves_made = 0;
    }

    /// 根据双方水晶的机动性判定胜负
    pub fn evaluate_verdict(board: &Board) -> Verdict {
        let can_move = |side: Side| {
            board
                .crystals(side)
                .iter()
                .any(|crystal| !board.legal_moves(crystal).is_empty())
        };

        match (can_move(Side::Blue), can_move(Side::Red)) {
            (false, false) => Verdict::Draw,
            (false, true) => Verdict::RedWinner,
            (true, false) => Verdict::BlueWinner,
            (true, true) => Verdict::Continue,
        }
    }

    /// 校验本地发起的动作
    ///
    /// 只用于本地意图；对手发来的动作按协议约定直接信任。
    pub fn validate_action(
        state: &GameState,
        side: Side,
        action: Action,
        piece: Piece,
        to: Location,
    ) -> Result<(), GameError> {
        if state.is_over() {
            return Err(GameError::GameOver);
        }
        if state.current_player != side {
            return Err(GameError::NotYourTurn);
        }

        let board = &state.board;
        match action {
            Action::Move => {
                let from = piece.location;
                let mover = board.get(from).ok_or(GameError::NoPiece(from))?;
                if mover.side != side || !board.legal_moves(&mover).contains(&to) {
                    return Err(GameError::IllegalMove { from, to });
                }
            }
            Action::Drop => {
                if state.player(side).count(piece.kind) == 0 {
                    return Err(GameError::EmptyReserve { kind: piece.kind });
                }
                board.check_vacant(to)?;
                if !board.legal_drop_squares().contains(&to) {
                    return Err(GameError::IllegalMove {
                        from: piece.location,
                        to,
                    });
                }
            }
        }

        Ok(())
    }
}
