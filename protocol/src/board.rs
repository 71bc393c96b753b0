//! 棋盘状态

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GameError;
use crate::piece::{Location, Piece, PieceKind, Side};
use crate::variant::{self, VariantId};

/// 棋盘格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub occupant: Option<Piece>,
    pub walkable: bool,
}

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    rows: usize,
    cols: usize,
    variant: VariantId,
    impassable: HashSet<Location>,
    /// rows x cols 棋盘，索引为 row * cols + col
    grid: Vec<Tile>,
    /// 红方在场水晶的位置
    red_crystals: Vec<Location>,
    /// 蓝方在场水晶的位置
    blue_crystals: Vec<Location>,
}

impl Board {
    /// 创建空棋盘
    pub fn new(
        rows: usize,
        cols: usize,
        impassable: impl IntoIterator<Item = Location>,
        variant: VariantId,
    ) -> Self {
        let mut board = Self {
            rows,
            cols,
            variant,
            impassable: HashSet::new(),
            grid: vec![
                Tile {
                    occupant: None,
                    walkable: true,
                };
                rows * cols
            ],
            red_crystals: Vec::new(),
            blue_crystals: Vec::new(),
        };

        for loc in impassable {
            if let Some(index) = board.index(loc) {
                board.grid[index].walkable = false;
                board.impassable.insert(loc);
            }
        }

        board
    }

    /// 按变体编号创建初始棋盘
    pub fn from_variant(id: VariantId) -> Result<Self, GameError> {
        let layout = variant::lookup(id).ok_or(GameError::UnknownVariant(id))?;
        let mut board = Self::new(layout.rows, layout.cols, layout.impassable(), layout.id);

        for (loc, kind, side) in layout.pieces() {
            board.place(Piece::new(kind, side, loc), loc)?;
        }

        Ok(board)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn variant(&self) -> VariantId {
        self.variant
    }

    /// 不可通行格
    pub fn impassable(&self) -> &HashSet<Location> {
        &self.impassable
    }

    fn index(&self, loc: Location) -> Option<usize> {
        self.is_in_bounds(loc)
            .then(|| loc.row as usize * self.cols + loc.col as usize)
    }

    /// 检查位置是否在棋盘内
    pub fn is_in_bounds(&self, loc: Location) -> bool {
        loc.row >= 0
            && (loc.row as usize) < self.rows
            && loc.col >= 0
            && (loc.col as usize) < self.cols
    }

    pub fn is_impassable(&self, loc: Location) -> bool {
        self.impassable.contains(&loc)
    }

    /// 获取指定位置的格子
    pub fn tile(&self, loc: Location) -> Option<&Tile> {
        self.index(loc).map(|index| &self.grid[index])
    }

    /// 获取指定位置的棋子
    pub fn get(&self, loc: Location) -> Option<Piece> {
        self.tile(loc).and_then(|tile| tile.occupant)
    }

    /// 检查位置能否放置棋子，返回与 [`Board::place`] 相同的错误
    pub fn check_vacant(&self, loc: Location) -> Result<(), GameError> {
        let tile = self.tile(loc).ok_or(GameError::InvalidLocation(loc))?;
        if self.is_impassable(loc) {
            return Err(GameError::ImpassableTerrain(loc));
        }
        if tile.occupant.is_some() {
            return Err(GameError::OccupiedDestination(loc));
        }
        Ok(())
    }

    /// 放置棋子
    ///
    /// 水晶若已被追踪（即从 `piece.location` 移来），只更新追踪位置。
    pub fn place(&mut self, piece: Piece, loc: Location) -> Result<(), GameError> {
        self.check_vacant(loc)?;

        if piece.kind == PieceKind::Crystal {
            let crystals = self.crystals_mut(piece.side);
            match crystals.iter_mut().find(|tracked| **tracked == piece.location) {
                Some(tracked) => *tracked = loc,
                None => crystals.push(loc),
            }
        }

        let index = self.index(loc).ok_or(GameError::InvalidLocation(loc))?;
        self.grid[index].occupant = Some(piece.at(loc));
        Ok(())
    }

    /// 移除指定位置的棋子，返回被移除的棋子
    pub fn remove(&mut self, loc: Location) -> Result<Option<Piece>, GameError> {
        let index = self.index(loc).ok_or(GameError::InvalidLocation(loc))?;
        let removed = self.grid[index].occupant.take();

        if let Some(piece) = removed.filter(|p| p.kind == PieceKind::Crystal) {
            self.crystals_mut(piece.side).retain(|tracked| *tracked != loc);
        }

        Ok(removed)
    }

    fn crystals_mut(&mut self, side: Side) -> &mut Vec<Location> {
        match side {
            Side::Red => &mut self.red_crystals,
            Side::Blue => &mut self.blue_crystals,
        }
    }

    /// 获取指定阵营在场的水晶
    pub fn crystals(&self, side: Side) -> Vec<Piece> {
        let tracked = match side {
            Side::Red => &self.red_crystals,
            Side::Blue => &self.blue_crystals,
        };
        tracked.iter().filter_map(|&loc| self.get(loc)).collect()
    }

    /// 获取指定阵营的所有棋子
    pub fn pieces(&self, side: Side) -> Vec<Piece> {
        self.grid
            .iter()
            .filter_map(|tile| tile.occupant)
            .filter(|piece| piece.side == side)
            .collect()
    }

    /// 检查走法是否合法
    pub fn is_legal_move(&self, piece: &Piece, to: Location) -> bool {
        let Some(tile) = self.tile(to) else {
            return false;
        };
        if !tile.walkable {
            return false;
        }

        match tile.occupant {
            // 受保护棋子只能移动到空位
            Some(_) if piece.is_protected() => false,
            // 不能吃己方棋子，水晶不可被吃
            Some(target) => target.side != piece.side && target.kind != PieceKind::Crystal,
            None => true,
        }
    }

    /// 过滤出棋子的所有合法目标位置
    pub fn legal_moves(&self, piece: &Piece) -> Vec<Location> {
        piece
            .candidate_destinations()
            .into_iter()
            .filter(|&to| self.is_legal_move(piece, to))
            .collect()
    }

    /// 获取所有合法的落子位置
    ///
    /// 任意水晶当前可走到的格子和不可通行格都不能落子。
    pub fn legal_drop_squares(&self) -> Vec<Location> {
        let mut restricted: HashSet<Location> = self.impassable.clone();
        for crystal in self
            .crystals(Side::Red)
            .into_iter()
            .chain(self.crystals(Side::Blue))
        {
            restricted.extend(self.legal_moves(&crystal));
        }

        let mut drops = Vec::new();
        for row in 0..self.rows as i32 {
            for col in 0..self.cols as i32 {
                let loc = Location::new(row, col);
                if self.get(loc).is_none() && !restricted.contains(&loc) {
                    drops.push(loc);
                }
            }
        }
        drops
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows as i32 {
            for col in 0..self.cols as i32 {
                let loc = Location::new(row, col);
                let c = match self.get(loc) {
                    Some(piece) => piece.layout_char(),
                    None if self.is_impassable(loc) => '#',
                    None => '.',
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
