//! 棋子定义

use std::fmt;
use std::ops::{Add, Mul, Neg};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::movement;

/// 中继分配的玩家编号（1 或 2）
pub type PeerId = u8;

/// 棋子类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    /// 剑士
    Swordsman,
    /// 法师
    Mage,
    /// 弓手
    Archer,
    /// 卫兵
    Guard,
    /// 长剑士
    Longsword,
    /// 水晶（受保护，不可被吃）
    Crystal,
}

impl PieceKind {
    /// 所有棋子类型
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Swordsman,
        PieceKind::Mage,
        PieceKind::Archer,
        PieceKind::Guard,
        PieceKind::Longsword,
        PieceKind::Crystal,
    ];

    /// 可进入储备的棋子类型（水晶除外）
    pub const RESERVABLE: [PieceKind; 5] = [
        PieceKind::Swordsman,
        PieceKind::Mage,
        PieceKind::Archer,
        PieceKind::Guard,
        PieceKind::Longsword,
    ];

    /// 消息中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            PieceKind::Swordsman => "Swordsman",
            PieceKind::Mage => "Mage",
            PieceKind::Archer => "Archer",
            PieceKind::Guard => "Guard",
            PieceKind::Longsword => "Longsword",
            PieceKind::Crystal => "Crystal",
        }
    }

    /// 是否为受保护棋子（只能移动到空位，不能吃子）
    pub fn is_protected(&self) -> bool {
        matches!(self, PieceKind::Crystal)
    }

    /// 获取布局字符（蓝方大写，红方小写）
    pub fn to_layout_char(&self, side: Side) -> char {
        let c = match self {
            PieceKind::Swordsman => 's',
            PieceKind::Mage => 'm',
            PieceKind::Archer => 'a',
            PieceKind::Guard => 'g',
            PieceKind::Longsword => 'l',
            PieceKind::Crystal => 'c',
        };
        match side {
            Side::Blue => c.to_ascii_uppercase(),
            Side::Red => c,
        }
    }

    /// 从布局字符解析
    pub fn from_layout_char(c: char) -> Option<(PieceKind, Side)> {
        let side = if c.is_ascii_uppercase() {
            Side::Blue
        } else {
            Side::Red
        };
        let kind = match c.to_ascii_lowercase() {
            's' => PieceKind::Swordsman,
            'm' => PieceKind::Mage,
            'a' => PieceKind::Archer,
            'g' => PieceKind::Guard,
            'l' => PieceKind::Longsword,
            'c' => PieceKind::Crystal,
            _ => return None,
        };
        Some((kind, side))
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PieceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PieceKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown piece kind `{s}`"))
    }
}

/// 阵营
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// 红方（后手，在上方，走法镜像）
    Red,
    /// 蓝方（先手，在下方，走法表以蓝方为准）
    Blue,
}

impl Side {
    /// 获取对方阵营
    pub fn opponent(&self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }

    /// 走法是否需要镜像
    pub fn is_mirrored(&self) -> bool {
        matches!(self, Side::Red)
    }

    /// 消息中使用的编号
    pub fn code(&self) -> u8 {
        match self {
            Side::Red => 1,
            Side::Blue => 2,
        }
    }

    /// 从消息编号解析
    pub fn from_code(code: u8) -> Option<Side> {
        match code {
            1 => Some(Side::Red),
            2 => Some(Side::Blue),
            _ => None,
        }
    }

    /// 玩家 1 执蓝，玩家 2 执红
    pub fn from_peer_id(peer_id: PeerId) -> Option<Side> {
        match peer_id {
            1 => Some(Side::Blue),
            2 => Some(Side::Red),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Red => f.write_str("RED"),
            Side::Blue => f.write_str("BLUE"),
        }
    }
}

/// 棋盘坐标（也用作相对偏移量）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub row: i32,
    pub col: i32,
}

impl Location {
    /// 创建新位置
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// 获取偏移后的位置
    pub fn offset(&self, d_row: i32, d_col: i32) -> Location {
        Location::new(self.row + d_row, self.col + d_col)
    }
}

impl Add for Location {
    type Output = Location;

    fn add(self, rhs: Location) -> Location {
        self.offset(rhs.row, rhs.col)
    }
}

impl Neg for Location {
    type Output = Location;

    fn neg(self) -> Location {
        Location::new(-self.row, -self.col)
    }
}

impl Mul<i32> for Location {
    type Output = Location;

    fn mul(self, n: i32) -> Location {
        Location::new(self.row * n, self.col * n)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// 棋子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub kind: PieceKind,
    pub side: Side,
    pub location: Location,
    is_protected: bool,
}

impl Piece {
    /// 创建新棋子，受保护标记由棋子类型决定
    pub fn new(kind: PieceKind, side: Side, location: Location) -> Self {
        Self {
            kind,
            side,
            location,
            is_protected: kind.is_protected(),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    /// 移动到新位置后的棋子
    pub fn at(self, location: Location) -> Piece {
        Piece { location, ..self }
    }

    /// 归属另一方后的棋子
    pub fn with_side(self, side: Side) -> Piece {
        Piece { side, ..self }
    }

    /// 按走法表计算候选目标位置（未考虑棋盘约束）
    pub fn candidate_destinations(&self) -> Vec<Location> {
        movement::oriented_offsets(self.kind, self.side)
            .map(|delta| self.location + delta)
            .collect()
    }

    /// 目标位置是否在走法表覆盖范围内
    pub fn can_reach(&self, to: Location) -> bool {
        self.candidate_destinations().contains(&to)
    }

    /// 获取布局字符
    pub fn layout_char(&self) -> char {
        self.kind.to_layout_char(self.side)
    }
}
