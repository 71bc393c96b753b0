//! 走法表
//!
//! 所有偏移量以蓝方（下方）为准，前进方向为 row - 1；红方统一取反。

use crate::piece::{Location, PieceKind, Side};

const fn at(row: i32, col: i32) -> Location {
    Location::new(row, col)
}

/// 剑士：前、前斜
const SWORDSMAN: &[Location] = &[at(-1, 0), at(-1, -1), at(-1, 1)];

/// 长剑士：后、后斜、前、前两格
const LONGSWORD: &[Location] = &[at(1, 0), at(1, -1), at(1, 1), at(-1, 0), at(-2, 0)];

/// 法师：前、前斜、后、后斜、前两格、前斜两格
const MAGE: &[Location] = &[
    at(-1, 0),
    at(-1, -1),
    at(-1, 1),
    at(1, 0),
    at(1, -1),
    at(1, 1),
    at(-2, 0),
    at(-2, -2),
    at(-2, 2),
];

/// 弓手：后、后斜、前三格、前四格
const ARCHER: &[Location] = &[at(1, 0), at(1, -1), at(1, 1), at(-3, 0), at(-4, 0)];

/// 卫兵：周围八格
const GUARD: &[Location] = &[
    at(-1, 0),
    at(-1, -1),
    at(-1, 1),
    at(1, 0),
    at(1, -1),
    at(1, 1),
    at(0, -1),
    at(0, 1),
];

/// 水晶：前后左右
const CRYSTAL: &[Location] = &[at(-1, 0), at(1, 0), at(0, -1), at(0, 1)];

/// 获取棋子类型的走法偏移（蓝方视角）
pub fn offsets(kind: PieceKind) -> &'static [Location] {
    match kind {
        PieceKind::Swordsman => SWORDSMAN,
        PieceKind::Longsword => LONGSWORD,
        PieceKind::Mage => MAGE,
        PieceKind::Archer => ARCHER,
        PieceKind::Guard => GUARD,
        PieceKind::Crystal => CRYSTAL,
    }
}

/// 按阵营修正方向后的走法偏移
pub fn oriented_offsets(kind: PieceKind, side: Side) -> impl Iterator<Item = Location> {
    offsets(kind)
        .iter()
        .map(move |&delta| if side.is_mirrored() { -delta } else { delta })
}
