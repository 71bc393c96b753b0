//! 棋盘变体注册表
//!
//! 每个变体是一条静态记录：尺寸、地形和初始布局。
//! 地形中 `#` 为不可通行格；布局每格一个字符，`.` 为空，
//! 棋子字符见 [`PieceKind::to_layout_char`](crate::PieceKind::to_layout_char)。

use crate::piece::{Location, PieceKind, Side};

/// 变体编号（1-4）
pub type VariantId = u8;

/// 默认对局使用的变体（Classic）
pub const DEFAULT_VARIANT: VariantId = 4;

/// 棋盘变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub id: VariantId,
    pub name: &'static str,
    pub rows: usize,
    pub cols: usize,
    pub terrain: &'static [&'static str],
    pub placement: &'static [&'static str],
}

impl Variant {
    /// 不可通行格
    pub fn impassable(&self) -> impl Iterator<Item = Location> + '_ {
        cells(self.terrain).filter_map(|(loc, c)| (c == '#').then_some(loc))
    }

    /// 初始棋子位置
    pub fn pieces(&self) -> impl Iterator<Item = (Location, PieceKind, Side)> + '_ {
        cells(self.placement).filter_map(|(loc, c)| {
            PieceKind::from_layout_char(c).map(|(kind, side)| (loc, kind, side))
        })
    }
}

fn cells(rows: &'static [&'static str]) -> impl Iterator<Item = (Location, char)> {
    rows.iter().enumerate().flat_map(|(r, row)| {
        row.chars()
            .enumerate()
            .map(move |(c, ch)| (Location::new(r as i32, c as i32), ch))
    })
}

/// 按编号查找变体
pub fn lookup(id: VariantId) -> Option<&'static Variant> {
    VARIANTS.iter().find(|v| v.id == id)
}

/// 所有变体
pub static VARIANTS: [Variant; 4] = [RUSH, WAR, PRIME, CLASSIC];

const RUSH: Variant = Variant {
    id: 1,
    name: "Rush",
    rows: 16,
    cols: 10,
    terrain: &[
        "..........",
        "..........",
        "..........",
        "..........",
        "###....###",
        "###....###",
        "..........",
        "..........",
        "..........",
        "..........",
        "###....###",
        "###....###",
        "..........",
        "..........",
        "..........",
        "..........",
    ],
    placement: &[
        "g........g",
        "..c.mm.c..",
        ".g.g..g.g.",
        "aaa....aaa",
        "..........",
        "...llll...",
        "ssssssssss",
        "..........",
        "..........",
        "SSSSSSSSSS",
        "...LLLL...",
        "..........",
        "AAA....AAA",
        ".G.G..G.G.",
        "..C.MM.C..",
        "G........G",
    ],
};

const WAR: Variant = Variant {
    id: 2,
    name: "War",
    rows: 19,
    cols: 13,
    terrain: &[
        ".....###.....",
        ".............",
        ".............",
        ".............",
        "#....###....#",
        "##....#....##",
        "#...........#",
        "...##.#.##...",
        "..#.#.#.#.#..",
        "#...........#",
        "..#.#.#.#.#..",
        "...##.#.##...",
        "#...........#",
        "##....#....##",
        "#....###....#",
        ".............",
        ".............",
        ".............",
        ".....###.....",
    ],
    placement: &[
        ".g.g.....g.g.",
        "g...........g",
        "g.c..g.g..c.g",
        "......a......",
        ".a.........a.",
        "..sam...mas..",
        ".ssslllllsss.",
        ".............",
        ".............",
        ".............",
        ".............",
        ".............",
        ".SSSLLLLLSSS.",
        "..SAM...MAS..",
        ".A.........A.",
        "......A......",
        "G.C..G.G..C.G",
        "G...........G",
        ".G.G.....G.G.",
    ],
};

const PRIME: Variant = Variant {
    id: 3,
    name: "Prime",
    rows: 16,
    cols: 21,
    terrain: &[
        ".....................",
        ".....................",
        ".....................",
        ".....................",
        "###....#######....###",
        "###....#######....###",
        ".....................",
        ".....................",
        ".....................",
        ".....................",
        "###....#######....###",
        "###....#######....###",
        ".....................",
        ".....................",
        ".....................",
        ".....................",
    ],
    placement: &[
        "g.g......g.g......g.g",
        ".c.g..g...c...g..g.c.",
        "....mm.........mm....",
        "aaa....aaaaaaa....aaa",
        ".....................",
        "...llll.......llll...",
        "sssssssssssssssssssss",
        ".....................",
        ".....................",
        "SSSSSSSSSSSSSSSSSSSSS",
        "...LLLL.......LLLL...",
        ".....................",
        "AAA....AAAAAAA....AAA",
        "....MM.........MM....",
        ".C.G..G...C...G..G.C.",
        "G.G......G.G......G.G",
    ],
};

const CLASSIC: Variant = Variant {
    id: 4,
    name: "Classic",
    rows: 17,
    cols: 13,
    terrain: &[
        "###.......###",
        "##.........##",
        "#...........#",
        ".....###.....",
        ".....###.....",
        ".#.#.###.#.#.",
        ".#.#..#...#..",
        ".............",
        ".#.#.#.#.#.#.",
        ".............",
        ".#.#..#...#..",
        ".#.#.###.#.#.",
        ".....###.....",
        ".....###.....",
        "#...........#",
        "##.........##",
        "###.......###",
    ],
    placement: &[
        "...g..g..g...",
        "..g.c...c.g..",
        "...g..g..g...",
        "l.l.l...smsms",
        "lalal...sssss",
        ".............",
        ".............",
        ".............",
        ".............",
        ".............",
        ".............",
        ".............",
        "LALAL...SSSSS",
        "L.L.L...SMSMS",
        "...G..G..G...",
        "..G.C...C.G..",
        "...G..G..G...",
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup(1).map(|v| v.name), Some("Rush"));
        assert_eq!(lookup(2).map(|v| v.name), Some("War"));
        assert_eq!(lookup(3).map(|v| v.name), Some("Prime"));
        assert_eq!(lookup(DEFAULT_VARIANT).map(|v| v.name), Some("Classic"));
        assert!(lookup(0).is_none());
        assert!(lookup(5).is_none());
    }

    #[test]
    fn test_layout_dimensions() {
        for variant in &VARIANTS {
            assert_eq!(variant.terrain.len(), variant.rows, "{}", variant.name);
            assert_eq!(variant.placement.len(), variant.rows, "{}", variant.name);
            for row in variant.terrain.iter().chain(variant.placement) {
                assert_eq!(row.chars().count(), variant.cols, "{}", variant.name);
            }
        }
    }

    #[test]
    fn test_no_piece_on_terrain() {
        for variant in &VARIANTS {
            let blocked: Vec<Location> = variant.impassable().collect();
            for (loc, _, _) in variant.pieces() {
                assert!(!blocked.contains(&loc), "{} {}", variant.name, loc);
            }
        }
    }

    #[test]
    fn test_layouts_are_mirrored() {
        // 红方布局是蓝方布局的上下翻转
        for variant in &VARIANTS {
            let pieces: Vec<_> = variant.pieces().collect();
            for &(loc, kind, side) in &pieces {
                let mirror = Location::new(variant.rows as i32 - 1 - loc.row, loc.col);
                assert!(
                    pieces.contains(&(mirror, kind, side.opponent())),
                    "{} {}",
                    variant.name,
                    loc
                );
            }
        }
    }

    #[test]
    fn test_crystal_counts() {
        let count = |v: &Variant, side: Side| {
            v.pieces()
                .filter(|&(_, kind, s)| kind == PieceKind::Crystal && s == side)
                .count()
        };
        for (id, expected) in [(1, 2), (2, 2), (3, 3), (4, 2)] {
            let variant = lookup(id).unwrap();
            assert_eq!(count(variant, Side::Blue), expected);
            assert_eq!(count(variant, Side::Red), expected);
        }
    }
}
