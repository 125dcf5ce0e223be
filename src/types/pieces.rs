use core::ops::{self, Index, IndexMut};
use strum_macros::EnumIter;

use crate::impl_index;

impl_index!(Color);
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
pub enum Color {
    White,
    Black,
}

#[macro_export]
macro_rules! impl_index {
    ($enum_name:ident) => {
        impl<T, const N: usize> Index<$enum_name> for [T; N] {
            type Output = T;

            fn index(&self, index: $enum_name) -> &Self::Output {
                &self[index as usize]
            }
        }

        impl<T, const N: usize> IndexMut<$enum_name> for [T; N] {
            fn index_mut(&mut self, index: $enum_name) -> &mut Self::Output {
                &mut self[index as usize]
            }
        }
    };
}

impl Color {
    pub const fn idx(self) -> usize {
        self as usize
    }
}

impl ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self::Output {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl From<usize> for Color {
    fn from(value: usize) -> Self {
        match value {
            0 => Self::White,
            1 => Self::Black,
            _ => panic!("Invalid color index"),
        }
    }
}

pub const NUM_PIECES: usize = 6;

impl_index!(PieceName);
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, EnumIter)]
#[repr(u8)]
pub enum PieceName {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceName {
    /// Material worth used by exchange evaluation and pruning margins
    pub const fn value(self) -> i32 {
        match self {
            Self::Pawn => 100,
            Self::Knight => 313,
            Self::Bishop => 310,
            Self::Rook => 514,
            Self::Queen => 1002,
            Self::King => 0,
        }
    }

    pub const fn idx(self) -> usize {
        self as usize
    }
}

impl From<usize> for PieceName {
    fn from(value: usize) -> Self {
        match value {
            0 => Self::Pawn,
            1 => Self::Knight,
            2 => Self::Bishop,
            3 => Self::Rook,
            4 => Self::Queen,
            5 => Self::King,
            _ => panic!("Invalid piece index"),
        }
    }
}

impl_index!(Piece);
#[derive(Eq, Copy, Clone, PartialEq, Debug, EnumIter)]
#[repr(u8)]
pub enum Piece {
    WhitePawn,
    BlackPawn,

    WhiteKnight,
    BlackKnight,

    WhiteBishop,
    BlackBishop,

    WhiteRook,
    BlackRook,

    WhiteQueen,
    BlackQueen,

    WhiteKing,
    BlackKing,
}

impl Piece {
    pub fn new(name: PieceName, color: Color) -> Self {
        Self::from((name.idx() << 1) | color.idx())
    }

    pub fn name(self) -> PieceName {
        PieceName::from(self as usize >> 1)
    }

    pub const fn color(self) -> Color {
        match self as usize & 1 {
            0 => Color::White,
            _ => Color::Black,
        }
    }

    pub fn value(self) -> i32 {
        self.name().value()
    }

    pub const fn idx(self) -> usize {
        self as usize
    }

    pub fn char(self) -> char {
        let c = match self.name() {
            PieceName::Pawn => 'P',
            PieceName::Knight => 'N',
            PieceName::Bishop => 'B',
            PieceName::Rook => 'R',
            PieceName::Queen => 'Q',
            PieceName::King => 'K',
        };
        if self.color() == Color::Black {
            c.to_ascii_lowercase()
        } else {
            c
        }
    }
}

impl From<usize> for Piece {
    fn from(value: usize) -> Self {
        match value {
            0 => Self::WhitePawn,
            1 => Self::BlackPawn,
            2 => Self::WhiteKnight,
            3 => Self::BlackKnight,
            4 => Self::WhiteBishop,
            5 => Self::BlackBishop,
            6 => Self::WhiteRook,
            7 => Self::BlackRook,
            8 => Self::WhiteQueen,
            9 => Self::BlackQueen,
            10 => Self::WhiteKing,
            11 => Self::BlackKing,
            _ => panic!("Invalid piece id"),
        }
    }
}

#[cfg(test)]
mod piece_tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn construction_round_trips() {
        for color in Color::iter() {
            for name in PieceName::iter() {
                let piece = Piece::new(name, color);
                assert_eq!(piece.name(), name);
                assert_eq!(piece.color(), color);
            }
        }
    }

    #[test]
    fn id_round_trips() {
        for piece in Piece::iter() {
            assert_eq!(Piece::from(piece.idx()), piece);
        }
    }

    #[test]
    fn characters() {
        assert_eq!(Piece::WhiteKnight.char(), 'N');
        assert_eq!(Piece::BlackQueen.char(), 'q');
    }
}
