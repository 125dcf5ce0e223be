use core::fmt;
use std::num::NonZeroU32;

use crate::board::board::Board;
use crate::types::bitboard::Bitboard;
use crate::types::pieces::{Piece, PieceName};
use crate::types::square::Square;

/// Cardinal directions from the point of view of the white side
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(i8)]
pub enum Direction {
    North = 8,
    NorthWest = 7,
    West = -1,
    SouthWest = -9,
    South = -8,
    SouthEast = -7,
    East = 1,
    NorthEast = 9,
}

impl Direction {
    /// Returns the opposite direction of the given direction
    pub const fn opp(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::NorthWest => Self::SouthEast,
            Self::West => Self::East,
            Self::SouthWest => Self::NorthEast,
            Self::South => Self::North,
            Self::SouthEast => Self::NorthWest,
            Self::East => Self::West,
            Self::NorthEast => Self::SouthWest,
        }
    }

    pub const fn file_delta(self) -> i8 {
        match self {
            Self::East | Self::NorthEast | Self::SouthEast => 1,
            Self::West | Self::NorthWest | Self::SouthWest => -1,
            Self::North | Self::South => 0,
        }
    }

    pub const fn rank_delta(self) -> i8 {
        match self {
            Self::North | Self::NorthEast | Self::NorthWest => 1,
            Self::South | Self::SouthEast | Self::SouthWest => -1,
            Self::East | Self::West => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MoveType {
    Normal = 0,

    QueenPromotion = 1,
    RookPromotion = 2,
    BishopPromotion = 3,
    KnightPromotion = 4,

    DoublePush = 5,

    CastleMove = 6,

    EnPassant = 7,
}

impl MoveType {
    const fn from_bits(bits: u32) -> Option<Self> {
        Some(match bits {
            0 => Self::Normal,
            1 => Self::QueenPromotion,
            2 => Self::RookPromotion,
            3 => Self::BishopPromotion,
            4 => Self::KnightPromotion,
            5 => Self::DoublePush,
            6 => Self::CastleMove,
            7 => Self::EnPassant,
            _ => return None,
        })
    }
}

const _: () = assert!(std::mem::size_of::<Move>() == std::mem::size_of::<Option<Move>>());

/// A move fits in 16 bits, and only those bits travel through the transposition table. The upper
/// bits carry the moving piece, which move ordering wants without a board lookup.
///
/// bit  0-5: origin square
/// bit  6-11: destination square
/// bit 12-15: move flag (normal, promotions, double push, castle, en passant)
/// bit 16-19: moving piece id
/// bit 20: always set, so that a move is never all zeroes
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Move(NonZeroU32);

const TAG: u32 = 1 << 20;

impl Move {
    pub fn new(from: Square, to: Square, flag: MoveType, piece: Piece) -> Self {
        let bits = from.0 as u32
            | (to.0 as u32) << 6
            | (flag as u32) << 12
            | (piece as u32) << 16
            | TAG;
        Self(NonZeroU32::new(bits).expect("tag bit is always set"))
    }

    pub const fn from(self) -> Square {
        Square((self.0.get() & 0b11_1111) as u8)
    }

    pub const fn to(self) -> Square {
        Square((self.0.get() >> 6 & 0b11_1111) as u8)
    }

    pub fn flag(self) -> MoveType {
        MoveType::from_bits(self.0.get() >> 12 & 0b1111).expect("move flags are 3 bits")
    }

    pub fn piece_moving(self) -> Piece {
        Piece::from((self.0.get() >> 16 & 0b1111) as usize)
    }

    pub fn is_castle(self) -> bool {
        self.flag() == MoveType::CastleMove
    }

    pub fn is_en_passant(self) -> bool {
        self.flag() == MoveType::EnPassant
    }

    pub fn promotion(self) -> Option<PieceName> {
        match self.flag() {
            MoveType::QueenPromotion => Some(PieceName::Queen),
            MoveType::RookPromotion => Some(PieceName::Rook),
            MoveType::BishopPromotion => Some(PieceName::Bishop),
            MoveType::KnightPromotion => Some(PieceName::Knight),
            _ => None,
        }
    }

    pub fn is_capture(self, board: &Board) -> bool {
        self.is_en_passant() || board.occupancies().occupied(self.to())
    }

    pub fn is_tactical(self, board: &Board) -> bool {
        self.promotion().is_some() || self.is_capture(board)
    }

    pub fn is_quiet(self, board: &Board) -> bool {
        !self.is_tactical(board)
    }

    /// Compact encoding for transposition table storage
    pub const fn as_u16(self) -> u16 {
        self.0.get() as u16
    }

    /// Rehydrates a 16 bit table move against the current board. Returns None when the stored
    /// bits cannot describe a move of the side to move, which happens after index collisions
    /// and torn table writes.
    pub fn from_u16(bits: u16, board: &Board) -> Option<Self> {
        let bits = bits as u32;
        let from = Square((bits & 0b11_1111) as u8);
        let to = Square((bits >> 6 & 0b11_1111) as u8);
        let flag = MoveType::from_bits(bits >> 12 & 0b1111)?;
        let piece = board.piece_at(from)?;
        if piece.color() != board.stm {
            return None;
        }
        Some(Self::new(from, to, flag, piece))
    }

    pub fn castle_type(self) -> Castle {
        debug_assert!(self.is_castle());
        match self.to() {
            Square::G1 => Castle::WhiteKing,
            Square::C1 => Castle::WhiteQueen,
            Square::G8 => Castle::BlackKing,
            Square::C8 => Castle::BlackQueen,
            _ => unreachable!(),
        }
    }

    /// Parses a move in long algebraic notation against the current board, as handed over by the
    /// GUI in `position` commands.
    pub fn from_uci(str: &str, board: &Board) -> Option<Self> {
        let bytes = str.as_bytes();
        if bytes.len() < 4 {
            return None;
        }
        let file_of = |b: u8| b.checked_sub(b'a').filter(|f| *f < 8);
        let rank_of = |b: u8| b.checked_sub(b'1').filter(|r| *r < 8);
        let from = Square(rank_of(bytes[1])? * 8 + file_of(bytes[0])?);
        let to = Square(rank_of(bytes[3])? * 8 + file_of(bytes[2])?);

        let piece = board.piece_at(from)?;
        let flag = if let Some(p) = bytes.get(4) {
            match *p {
                b'q' => MoveType::QueenPromotion,
                b'r' => MoveType::RookPromotion,
                b'b' => MoveType::BishopPromotion,
                b'n' => MoveType::KnightPromotion,
                _ => return None,
            }
        } else if piece.name() == PieceName::King && from.dist(to) == 2 {
            MoveType::CastleMove
        } else if piece.name() == PieceName::Pawn && from.dist(to) == 2 && from.file() == to.file() {
            MoveType::DoublePush
        } else if piece.name() == PieceName::Pawn
            && from.file() != to.file()
            && board.piece_at(to).is_none()
        {
            MoveType::EnPassant
        } else {
            MoveType::Normal
        };
        Some(Self::new(from, to, flag, piece))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.from(), self.to())?;
        if let Some(p) = self.promotion() {
            let c = match p {
                PieceName::Queen => 'q',
                PieceName::Rook => 'r',
                PieceName::Bishop => 'b',
                PieceName::Knight => 'n',
                _ => unreachable!(),
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Castle {
    WhiteKing = 1,
    WhiteQueen = 2,
    BlackKing = 4,
    BlackQueen = 8,
}

impl Castle {
    /// These squares may not be under attack for a castle to be valid
    pub(crate) const fn check_squares(self) -> Bitboard {
        match self {
            Self::WhiteKing => Bitboard(0x70),
            Self::WhiteQueen => Bitboard(0x1C),
            Self::BlackKing => Bitboard(0x7000_0000_0000_0000),
            Self::BlackQueen => Bitboard(0x1C00_0000_0000_0000),
        }
    }

    /// These squares must be unoccupied for a castle to be valid
    pub(crate) const fn empty_squares(self) -> Bitboard {
        match self {
            Self::WhiteKing => Bitboard(0x60),
            Self::WhiteQueen => Bitboard(0xE),
            Self::BlackKing => Bitboard(0x6000_0000_0000_0000),
            Self::BlackQueen => Bitboard(0xE00_0000_0000_0000),
        }
    }

    pub(crate) const fn rook_to(self) -> Square {
        match self {
            Self::WhiteKing => Square::F1,
            Self::WhiteQueen => Square::D1,
            Self::BlackKing => Square::F8,
            Self::BlackQueen => Square::D8,
        }
    }

    pub(crate) const fn rook_from(self) -> Square {
        match self {
            Self::WhiteKing => Square::H1,
            Self::WhiteQueen => Square::A1,
            Self::BlackKing => Square::H8,
            Self::BlackQueen => Square::A8,
        }
    }
}

/// Mask of castling rights that survive a move touching each square
#[rustfmt::skip]
pub const CASTLING_RIGHTS: [u8; 64] = [
    13, 15, 15, 15, 12, 15, 15, 14,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    15, 15, 15, 15, 15, 15, 15, 15,
    7,  15, 15, 15,  3, 15, 15, 11,
];

#[cfg(test)]
mod move_tests {
    use super::*;

    #[test]
    fn field_extraction() {
        let m = Move::new(Square(10), Square(20), MoveType::Normal, Piece::WhiteKnight);
        assert_eq!(m.from(), Square(10));
        assert_eq!(m.to(), Square(20));
        assert_eq!(m.piece_moving(), Piece::WhiteKnight);
        assert!(!m.is_castle());
        assert!(!m.is_en_passant());
        assert_eq!(m.promotion(), None);

        let m = Move::new(Square(52), Square(60), MoveType::QueenPromotion, Piece::WhitePawn);
        assert_eq!(m.promotion(), Some(PieceName::Queen));
        assert_eq!(m.to_string(), "e7e8q");
    }

    #[test]
    fn sixteen_bit_round_trip() {
        let m = Move::new(Square(4), Square(6), MoveType::CastleMove, Piece::WhiteKing);
        let board = crate::board::fen::build_board(crate::board::fen::STARTING_FEN);
        // The king is on e1 in the starting position, so the compact bits rehydrate
        let restored = Move::from_u16(m.as_u16(), &board).unwrap();
        assert_eq!(restored.from(), m.from());
        assert_eq!(restored.to(), m.to());
        assert_eq!(restored.flag(), m.flag());
    }
}
