use lazy_static::lazy_static;
use strum::IntoEnumIterator;

use crate::board::board::Board;
use crate::moves::magics::Rng;
use crate::types::pieces::Piece;

/// Keys for incremental position hashing. The piece-square table feeds four running hashes: the
/// full position key, a pawn-structure key, a minor-piece key, and per-color non-pawn keys, which
/// the correction histories index by.
pub struct Zobrist {
    pub piece_square: [[u64; 64]; 12],
    pub turn: u64,
    pub castling: [u64; 16],
    pub en_passant_file: [u64; 8],
}

lazy_static! {
    pub static ref ZOBRIST: Zobrist = Zobrist::default();
}

impl Default for Zobrist {
    fn default() -> Self {
        let mut rng = Rng::default();
        let mut piece_square = [[0; 64]; 12];
        piece_square.iter_mut().flatten().for_each(|x| *x = rng.next_u64());
        let mut castling = [0; 16];
        castling.iter_mut().for_each(|x| *x = rng.next_u64());
        let mut en_passant_file = [0; 8];
        en_passant_file.iter_mut().for_each(|x| *x = rng.next_u64());
        Self { piece_square, turn: rng.next_u64(), castling, en_passant_file }
    }
}

impl Board {
    /// Recomputes the position hash from scratch. The board maintains it incrementally; this is
    /// the reference for debug assertions and tests.
    pub(crate) fn generate_hash(&self) -> u64 {
        let mut hash = 0;
        for piece in Piece::iter() {
            for sq in self.piece_bb(piece) {
                hash ^= ZOBRIST.piece_square[piece][sq];
            }
        }
        hash ^= ZOBRIST.castling[self.castling_rights as usize];
        if let Some(sq) = self.en_passant_square {
            hash ^= ZOBRIST.en_passant_file[sq.file() as usize];
        }
        if self.stm == crate::types::pieces::Color::Black {
            hash ^= ZOBRIST.turn;
        }
        hash
    }
}

#[cfg(test)]
mod zobrist_tests {
    use crate::board::fen::{build_board, STARTING_FEN};
    use crate::moves::movegenerator::MGT;

    #[test]
    fn incremental_hash_matches_scratch_hash() {
        let board = build_board(STARTING_FEN);
        assert_eq!(board.zobrist_hash, board.generate_hash());

        for entry in board.generate_moves(MGT::All).iter() {
            let mut next = board;
            if next.make_move(entry.m) {
                assert_eq!(next.zobrist_hash, next.generate_hash());
            }
        }
    }

    #[test]
    fn hash_differs_by_side_to_move() {
        let white = build_board("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        let black = build_board("4k3/8/8/8/8/8/4P3/4K3 b - - 0 1");
        assert_ne!(white.zobrist_hash, black.zobrist_hash);
    }
}
