use crate::board::board::Board;
use crate::moves::attack_boards::{king_attacks, knight_attacks, RANKS};
use crate::moves::magics::{bishop_attacks, queen_attacks, rook_attacks};
use crate::moves::movelist::MoveList;
use crate::moves::moves::{Castle, Direction, Move, MoveType};
use crate::types::pieces::{Color, Piece, PieceName};
use crate::types::square::Square;

#[allow(clippy::upper_case_acronyms)]
pub type MGT = MoveGenerationType;
#[derive(Copy, Clone, PartialEq)]
pub enum MoveGenerationType {
    /// Captures, en passant and queen promotions
    CapturesOnly,
    QuietsOnly,
    All,
}

impl Board {
    /// Generates pseudolegal moves. Legality is established by `make_move`, which rejects moves
    /// leaving the king in check.
    pub fn generate_moves(&self, gen_type: MGT) -> MoveList {
        let mut moves = MoveList::default();

        self.generate_piece_moves(PieceName::Knight, gen_type, &mut moves);
        self.generate_piece_moves(PieceName::Bishop, gen_type, &mut moves);
        self.generate_piece_moves(PieceName::Rook, gen_type, &mut moves);
        self.generate_piece_moves(PieceName::Queen, gen_type, &mut moves);
        self.generate_piece_moves(PieceName::King, gen_type, &mut moves);
        self.generate_pawn_moves(gen_type, &mut moves);
        if matches!(gen_type, MGT::All | MGT::QuietsOnly) {
            self.generate_castling_moves(&mut moves);
        }
        moves
    }

    fn generate_castling_moves(&self, moves: &mut MoveList) {
        if self.in_check() {
            return;
        }
        let (king, kingside, queenside) = match self.stm {
            Color::White => (
                Piece::WhiteKing,
                (Castle::WhiteKing, Square::E1, Square::G1),
                (Castle::WhiteQueen, Square::E1, Square::C1),
            ),
            Color::Black => (
                Piece::BlackKing,
                (Castle::BlackKing, Square::E8, Square::G8),
                (Castle::BlackQueen, Square::E8, Square::C8),
            ),
        };
        for (castle, from, to) in [kingside, queenside] {
            if self.can_castle(castle)
                && (self.occupancies() & castle.empty_squares()).is_empty()
                && castle.check_squares().all(|sq| !self.square_under_attack(!self.stm, sq))
                && self.bitboard(self.stm, PieceName::Rook).occupied(castle.rook_from())
            {
                moves.push(Move::new(from, to, MoveType::CastleMove, king));
            }
        }
    }

    fn generate_pawn_moves(&self, gen_type: MGT, moves: &mut MoveList) {
        let piece = Piece::new(PieceName::Pawn, self.stm);
        let pawns = self.bitboard(self.stm, PieceName::Pawn);
        let vacancies = !self.occupancies();
        let enemies = self.color(!self.stm);

        let seventh_rank = match self.stm {
            Color::White => RANKS[6],
            Color::Black => RANKS[1],
        };
        let non_promotions = pawns & !seventh_rank;
        let promotions = pawns & seventh_rank;

        let up = match self.stm {
            Color::White => Direction::North,
            Color::Black => Direction::South,
        };
        let up_left = match self.stm {
            Color::White => Direction::NorthWest,
            Color::Black => Direction::SouthEast,
        };
        let up_right = match self.stm {
            Color::White => Direction::NorthEast,
            Color::Black => Direction::SouthWest,
        };
        let third_rank = match self.stm {
            Color::White => RANKS[2],
            Color::Black => RANKS[5],
        };

        if matches!(gen_type, MGT::All | MGT::QuietsOnly) {
            // Single and double pushes, no captures
            let push_one = vacancies & non_promotions.shift(up);
            let push_two = vacancies & (push_one & third_rank).shift(up);
            for to in push_one {
                moves.push(Move::new(to.shift(up.opp()), to, MoveType::Normal, piece));
            }
            for to in push_two {
                moves.push(Move::new(to.shift(up.opp()).shift(up.opp()), to, MoveType::DoublePush, piece));
            }
        }

        // Queen promotions are tactical, underpromotions ride along with the quiet stage
        if !promotions.is_empty() {
            let push_promos = promotions.shift(up) & vacancies;
            let left_promos = promotions.shift(up_left) & enemies;
            let right_promos = promotions.shift(up_right) & enemies;
            for to in push_promos {
                push_promotions(gen_type, piece, to.shift(up.opp()), to, moves);
            }
            for to in left_promos {
                push_promotions(gen_type, piece, to.shift(up_left.opp()), to, moves);
            }
            for to in right_promos {
                push_promotions(gen_type, piece, to.shift(up_right.opp()), to, moves);
            }
        }

        if matches!(gen_type, MGT::All | MGT::CapturesOnly) {
            let left_captures = non_promotions.shift(up_left) & enemies;
            let right_captures = non_promotions.shift(up_right) & enemies;
            for to in left_captures {
                moves.push(Move::new(to.shift(up_left.opp()), to, MoveType::Normal, piece));
            }
            for to in right_captures {
                moves.push(Move::new(to.shift(up_right.opp()), to, MoveType::Normal, piece));
            }

            if let Some(ep) = self.en_passant_square {
                for dir in [up_left.opp(), up_right.opp()] {
                    if let Some(from) = ep.checked_shift(dir) {
                        if pawns.occupied(from) {
                            moves.push(Move::new(from, ep, MoveType::EnPassant, piece));
                        }
                    }
                }
            }
        }
    }

    fn generate_piece_moves(&self, name: PieceName, gen_type: MGT, moves: &mut MoveList) {
        let piece = Piece::new(name, self.stm);
        let occupied = self.occupancies();
        for from in self.bitboard(self.stm, name) {
            let attacks = match name {
                PieceName::King => king_attacks(from),
                PieceName::Knight => knight_attacks(from),
                PieceName::Bishop => bishop_attacks(from, occupied),
                PieceName::Rook => rook_attacks(from, occupied),
                PieceName::Queen => queen_attacks(from, occupied),
                PieceName::Pawn => unreachable!(),
            };
            let targets = match gen_type {
                MGT::CapturesOnly => attacks & self.color(!self.stm),
                MGT::QuietsOnly => attacks & !occupied,
                MGT::All => attacks & !self.color(self.stm),
            };
            for to in targets {
                moves.push(Move::new(from, to, MoveType::Normal, piece));
            }
        }
    }
}

fn push_promotions(gen_type: MGT, piece: Piece, from: Square, to: Square, moves: &mut MoveList) {
    if matches!(gen_type, MGT::All | MGT::CapturesOnly) {
        moves.push(Move::new(from, to, MoveType::QueenPromotion, piece));
    }
    if matches!(gen_type, MGT::All | MGT::QuietsOnly) {
        moves.push(Move::new(from, to, MoveType::RookPromotion, piece));
        moves.push(Move::new(from, to, MoveType::BishopPromotion, piece));
        moves.push(Move::new(from, to, MoveType::KnightPromotion, piece));
    }
}

#[cfg(test)]
mod movegen_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};

    #[test]
    fn startpos_move_counts() {
        let board = build_board(STARTING_FEN);
        assert_eq!(board.generate_moves(MGT::All).len(), 20);
        assert_eq!(board.generate_moves(MGT::CapturesOnly).len(), 0);
        assert_eq!(board.generate_moves(MGT::QuietsOnly).len(), 20);
    }

    #[test]
    fn staged_generation_partitions_all() {
        let board = build_board("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let all = board.generate_moves(MGT::All).len();
        let captures = board.generate_moves(MGT::CapturesOnly).len();
        let quiets = board.generate_moves(MGT::QuietsOnly).len();
        assert_eq!(all, captures + quiets);
        assert_eq!(all, 48);
    }

    #[test]
    fn promotions_generate_all_four_pieces() {
        let board = build_board("3k4/3P1P2/3K4/8/8/8/8/8 w - - 0 1");
        let moves = board.generate_moves(MGT::All);
        let promos = moves.iter().filter(|e| e.m.promotion().is_some()).count();
        // The d-pawn is blocked by the enemy king, the f-pawn promotes freely
        assert_eq!(promos, 4);
    }
}
