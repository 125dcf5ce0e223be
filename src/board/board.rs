use core::fmt;

use crate::board::fen::STARTING_FEN;
use crate::board::zobrist::ZOBRIST;
use crate::moves::attack_boards::{king_attacks, knight_attacks, pawn_attacks, RANKS};
use crate::moves::magics::{bishop_attacks, queen_attacks, rook_attacks};
use crate::moves::moves::{Castle, Direction, Move, MoveType, CASTLING_RIGHTS};
use crate::types::bitboard::Bitboard;
use crate::types::pieces::{Color, Piece, PieceName, NUM_PIECES};
use crate::types::square::Square;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Board {
    bitboards: [Bitboard; NUM_PIECES],
    color_occupancies: [Bitboard; 2],
    mailbox: [Option<Piece>; 64],
    /// Side to move
    pub stm: Color,
    pub castling_rights: u8,
    pub en_passant_square: Option<Square>,
    /// Halfmove clock for the fifty move rule
    pub half_move_clock: u8,
    pub fullmove_number: u16,
    pub zobrist_hash: u64,
    pub pawn_hash: u64,
    pub minor_hash: u64,
    pub non_pawn_hash: [u64; 2],
    checkers: Bitboard,
}

impl Default for Board {
    fn default() -> Self {
        crate::board::fen::build_board(STARTING_FEN)
    }
}

impl Board {
    pub fn empty() -> Self {
        Self {
            bitboards: [Bitboard::EMPTY; NUM_PIECES],
            color_occupancies: [Bitboard::EMPTY; 2],
            mailbox: [None; 64],
            stm: Color::White,
            castling_rights: 0,
            en_passant_square: None,
            half_move_clock: 0,
            fullmove_number: 1,
            zobrist_hash: 0,
            pawn_hash: 0,
            minor_hash: 0,
            non_pawn_hash: [0; 2],
            checkers: Bitboard::EMPTY,
        }
    }

    pub fn piece(&self, name: PieceName) -> Bitboard {
        self.bitboards[name]
    }

    pub fn color(&self, color: Color) -> Bitboard {
        self.color_occupancies[color]
    }

    pub fn bitboard(&self, color: Color, name: PieceName) -> Bitboard {
        self.piece(name) & self.color(color)
    }

    pub fn piece_bb(&self, piece: Piece) -> Bitboard {
        self.bitboard(piece.color(), piece.name())
    }

    pub fn occupancies(&self) -> Bitboard {
        self.color(Color::White) | self.color(Color::Black)
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.mailbox[sq]
    }

    pub fn king_square(&self, color: Color) -> Square {
        self.bitboard(color, PieceName::King).lsb()
    }

    pub fn rule50_count(&self) -> u8 {
        self.half_move_clock
    }

    pub(crate) fn diags(&self, side: Color) -> Bitboard {
        self.bitboard(side, PieceName::Bishop) | self.bitboard(side, PieceName::Queen)
    }

    pub(crate) fn orthos(&self, side: Color) -> Bitboard {
        self.bitboard(side, PieceName::Rook) | self.bitboard(side, PieceName::Queen)
    }

    /// Returns the piece a move captures, if any
    pub fn capture(&self, m: Move) -> Option<Piece> {
        if m.is_en_passant() {
            Some(Piece::new(PieceName::Pawn, !self.stm))
        } else {
            self.piece_at(m.to())
        }
    }

    pub fn has_non_pawns(&self, side: Color) -> bool {
        !(self.color(side) ^ self.bitboard(side, PieceName::King) ^ self.bitboard(side, PieceName::Pawn)).is_empty()
    }

    fn is_material_draw(&self) -> bool {
        // Any pawn on the board keeps mating chances alive
        if !self.piece(PieceName::Pawn).is_empty() {
            return false;
        }
        let piece_count = self.occupancies().count_bits();
        // Bare kings, or a lone minor piece against a bare king
        if piece_count == 2
            || (piece_count == 3
                && (self.piece(PieceName::Knight).count_bits() == 1
                    || self.piece(PieceName::Bishop).count_bits() == 1))
        {
            return true;
        }
        if piece_count == 4 {
            // Two knights cannot force mate, nor can a bishop each
            if self.piece(PieceName::Knight).count_bits() == 2 {
                return true;
            }
            if self.color(Color::White).count_bits() == 2 && self.piece(PieceName::Bishop).count_bits() == 2 {
                return true;
            }
        }
        false
    }

    pub fn is_draw(&self) -> bool {
        self.half_move_clock >= 100 || self.is_material_draw()
    }

    pub const fn can_castle(&self, c: Castle) -> bool {
        self.castling_rights & c as u8 != 0
    }

    pub fn attackers(&self, sq: Square, occupied: Bitboard) -> Bitboard {
        self.attackers_for_side(Color::White, sq, occupied) | self.attackers_for_side(Color::Black, sq, occupied)
    }

    pub fn attackers_for_side(&self, attacker: Color, sq: Square, occupied: Bitboard) -> Bitboard {
        let pawn_attacks = pawn_attacks(sq, !attacker) & self.piece(PieceName::Pawn);
        let knight_attacks = knight_attacks(sq) & self.piece(PieceName::Knight);
        let diag_attacks = bishop_attacks(sq, occupied) & (self.piece(PieceName::Bishop) | self.piece(PieceName::Queen));
        let orth_attacks = rook_attacks(sq, occupied) & (self.piece(PieceName::Rook) | self.piece(PieceName::Queen));
        let king_attacks = king_attacks(sq) & self.piece(PieceName::King);
        (pawn_attacks | knight_attacks | diag_attacks | orth_attacks | king_attacks) & self.color(attacker)
    }

    pub fn square_under_attack(&self, attacker: Color, sq: Square) -> bool {
        !self.attackers_for_side(attacker, sq, self.occupancies()).is_empty()
    }

    pub fn in_check(&self) -> bool {
        !self.checkers.is_empty()
    }

    pub const fn checkers(&self) -> Bitboard {
        self.checkers
    }

    pub(crate) fn refresh_checkers(&mut self) {
        self.checkers = self.attackers_for_side(!self.stm, self.king_square(self.stm), self.occupancies());
    }

    fn place_piece(&mut self, piece: Piece, sq: Square) {
        self.mailbox[sq] = Some(piece);
        self.bitboards[piece.name()] ^= sq.bitboard();
        self.color_occupancies[piece.color()] ^= sq.bitboard();
        let key = ZOBRIST.piece_square[piece][sq];
        self.zobrist_hash ^= key;
        match piece.name() {
            PieceName::Pawn => self.pawn_hash ^= key,
            PieceName::Knight | PieceName::Bishop | PieceName::King => {
                self.minor_hash ^= key;
                self.non_pawn_hash[piece.color()] ^= key;
            }
            _ => self.non_pawn_hash[piece.color()] ^= key,
        }
    }

    fn remove_piece(&mut self, sq: Square) {
        if let Some(piece) = self.mailbox[sq] {
            self.mailbox[sq] = None;
            self.bitboards[piece.name()] ^= sq.bitboard();
            self.color_occupancies[piece.color()] ^= sq.bitboard();
            let key = ZOBRIST.piece_square[piece][sq];
            self.zobrist_hash ^= key;
            match piece.name() {
                PieceName::Pawn => self.pawn_hash ^= key,
                PieceName::Knight | PieceName::Bishop | PieceName::King => {
                    self.minor_hash ^= key;
                    self.non_pawn_hash[piece.color()] ^= key;
                }
                _ => self.non_pawn_hash[piece.color()] ^= key,
            }
        }
    }

    /// Used by `build_board` while assembling a position from scratch
    pub(crate) fn put_piece(&mut self, piece: Piece, sq: Square) {
        self.place_piece(piece, sq);
    }

    /// Applies a move to the board. Returns false if the move was pseudolegal but left the mover's
    /// king in check, in which case the board must be discarded.
    #[must_use]
    pub fn make_move(&mut self, m: Move) -> bool {
        let piece_moving = m.piece_moving();
        debug_assert_eq!(Some(piece_moving), self.piece_at(m.from()));
        let capture = self.capture(m);

        self.remove_piece(m.to());
        if m.promotion().is_none() {
            self.place_piece(piece_moving, m.to());
        }
        self.remove_piece(m.from());

        if m.is_castle() {
            let castle = m.castle_type();
            self.remove_piece(castle.rook_from());
            self.place_piece(Piece::new(PieceName::Rook, self.stm), castle.rook_to());
        } else if let Some(p) = m.promotion() {
            self.place_piece(Piece::new(p, self.stm), m.to());
        } else if m.is_en_passant() {
            let down = match self.stm {
                Color::White => Direction::South,
                Color::Black => Direction::North,
            };
            self.remove_piece(m.to().shift(down));
        }

        // The move is illegal if the mover's king can now be captured
        if self.square_under_attack(!self.stm, self.king_square(self.stm)) {
            return false;
        }

        if let Some(sq) = self.en_passant_square {
            self.zobrist_hash ^= ZOBRIST.en_passant_file[sq.file() as usize];
        }
        self.en_passant_square = None;
        if m.flag() == MoveType::DoublePush {
            let down = match self.stm {
                Color::White => Direction::South,
                Color::Black => Direction::North,
            };
            let sq = m.to().shift(down);
            self.en_passant_square = Some(sq);
            self.zobrist_hash ^= ZOBRIST.en_passant_file[sq.file() as usize];
        }

        if capture.is_none() && piece_moving.name() != PieceName::Pawn {
            self.half_move_clock += 1;
        } else {
            self.half_move_clock = 0;
        }

        self.zobrist_hash ^= ZOBRIST.castling[self.castling_rights as usize];
        self.castling_rights &= CASTLING_RIGHTS[m.from()] & CASTLING_RIGHTS[m.to()];
        self.zobrist_hash ^= ZOBRIST.castling[self.castling_rights as usize];

        if self.stm == Color::Black {
            self.fullmove_number += 1;
        }
        self.stm = !self.stm;
        self.zobrist_hash ^= ZOBRIST.turn;

        self.refresh_checkers();

        true
    }

    /// Passes the turn for null move pruning. Only valid when not in check.
    pub fn make_null_move(&mut self) {
        debug_assert!(!self.in_check());
        self.stm = !self.stm;
        self.zobrist_hash ^= ZOBRIST.turn;
        self.half_move_clock += 1;
        if let Some(sq) = self.en_passant_square {
            self.zobrist_hash ^= ZOBRIST.en_passant_file[sq.file() as usize];
        }
        self.en_passant_square = None;
        self.refresh_checkers();
    }

    /// Validates a move pulled out of the transposition table against the current position. Hash
    /// collisions and torn entries can hand back moves for a different board entirely.
    pub(crate) fn is_pseudo_legal(&self, m: Move) -> bool {
        let from = m.from();
        let to = m.to();
        let Some(moved_piece) = self.piece_at(from) else { return false };
        let captured_piece = self.piece_at(to);

        if moved_piece != m.piece_moving() || moved_piece.color() != self.stm {
            return false;
        }
        if captured_piece.is_some_and(|p| p.color() == self.stm) {
            return false;
        }

        if m.is_castle() {
            let Some(castle) = castle_of(self.stm, from, to) else { return false };
            return moved_piece.name() == PieceName::King
                && !self.in_check()
                && self.can_castle(castle)
                && (self.occupancies() & castle.empty_squares()).is_empty()
                && castle.check_squares().all(|sq| !self.square_under_attack(!self.stm, sq))
                && self.bitboard(self.stm, PieceName::Rook).occupied(castle.rook_from());
        }

        match moved_piece.name() {
            PieceName::Pawn => {
                let up = match self.stm {
                    Color::White => Direction::North,
                    Color::Black => Direction::South,
                };
                let last_rank = match self.stm {
                    Color::White => RANKS[7],
                    Color::Black => RANKS[0],
                };
                if last_rank.occupied(to) != m.promotion().is_some() {
                    return false;
                }
                match m.flag() {
                    MoveType::EnPassant => {
                        Some(to) == self.en_passant_square && pawn_attacks(from, self.stm).occupied(to)
                    }
                    MoveType::DoublePush => {
                        let Some(one_up) = from.checked_shift(up) else { return false };
                        one_up.checked_shift(up) == Some(to)
                            && self.piece_at(one_up).is_none()
                            && captured_piece.is_none()
                    }
                    MoveType::CastleMove => false,
                    _ => {
                        if captured_piece.is_some() {
                            pawn_attacks(from, self.stm).occupied(to)
                        } else {
                            from.checked_shift(up) == Some(to)
                        }
                    }
                }
            }
            name => {
                if !matches!(m.flag(), MoveType::Normal) {
                    return false;
                }
                let attacks = match name {
                    PieceName::Knight => knight_attacks(from),
                    PieceName::Bishop => bishop_attacks(from, self.occupancies()),
                    PieceName::Rook => rook_attacks(from, self.occupancies()),
                    PieceName::Queen => queen_attacks(from, self.occupancies()),
                    PieceName::King => king_attacks(from),
                    PieceName::Pawn => unreachable!(),
                };
                attacks.occupied(to)
            }
        }
    }

    /// Static exchange evaluation: would the capture sequence on the move's destination square
    /// come out at or above `threshold`?
    pub fn see_ge(&self, m: Move, threshold: i32) -> bool {
        // Castles never move to an occupied square
        if m.is_castle() {
            return threshold <= 0;
        }

        let from = m.from();
        let to = m.to();

        let mut gain = match self.capture(m) {
            Some(p) => p.value(),
            None => 0,
        };
        if let Some(p) = m.promotion() {
            gain += p.value() - PieceName::Pawn.value();
        }

        // Worst case for the mover: opponent stands pat after our capture
        let mut balance = gain - threshold;
        if balance < 0 {
            return false;
        }

        let mut next_victim = m.promotion().unwrap_or(m.piece_moving().name());
        balance -= next_victim.value();
        if balance >= 0 {
            return true;
        }

        let mut occupied = (self.occupancies() ^ from.bitboard()) | to.bitboard();
        if m.is_en_passant() {
            let down = match self.stm {
                Color::White => Direction::South,
                Color::Black => Direction::North,
            };
            occupied ^= to.shift(down).bitboard();
        }

        let diags = self.diags(Color::White) | self.diags(Color::Black);
        let orthos = self.orthos(Color::White) | self.orthos(Color::Black);

        let mut attackers = self.attackers(to, occupied) & occupied;
        let mut stm = !self.stm;

        loop {
            attackers &= occupied;
            let my_attackers = attackers & self.color(stm);
            if my_attackers.is_empty() {
                break;
            }

            // Capture with the least valuable attacker first
            next_victim = PieceName::King;
            for name in [PieceName::Pawn, PieceName::Knight, PieceName::Bishop, PieceName::Rook, PieceName::Queen] {
                if !(my_attackers & self.piece(name)).is_empty() {
                    next_victim = name;
                    break;
                }
            }

            stm = !stm;
            balance = -balance - 1 - next_victim.value();
            if balance >= 0 {
                // A king capture only stands when the opponent has no reply
                if next_victim == PieceName::King && !(attackers & self.color(stm)).is_empty() {
                    stm = !stm;
                }
                break;
            }

            occupied ^= (my_attackers & self.piece(next_victim)).lsb().bitboard();
            if matches!(next_victim, PieceName::Pawn | PieceName::Bishop | PieceName::Queen) {
                attackers |= bishop_attacks(to, occupied) & diags;
            }
            if matches!(next_victim, PieceName::Rook | PieceName::Queen) {
                attackers |= rook_attacks(to, occupied) & orthos;
            }
        }

        // Whoever is left to move after the last profitable capture loses the exchange
        stm != self.stm
    }
}

fn castle_of(stm: Color, from: Square, to: Square) -> Option<Castle> {
    match (stm, from, to) {
        (Color::White, Square::E1, Square::G1) => Some(Castle::WhiteKing),
        (Color::White, Square::E1, Square::C1) => Some(Castle::WhiteQueen),
        (Color::Black, Square::E8, Square::G8) => Some(Castle::BlackKing),
        (Color::Black, Square::E8, Square::C8) => Some(Castle::BlackQueen),
        _ => None,
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for rank in (0..8).rev() {
            write!(f, "{} | ", rank + 1)?;
            for file in 0..8 {
                let sq = Square(rank * 8 + file);
                let c = self.piece_at(sq).map_or('_', Piece::char);
                write!(f, "{c} | ")?;
            }
            writeln!(f)?;
        }
        writeln!(f, "    a   b   c   d   e   f   g   h")?;
        writeln!(f)?;
        writeln!(f, "{}", self.to_fen())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} to move",
            match self.stm {
                Color::White => "White",
                Color::Black => "Black",
            }
        )?;
        write!(f, "{self}")?;
        writeln!(f, "checkers:")?;
        writeln!(f, "{:?}", self.checkers)?;
        writeln!(f, "hash: {:x}", self.zobrist_hash)
    }
}

#[cfg(test)]
mod board_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};
    use crate::moves::movegenerator::MGT;

    #[test]
    fn legal_and_illegal_moves() {
        // The bishop on b4 pins the knight on c3 against the king on e1
        let board = build_board("rnbqk1nr/pppp1ppp/8/4p3/1b2P3/2N5/PPP2PPP/R1BQKBNR w KQkq - 0 3");
        let nc3_moves = board
            .generate_moves(MGT::All)
            .iter()
            .filter(|e| e.m.from() == Square(18))
            .copied()
            .collect::<Vec<_>>();
        assert!(!nc3_moves.is_empty());
        for entry in nc3_moves {
            let mut next = board;
            assert!(!next.make_move(entry.m), "pinned knight move {} should be illegal", entry.m);
        }
    }

    #[test]
    fn en_passant_round_trip() {
        let mut board = build_board("4k3/8/8/8/4p3/8/3P4/4K3 w - - 0 1");
        let double = Move::from_uci("d2d4", &board).unwrap();
        assert!(board.make_move(double));
        assert_eq!(board.en_passant_square, Some(Square(19)));

        let ep = Move::from_uci("e4d3", &board).unwrap();
        assert!(ep.is_en_passant());
        assert!(board.make_move(ep));
        assert!(board.piece_at(Square(27)).is_none(), "captured pawn removed from d4");
        assert_eq!(board.piece_at(Square(19)), Some(Piece::BlackPawn));
    }

    #[test]
    fn fifty_move_rule() {
        let mut board = build_board("4k3/8/8/8/8/8/4P3/4K3 w - - 98 70");
        assert!(!board.is_draw());
        let m = Move::from_uci("e1d1", &board).unwrap();
        assert!(board.make_move(m));
        assert!(!board.is_draw());
        let m = Move::from_uci("e8d8", &board).unwrap();
        assert!(board.make_move(m));
        assert!(board.is_draw());
    }

    #[test]
    fn see_judges_exchanges() {
        // Rook takes a defended pawn: loses rook for pawn
        let board = build_board("4k3/8/4p3/3p4/8/8/3R4/4K3 w - - 0 1");
        let rxd5 = Move::from_uci("d2d5", &board).unwrap();
        assert!(board.see_ge(rxd5, -1000));
        assert!(!board.see_ge(rxd5, 0));

        // Undefended pawn is free
        let board = build_board("4k3/8/8/3p4/8/8/3R4/4K3 w - - 0 1");
        let rxd5 = Move::from_uci("d2d5", &board).unwrap();
        assert!(board.see_ge(rxd5, 0));
        assert!(board.see_ge(rxd5, PieceName::Pawn.value()));
    }

    #[test]
    fn pseudo_legality_filters_foreign_moves() {
        let board = build_board(STARTING_FEN);
        for entry in board.generate_moves(MGT::All).iter() {
            assert!(board.is_pseudo_legal(entry.m));
        }
        // A move that made sense in some other position
        let stray = Move::new(Square(35), Square(44), MoveType::Normal, Piece::WhiteQueen);
        assert!(!board.is_pseudo_legal(stray));
    }

    #[test]
    fn checkers_track_the_mover() {
        let mut board = build_board("rnbqkbnr/pppp1ppp/8/4p3/8/5P2/PPPPP1PP/RNBQKBNR w KQkq - 0 2");
        let qh4 = Move::from_uci("d8h4", &board);
        // Not black to move yet; play a white move then deliver check
        assert!(qh4.is_none() || !board.is_pseudo_legal(qh4.unwrap()));
        let g4 = Move::from_uci("g2g4", &board).unwrap();
        assert!(board.make_move(g4));
        let qh4 = Move::from_uci("d8h4", &board).unwrap();
        assert!(board.make_move(qh4));
        assert!(board.in_check());
        assert_eq!(board.checkers().count_bits(), 1);
    }
}
