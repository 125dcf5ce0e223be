use crate::board::board::Board;
use crate::moves::movegenerator::MGT;
use crate::moves::movelist::{MoveList, MoveListEntry};
use crate::moves::moves::Move;
use crate::search::history::captured_kind;
use crate::search::thread::ThreadData;
use crate::types::pieces::PieceName;

/// Everything before the quiet stage outranks every quiet move
const TT_MOVE: i32 = i32::MAX - 1000;
const QUEEN_PROMOTION: i32 = 20_000_001;
const CAPTURE_BASE: i32 = 10_000_000;
/// Ordered most valuable victim first; the attacker tiebreak comes from the capture history
const MVV: [i32; 6] = [0, 2400, 2400, 4800, 9600, 0];
/// Exchanges worse than this SEE threshold wait behind the quiets
const BAD_CAPTURE_SEE: i32 = -PieceName::Pawn.value();

#[derive(Clone, Copy, PartialEq)]
enum Phase {
    TtMove,
    GenCaptures,
    GoodCaptures,
    GenQuiets,
    Quiets,
    BadCaptures,
    GenEvasions,
    Evasions,
    Finished,
}

/// Lazily staged move ordering: the table move travels alone, then winning captures, then quiets
/// ranked by the history stores, then losing captures. Each stage is generated only when the one
/// before it runs dry, because a cutoff usually arrives first.
pub struct MovePicker {
    phase: Phase,
    tt_move: Option<Move>,
    moves: MoveList,
    bad_captures: MoveList,
    current: usize,
    bad_current: usize,
    skip_quiets: bool,
    in_qsearch: bool,
}

impl MovePicker {
    pub fn new(board: &Board, tt_move: Option<Move>) -> Self {
        Self {
            phase: Phase::TtMove,
            tt_move: tt_move.filter(|m| board.is_pseudo_legal(*m)),
            moves: MoveList::default(),
            bad_captures: MoveList::default(),
            current: 0,
            bad_current: 0,
            skip_quiets: false,
            in_qsearch: false,
        }
    }

    /// Quiescence mode sees captures and queen promotions only, unless in check, where every
    /// evasion is on the table
    pub fn qsearch(board: &Board, tt_move: Option<Move>) -> Self {
        let tt_move =
            tt_move.filter(|m| board.is_pseudo_legal(*m) && (board.in_check() || m.is_tactical(board)));
        Self { tt_move, in_qsearch: true, ..Self::new(board, None) }
    }

    /// Late move pruning decided the remaining quiet moves cannot matter
    pub fn skip_quiet_moves(&mut self) {
        self.skip_quiets = true;
    }

    pub fn next(&mut self, board: &Board, td: &ThreadData) -> Option<MoveListEntry> {
        if self.phase == Phase::TtMove {
            self.phase = if board.in_check() { Phase::GenEvasions } else { Phase::GenCaptures };
            if let Some(tt_move) = self.tt_move {
                return Some(MoveListEntry::new(tt_move, TT_MOVE));
            }
        }

        if self.phase == Phase::GenCaptures {
            self.phase = Phase::GoodCaptures;
            self.moves = board.generate_moves(MGT::CapturesOnly);
            score_captures(td, board, &mut self.moves);
        }

        if self.phase == Phase::GoodCaptures {
            while self.current < self.moves.len() {
                let entry = self.moves.pick_move(self.current);
                self.current += 1;
                if Some(entry.m) == self.tt_move {
                    continue;
                }
                // Losing exchanges keep their rank but wait until the quiets have had their turn
                if !self.in_qsearch && !board.see_ge(entry.m, BAD_CAPTURE_SEE) {
                    self.bad_captures.arr.push(entry);
                    continue;
                }
                return Some(entry);
            }
            self.phase = if self.in_qsearch { Phase::Finished } else { Phase::GenQuiets };
        }

        if self.phase == Phase::GenQuiets {
            if self.skip_quiets {
                self.phase = Phase::BadCaptures;
            } else {
                self.phase = Phase::Quiets;
                self.current = 0;
                self.moves = board.generate_moves(MGT::QuietsOnly);
                score_quiets(td, board, &mut self.moves);
            }
        }

        if self.phase == Phase::Quiets {
            while self.current < self.moves.len() && !self.skip_quiets {
                let entry = self.moves.pick_move(self.current);
                self.current += 1;
                if Some(entry.m) == self.tt_move {
                    continue;
                }
                return Some(entry);
            }
            self.phase = Phase::BadCaptures;
        }

        if self.phase == Phase::BadCaptures {
            while self.bad_current < self.bad_captures.len() {
                let entry = self.bad_captures.pick_move(self.bad_current);
                self.bad_current += 1;
                return Some(entry);
            }
            self.phase = Phase::Finished;
        }

        if self.phase == Phase::GenEvasions {
            self.phase = Phase::Evasions;
            self.current = 0;
            self.moves = board.generate_moves(MGT::All);
            score_evasions(td, board, &mut self.moves);
        }

        if self.phase == Phase::Evasions {
            while self.current < self.moves.len() {
                let entry = self.moves.pick_move(self.current);
                self.current += 1;
                if Some(entry.m) == self.tt_move {
                    continue;
                }
                return Some(entry);
            }
            self.phase = Phase::Finished;
        }

        None
    }
}

fn score_captures(td: &ThreadData, board: &Board, moves: &mut MoveList) {
    for MoveListEntry { m, score } in moves.arr.iter_mut() {
        let promo_bonus = if m.promotion().is_some() { QUEEN_PROMOTION - CAPTURE_BASE } else { 0 };
        *score = CAPTURE_BASE + promo_bonus + MVV[captured_kind(board, *m)] + td.history.capt_hist(board, *m);
    }
}

fn score_quiets(td: &ThreadData, board: &Board, moves: &mut MoveList) {
    for MoveListEntry { m, score } in moves.arr.iter_mut() {
        *score = td.history.quiet_order_score(board, &td.stack, td.ply, *m);
    }
}

fn score_evasions(td: &ThreadData, board: &Board, moves: &mut MoveList) {
    for MoveListEntry { m, score } in moves.arr.iter_mut() {
        *score = if m.is_tactical(board) {
            CAPTURE_BASE + MVV[captured_kind(board, *m)] + td.history.capt_hist(board, *m)
        } else {
            td.history.quiet_order_score(board, &td.stack, td.ply, *m)
        };
    }
}

#[cfg(test)]
mod movepicker_tests {
    use super::*;
    use crate::board::fen::build_board;
    use crate::moves::movegenerator::MGT;
    use crate::search::thread::ThreadData;
    use std::collections::HashSet;

    fn drain(picker: &mut MovePicker, board: &Board, td: &ThreadData) -> Vec<Move> {
        let mut seen = Vec::new();
        while let Some(entry) = picker.next(board, td) {
            seen.push(entry.m);
        }
        seen
    }

    #[test]
    fn yields_every_pseudolegal_move_once() {
        let board = build_board("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let td = ThreadData::test_instance();
        let mut picker = MovePicker::new(&board, None);

        let picked = drain(&mut picker, &board, &td);
        let expected: HashSet<u16> =
            board.generate_moves(MGT::All).iter().map(|e| e.m.as_u16()).collect();
        let got: HashSet<u16> = picked.iter().map(|m| m.as_u16()).collect();

        assert_eq!(picked.len(), expected.len(), "no duplicates");
        assert_eq!(got, expected);
    }

    #[test]
    fn tt_move_comes_first_and_only_once() {
        let board = build_board("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1");
        let td = ThreadData::test_instance();
        let tt_move = Move::from_uci("e2a6", &board).unwrap();
        let mut picker = MovePicker::new(&board, Some(tt_move));

        let picked = drain(&mut picker, &board, &td);
        assert_eq!(picked[0], tt_move);
        assert_eq!(picked.iter().filter(|m| **m == tt_move).count(), 1);
    }

    #[test]
    fn winning_captures_precede_quiets_precede_losing_captures() {
        // The bishop can take a free pawn on f3; the rook capture on d5 loses to the e6 pawn
        let board = build_board("4k3/8/4p3/3p4/8/5p2/3R2B1/4K3 w - - 0 1");
        let td = ThreadData::test_instance();
        let mut picker = MovePicker::new(&board, None);

        let picked = drain(&mut picker, &board, &td);
        let bxf3 = Move::from_uci("g2f3", &board).unwrap();
        let rxd5 = Move::from_uci("d2d5", &board).unwrap();

        assert_eq!(picked[0], bxf3, "the winning capture leads");
        let losing_idx = picked.iter().position(|m| *m == rxd5).unwrap();
        assert_eq!(losing_idx, picked.len() - 1, "the losing capture waits behind the quiets");
    }

    #[test]
    fn qsearch_mode_stops_after_captures() {
        let board = build_board("4k3/8/8/3p4/8/8/3R4/4K3 w - - 0 1");
        let td = ThreadData::test_instance();
        let mut picker = MovePicker::qsearch(&board, None);
        let picked = drain(&mut picker, &board, &td);
        assert_eq!(picked.len(), 1);
        assert!(picked[0].is_capture(&board));
    }

    #[test]
    fn skip_quiets_jumps_to_losing_captures() {
        let board = build_board("4k3/8/4p3/3p4/8/8/3R4/4K3 w - - 0 1");
        let td = ThreadData::test_instance();
        let mut picker = MovePicker::new(&board, None);
        picker.skip_quiet_moves();
        let picked = drain(&mut picker, &board, &td);
        assert!(picked.iter().all(|m| m.is_capture(&board)));
    }
}
