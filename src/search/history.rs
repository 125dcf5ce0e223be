use bytemuck::zeroed_box;

use crate::board::board::Board;
use crate::moves::moves::Move;
use crate::search::{SearchStack, LOW_PLY_SIZE};
use crate::types::pieces::{Color, PieceName};
use crate::types::square::Square;

/// Saturation point of the butterfly, capture, pawn and continuation accumulators
pub const HIST_LIMIT: i32 = 16384;
/// Saturation point of the correction accumulators, which live on a finer scale
const CORR_LIMIT: i32 = 1024;

const PAWN_HIST_SIZE: usize = 512;
const CORR_SIZE: usize = 16384;

/// Relative weights of the correction components; the combined sum is consumed divided by 131072
const PAWN_CORR_WEIGHT: i32 = 9536;
const MINOR_CORR_WEIGHT: i32 = 8494;
const NON_PAWN_CORR_WEIGHT: i32 = 10132;
const CONT_CORR_WEIGHT: i32 = 7156;

/// `[piece][to]` leaf shared by the continuation tables
type PieceTo = [[i16; 64]; 12];

/// Move ordering statistics and static-eval correction accumulators, all per worker. Every table
/// uses the gravity update `h += bonus - h*|bonus|/limit`, which saturates smoothly at the limit
/// and decays stale signal as fresh bonuses arrive.
pub struct HistoryTable {
    /// Butterfly history: `[side to move][from-to]`
    main: Box<[[i16; 4096]; 2]>,
    /// Near-root refinement: `[ply][from-to]`
    low_ply: Box<[[i16; 4096]; LOW_PLY_SIZE]>,
    /// `[moving piece][to][captured piece kind]`
    capture: Box<[[[i16; 6]; 64]; 12]>,
    /// Keyed by pawn structure: `[pawn hash % size][piece][to]`
    pawn: Box<[PieceTo; PAWN_HIST_SIZE]>,
    /// `[prior in-check x prior capture][prior piece][prior to] -> [piece][to]`
    continuation: Box<[[[PieceTo; 64]; 12]; 4]>,

    pawn_corr: Box<[[i16; 2]; CORR_SIZE]>,
    minor_corr: Box<[[i16; 2]; CORR_SIZE]>,
    /// `[hash index][color whose material is keyed][side to move]`
    non_pawn_corr: Box<[[[i16; 2]; 2]; CORR_SIZE]>,
    /// `[prior piece][prior to] -> [piece][to]` on the move pair two plies apart
    cont_corr: Box<[[PieceTo; 64]; 12]>,
}

impl Default for HistoryTable {
    fn default() -> Self {
        Self {
            main: zeroed_box(),
            low_ply: zeroed_box(),
            capture: zeroed_box(),
            pawn: zeroed_box(),
            continuation: zeroed_box(),
            pawn_corr: zeroed_box(),
            minor_corr: zeroed_box(),
            non_pawn_corr: zeroed_box(),
            cont_corr: zeroed_box(),
        }
    }
}

fn gravity(entry: &mut i16, bonus: i32, limit: i32) {
    let bonus = bonus.clamp(-limit, limit);
    let updated = i32::from(*entry) + bonus - i32::from(*entry) * bonus.abs() / limit;
    *entry = updated as i16;
}

const fn from_to(m: Move) -> usize {
    m.from().idx() * 64 + m.to().idx()
}

/// Promotions and en passant index the capture tables as pawn captures
pub(crate) fn captured_kind(board: &Board, m: Move) -> PieceName {
    if m.is_en_passant() || m.promotion().is_some() {
        PieceName::Pawn
    } else {
        board.piece_at(m.to()).map_or(PieceName::Pawn, |p| p.name())
    }
}

impl HistoryTable {
    pub fn main_hist(&self, stm: Color, m: Move) -> i32 {
        i32::from(self.main[stm][from_to(m)])
    }

    pub fn update_main(&mut self, stm: Color, m: Move, bonus: i32) {
        gravity(&mut self.main[stm][from_to(m)], bonus, HIST_LIMIT);
    }

    pub fn low_ply_hist(&self, ply: i32, m: Move) -> i32 {
        if (ply as usize) < LOW_PLY_SIZE {
            i32::from(self.low_ply[ply as usize][from_to(m)])
        } else {
            0
        }
    }

    pub fn update_low_ply(&mut self, ply: i32, m: Move, bonus: i32) {
        if (ply as usize) < LOW_PLY_SIZE {
            gravity(&mut self.low_ply[ply as usize][from_to(m)], bonus, HIST_LIMIT);
        }
    }

    pub fn capt_hist(&self, board: &Board, m: Move) -> i32 {
        i32::from(self.capture[m.piece_moving()][m.to()][captured_kind(board, m)])
    }

    pub fn update_capt_hist(&mut self, board: &Board, m: Move, bonus: i32) {
        gravity(&mut self.capture[m.piece_moving()][m.to()][captured_kind(board, m)], bonus, HIST_LIMIT);
    }

    pub fn pawn_hist(&self, board: &Board, m: Move) -> i32 {
        let idx = board.pawn_hash as usize % PAWN_HIST_SIZE;
        i32::from(self.pawn[idx][m.piece_moving()][m.to()])
    }

    pub fn update_pawn_hist(&mut self, board: &Board, m: Move, bonus: i32) {
        let idx = board.pawn_hash as usize % PAWN_HIST_SIZE;
        gravity(&mut self.pawn[idx][m.piece_moving()][m.to()], bonus, HIST_LIMIT);
    }

    /// Continuation history against the move made `offset` plies up the stack
    pub fn cont_hist(&self, stack: &SearchStack, ply: i32, offset: i32, m: Move) -> i32 {
        let frame = &stack[ply - offset];
        let Some(prev) = frame.played_move else { return 0 };
        let table = &self.continuation[frame.cont_index()];
        i32::from(table[prev.piece_moving()][prev.to()][m.piece_moving()][m.to()])
    }

    pub fn update_cont_hist(&mut self, stack: &SearchStack, ply: i32, m: Move, bonus: i32) {
        for offset in [1, 2, 4] {
            let frame = &stack[ply - offset];
            let Some(prev) = frame.played_move else { continue };
            let table = &mut self.continuation[frame.cont_index()];
            gravity(&mut table[prev.piece_moving()][prev.to()][m.piece_moving()][m.to()], bonus, HIST_LIMIT);
        }
    }

    /// Ranking score for the quiet stage of the move picker
    pub fn quiet_order_score(&self, board: &Board, stack: &SearchStack, ply: i32, m: Move) -> i32 {
        self.main_hist(board.stm, m)
            + self.pawn_hist(board, m)
            + self.cont_hist(stack, ply, 1, m)
            + self.cont_hist(stack, ply, 2, m)
            + self.cont_hist(stack, ply, 4, m)
            + self.low_ply_hist(ply, m)
    }

    /// The signal the search uses to modulate reductions for a quiet move
    pub fn stat_score(&self, board: &Board, stack: &SearchStack, ply: i32, m: Move) -> i32 {
        2 * self.main_hist(board.stm, m)
            + self.cont_hist(stack, ply, 1, m)
            + self.cont_hist(stack, ply, 2, m)
            + self.pawn_hist(board, m)
    }

    pub fn update_quiet(&mut self, board: &Board, stack: &SearchStack, ply: i32, m: Move, bonus: i32) {
        self.update_main(board.stm, m, bonus);
        self.update_pawn_hist(board, m, bonus);
        self.update_cont_hist(stack, ply, m, bonus);
        self.update_low_ply(ply, m, bonus);
    }

    /// Weighted blend of the correction signals for the current position. The caller divides by
    /// 131072 to land on the centipawn scale.
    pub fn correction_value(&self, board: &Board, stack: &SearchStack, ply: i32) -> i32 {
        let stm = board.stm;
        let pawn = i32::from(self.pawn_corr[board.pawn_hash as usize % CORR_SIZE][stm]);
        let minor = i32::from(self.minor_corr[board.minor_hash as usize % CORR_SIZE][stm]);
        let non_pawn = i32::from(
            self.non_pawn_corr[board.non_pawn_hash[Color::White] as usize % CORR_SIZE][Color::White][stm],
        ) + i32::from(
            self.non_pawn_corr[board.non_pawn_hash[Color::Black] as usize % CORR_SIZE][Color::Black][stm],
        );
        let cont = self.cont_corr_entry(stack, ply).map_or(0, |e| i32::from(*e));

        PAWN_CORR_WEIGHT * pawn
            + MINOR_CORR_WEIGHT * minor
            + NON_PAWN_CORR_WEIGHT * non_pawn
            + CONT_CORR_WEIGHT * cont
    }

    /// Feeds the gap between the search result and the static eval back into the correction
    /// tables, weighted by depth
    pub fn update_correction(&mut self, board: &Board, stack: &SearchStack, ply: i32, depth: i32, diff: i32) {
        let bonus = (diff * depth / 8).clamp(-CORR_LIMIT / 4, CORR_LIMIT / 4);
        let stm = board.stm;

        gravity(&mut self.pawn_corr[board.pawn_hash as usize % CORR_SIZE][stm], bonus, CORR_LIMIT);
        gravity(&mut self.minor_corr[board.minor_hash as usize % CORR_SIZE][stm], bonus, CORR_LIMIT);
        gravity(
            &mut self.non_pawn_corr[board.non_pawn_hash[Color::White] as usize % CORR_SIZE][Color::White][stm],
            bonus,
            CORR_LIMIT,
        );
        gravity(
            &mut self.non_pawn_corr[board.non_pawn_hash[Color::Black] as usize % CORR_SIZE][Color::Black][stm],
            bonus,
            CORR_LIMIT,
        );
        if let Some(entry) = self.cont_corr_entry_mut(stack, ply) {
            gravity(entry, bonus, CORR_LIMIT);
        }
    }

    fn cont_corr_coords(stack: &SearchStack, ply: i32) -> Option<(usize, Square, usize, Square)> {
        let prev2 = stack[ply - 2].played_move?;
        let prev1 = stack[ply - 1].played_move?;
        Some((prev2.piece_moving().idx(), prev2.to(), prev1.piece_moving().idx(), prev1.to()))
    }

    fn cont_corr_entry(&self, stack: &SearchStack, ply: i32) -> Option<&i16> {
        let (p2, t2, p1, t1) = Self::cont_corr_coords(stack, ply)?;
        Some(&self.cont_corr[p2][t2][p1][t1])
    }

    fn cont_corr_entry_mut(&mut self, stack: &SearchStack, ply: i32) -> Option<&mut i16> {
        let (p2, t2, p1, t1) = Self::cont_corr_coords(stack, ply)?;
        Some(&mut self.cont_corr[p2][t2][p1][t1])
    }
}

#[cfg(test)]
mod history_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};
    use crate::moves::moves::MoveType;
    use crate::types::pieces::Piece;

    fn quiet_move() -> Move {
        Move::new(Square(12), Square(20), MoveType::Normal, Piece::WhitePawn)
    }

    #[test]
    fn gravity_saturates_at_the_limit() {
        let mut entry = 0i16;
        for _ in 0..1000 {
            gravity(&mut entry, HIST_LIMIT, HIST_LIMIT);
        }
        assert_eq!(i32::from(entry), HIST_LIMIT);
        for _ in 0..1000 {
            gravity(&mut entry, -HIST_LIMIT, HIST_LIMIT);
        }
        assert_eq!(i32::from(entry), -HIST_LIMIT);
    }

    #[test]
    fn bonuses_and_maluses_accumulate() {
        let mut table = HistoryTable::default();
        let m = quiet_move();
        table.update_main(Color::White, m, 500);
        assert!(table.main_hist(Color::White, m) > 0);
        assert_eq!(table.main_hist(Color::Black, m), 0);

        table.update_main(Color::White, m, -2000);
        assert!(table.main_hist(Color::White, m) < 500);
    }

    #[test]
    fn correction_moves_toward_the_search_result() {
        let board = build_board(STARTING_FEN);
        let mut table = HistoryTable::default();
        let stack = SearchStack::default();

        assert_eq!(table.correction_value(&board, &stack, 0), 0);
        // Search keeps coming back higher than the static eval
        for _ in 0..32 {
            table.update_correction(&board, &stack, 0, 8, 64);
        }
        assert!(table.correction_value(&board, &stack, 0) > 0);
    }
}
