use crate::board::board::Board;
use crate::moves::movegenerator::MGT;
use crate::moves::movelist::MoveListEntry;
use crate::moves::movepicker::MovePicker;
use crate::moves::moves::Move;
use crate::search::thread::ThreadData;
use crate::search::value::{
    clamp_eval, is_decisive, is_loss, is_valid, mated_in, DRAW, INFINITY, MAX_PLY, VALUE_NONE,
};
use crate::search::PV;
use crate::transposition::{Bound, TranspositionTable};

/// Margin added to the stand-pat eval before a capture is considered able to raise alpha
const FUTILITY_MARGIN: i32 = 352;
/// Flat exchange floor for quiescence captures
const SEE_FLOOR: i32 = -78;

/// Tactical stabilisation at the horizon: captures and queen promotions only (all evasions when
/// in check), with the static eval free to stand pat. Runs until the position goes quiet, so the
/// search never returns an eval taken mid-exchange.
pub(crate) fn qsearch<const PV_NODE: bool>(
    td: &mut ThreadData,
    tt: &TranspositionTable,
    board: &Board,
    pv: &mut PV,
    mut alpha: i32,
    beta: i32,
) -> i32 {
    if td.halt() {
        return 0;
    }
    if td.main_thread() && td.nodes.check_time() && td.check_hard_stop() {
        return 0;
    }

    if board.is_draw() || td.is_repetition(board) {
        return td.draw_value();
    }

    td.sel_depth = td.sel_depth.max(td.ply);

    let in_check = board.in_check();

    if td.ply >= MAX_PLY - 1 {
        return if in_check { DRAW } else { td.evaluate(board) };
    }

    let entry = tt.probe(board.zobrist_hash, td.ply, board.rule50_count());
    let tt_value = entry.map_or(VALUE_NONE, |e| e.value);
    let tt_bound = entry.map_or(Bound::None, |e| e.bound);
    let tt_move = entry.and_then(|e| e.best_move(board));
    let tt_pv = PV_NODE || entry.is_some_and(|e| e.was_pv);

    if !PV_NODE
        && is_valid(tt_value)
        && match tt_bound {
            Bound::None => false,
            Bound::Lower => tt_value >= beta,
            Bound::Upper => tt_value <= alpha,
            Bound::Exact => true,
        }
    {
        return tt_value;
    }

    // Stand pat: the mover may simply decline to keep capturing
    let raw_eval;
    let mut best_value;
    let futility_base;
    if in_check {
        raw_eval = VALUE_NONE;
        td.stack[td.ply].static_eval = VALUE_NONE;
        best_value = -INFINITY;
        futility_base = -INFINITY;
    } else {
        raw_eval = match entry {
            Some(e) if is_valid(e.eval) => e.eval,
            _ => td.evaluate(board),
        };
        let corrected =
            clamp_eval(raw_eval + td.history.correction_value(board, &td.stack, td.ply) / 131072);
        td.stack[td.ply].static_eval = corrected;
        best_value = corrected;

        // A table value with the right bound beats the raw guess
        if is_valid(tt_value)
            && match tt_bound {
                Bound::None => false,
                Bound::Lower => tt_value > corrected,
                Bound::Upper => tt_value < corrected,
                Bound::Exact => true,
            }
        {
            best_value = tt_value;
        }

        if best_value >= beta {
            if entry.is_none() {
                tt.store(board.zobrist_hash, None, 0, Bound::Lower, best_value, td.ply, tt_pv, raw_eval);
            }
            return if is_decisive(best_value) { best_value } else { (best_value + beta) / 2 };
        }
        alpha = alpha.max(best_value);
        futility_base = corrected + FUTILITY_MARGIN;
    }

    let mut best_move: Option<Move> = None;
    let mut move_count = 0;

    let mut picker = MovePicker::qsearch(board, tt_move);
    while let Some(MoveListEntry { m, .. }) = picker.next(board, td) {
        // Exchanges that lose more than a flat floor never resolve in the mover's favor
        if !in_check && !is_loss(best_value) && !board.see_ge(m, SEE_FLOOR) {
            continue;
        }

        let mut next = *board;
        if !next.make_move(m) {
            continue;
        }
        move_count += 1;
        tt.prefetch(next.zobrist_hash);
        let gives_check = next.in_check();

        // Futility: a quiet-future capture that cannot reach alpha even with its victim counted
        // is not worth the recursion
        if !in_check && !gives_check && m.promotion().is_none() && !is_loss(best_value) {
            if move_count > 2 {
                continue;
            }
            let futility_value = futility_base + board.capture(m).map_or(0, |p| p.value());
            if futility_value <= alpha {
                best_value = best_value.max(futility_value);
                continue;
            }
            // The victim is big enough, but only if the square is actually winnable
            if futility_base <= alpha && !board.see_ge(m, 1) {
                best_value = best_value.max(futility_base);
                continue;
            }
        }

        td.stack[td.ply].played_move = Some(m);
        td.stack[td.ply].capture = m.is_capture(board);
        td.nodes.increment();
        td.hash_history.push(next.zobrist_hash);
        td.ply += 1;

        let mut node_pv = PV::default();
        let value = -qsearch::<PV_NODE>(td, tt, &next, &mut node_pv, -beta, -alpha);

        td.ply -= 1;
        td.hash_history.pop();

        if td.halt() {
            return 0;
        }

        if value > best_value {
            best_value = value;
            if value > alpha {
                best_move = Some(m);
                if PV_NODE {
                    pv.update(m, &node_pv);
                }
                if value >= beta {
                    break;
                }
                alpha = value;
            }
        }
    }

    if in_check && move_count == 0 {
        return mated_in(td.ply);
    }

    // With nothing but king and pawns, "no captures" can hide an outright stalemate; report the
    // draw instead of a hopeful stand-pat score
    if !in_check && move_count == 0 && !board.has_non_pawns(board.stm) && is_stalemate(board) {
        return DRAW;
    }

    let bound = if best_value >= beta { Bound::Lower } else { Bound::Upper };
    tt.store(board.zobrist_hash, best_move, 0, bound, best_value, td.ply, tt_pv, raw_eval);

    best_value
}

fn is_stalemate(board: &Board) -> bool {
    board
        .generate_moves(MGT::All)
        .iter()
        .all(|entry| {
            let mut next = *board;
            !next.make_move(entry.m)
        })
}

#[cfg(test)]
mod qsearch_tests {
    use super::*;
    use crate::board::fen::build_board;

    #[test]
    fn stalemate_recognised_with_bare_pawns() {
        // The classic king-and-pawn trap: every white king move is covered, the pawn capture
        // walks into the enemy king, and white is not in check
        let trapped = build_board("8/8/8/8/8/3k4/3p4/3K4 w - - 0 1");
        assert!(!trapped.has_non_pawns(crate::types::pieces::Color::White));
        assert!(!trapped.in_check());
        assert!(is_stalemate(&trapped));

        let cornered = build_board("7k/5K2/6Q1/8/8/8/8/8 b - - 0 1");
        assert!(is_stalemate(&cornered));

        let free = build_board("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert!(!is_stalemate(&free));
    }
}
