use crate::board::board::Board;
use crate::moves::movelist::MoveListEntry;
use crate::moves::movepicker::MovePicker;
use crate::moves::moves::Move;
use crate::search::quiescence::qsearch;
use crate::search::thread::ThreadData;
use crate::search::value::{
    is_decisive, is_loss, is_valid, is_win, mate_in, mated_in, DRAW, INFINITY, MAX_PLY, VALUE_NONE,
};
use crate::search::PV;
use crate::transposition::{Bound, TranspositionTable};

/// One aspiration-windowed root search for the PV line `td.pv_idx`. Starts from a window around
/// the move's running average score and widens asymmetrically on failure, shrinking the search
/// depth a little while a fail-high is being re-proven.
pub(crate) fn aspiration_search(td: &mut ThreadData, tt: &TranspositionTable, board: &Board) -> i32 {
    let mut alpha = -INFINITY;
    let mut beta = INFINITY;
    let mut delta = INFINITY;

    let average = td.root_moves[td.pv_idx].average_score;
    if is_valid(average) {
        delta = 5
            + td.thread_idx as i32 % 8
            + (td.root_moves[td.pv_idx].mean_squared_score.abs() / 9000) as i32;
        alpha = (average - delta).max(-INFINITY);
        beta = (average + delta).min(INFINITY);

        // Color the evaluation toward the side the score already favors
        td.optimism[board.stm] = 137 * average / (average.abs() + 91);
        td.optimism[!board.stm] = -td.optimism[board.stm];
    }

    let mut fail_high_cnt = 0;
    let mut search_again_cnt = 0;
    loop {
        td.root_delta = (beta - alpha).max(1);
        let adjusted_depth = (td.root_depth - fail_high_cnt - 3 * (search_again_cnt + 1) / 4).max(1);

        td.ply = 0;
        let mut pv = PV::default();
        let value = negamax::<true>(td, tt, board, &mut pv, adjusted_depth, alpha, beta, false);

        // Keep the half-searched lines ordered so a halt still reports something sensible
        td.sort_root_moves(td.pv_idx);

        if td.halt() {
            return value;
        }

        if value <= alpha {
            beta = (alpha + beta) / 2;
            alpha = (value - delta).max(-INFINITY);
            fail_high_cnt = 0;
            td.root_moves[td.pv_idx].score_upperbound = true;
            td.root_moves[td.pv_idx].score_lowerbound = false;
            td.root_moves[td.pv_idx].uci_score = alpha;
            td.report_bound_line();
        } else if value >= beta {
            beta = (value + delta).min(INFINITY);
            fail_high_cnt += 1;
            td.root_moves[td.pv_idx].score_lowerbound = true;
            td.root_moves[td.pv_idx].score_upperbound = false;
            td.root_moves[td.pv_idx].uci_score = beta;
            td.report_bound_line();
        } else {
            td.root_moves[td.pv_idx].score_lowerbound = false;
            td.root_moves[td.pv_idx].score_upperbound = false;
            td.root_moves[td.pv_idx].uci_score = value;
            return value;
        }

        search_again_cnt += 1;
        delta += delta / 3;
    }
}

/// Principal variation search with a null window everywhere but the leftmost path. `PV` is a
/// compile-time split so the pruning-heavy non-PV path stays branch-predictable; the root is the
/// `td.ply == 0` case of the PV path.
///
/// `cut_node` marks nodes expected to fail high. An "all node" is the complement: a non-PV node
/// expected to fail low.
#[allow(clippy::too_many_lines)]
pub(crate) fn negamax<const PV: bool>(
    td: &mut ThreadData,
    tt: &TranspositionTable,
    board: &Board,
    pv: &mut PV,
    mut depth: i32,
    mut alpha: i32,
    mut beta: i32,
    cut_node: bool,
) -> i32 {
    let is_root = td.ply == 0;
    let in_check = board.in_check();
    let excluded = td.stack[td.ply].excluded;

    if td.halt() {
        return 0;
    }
    if td.main_thread() && td.nodes.check_time() && td.check_hard_stop() {
        return 0;
    }

    if depth <= 0 {
        return qsearch::<{ PV }>(td, tt, board, pv, alpha, beta);
    }
    depth = depth.min(MAX_PLY - 1);

    td.sel_depth = td.sel_depth.max(td.ply);

    if !is_root {
        // A single repetition inside the tree already scores as a draw; the jitter keeps the
        // search from steering into threefold blindness
        if board.is_draw() || td.is_repetition(board) {
            return td.draw_value();
        }

        if td.ply >= MAX_PLY - 1 {
            return if in_check { DRAW } else { td.evaluate(board) };
        }

        // Mate distance pruning: an already-found shorter mate bounds what this subtree can add
        alpha = alpha.max(mated_in(td.ply));
        beta = beta.min(mate_in(td.ply + 1));
        if alpha >= beta {
            return alpha;
        }
    }

    td.stack[td.ply].in_check = in_check;
    td.stack[td.ply].move_count = 0;
    td.stack[td.ply + 2].cutoff_cnt = 0;

    // Step 3: transposition table. Excluded-move searches run blind so the outer entry
    // stays authoritative.
    let entry = if excluded.is_some() {
        None
    } else {
        tt.probe(board.zobrist_hash, td.ply, board.rule50_count())
    };
    let tt_value = entry.map_or(VALUE_NONE, |e| e.value);
    let tt_depth = entry.map_or(0, |e| e.depth);
    let tt_bound = entry.map_or(Bound::None, |e| e.bound);
    let tt_move = if is_root {
        Some(td.root_moves[td.pv_idx].root_move())
    } else {
        entry.and_then(|e| e.best_move(board))
    };
    if excluded.is_none() {
        td.stack[td.ply].tt_pv = PV || entry.is_some_and(|e| e.was_pv);
    }
    let tt_capture = tt_move.is_some_and(|m| m.is_tactical(board));

    if !PV
        && !is_root
        && excluded.is_none()
        && is_valid(tt_value)
        && tt_depth > depth - i32::from(tt_value <= beta)
        && bound_covers(tt_bound, tt_value, beta)
        && board.rule50_count() < 96
        && verified_cutoff(td, tt, board, tt_move, tt_value, depth, beta)
    {
        // A quiet table move that keeps failing high earns its history up front, and a quickly
        // refuted previous move eats a malus through its continuation entries
        if let Some(m) = tt_move {
            if tt_value >= beta {
                if m.is_quiet(board) {
                    let bonus = stat_bonus(depth, false);
                    td.history.update_quiet(board, &td.stack, td.ply, m, bonus);
                }
                let prev = td.stack[td.ply - 1];
                if prev.move_count <= 2 && !prev.capture {
                    if let Some(prev_move) = prev.played_move {
                        td.history.update_cont_hist(&td.stack, td.ply - 1, prev_move, -stat_malus(depth));
                    }
                }
            }
        }
        return tt_value;
    }

    // Step 4 would probe the endgame tablebases here; no backend is wired in, so the probe
    // cardinality is permanently zero and the search continues unaided.

    // Step 5: static evaluation, corrected by the error the search has been observing for
    // similar structures
    let correction = td.history.correction_value(board, &td.stack, td.ply);
    let raw_eval;
    let static_eval;
    if in_check {
        raw_eval = VALUE_NONE;
        static_eval = td.stack[td.ply - 2].static_eval;
        td.stack[td.ply].static_eval = static_eval;
    } else if excluded.is_some() {
        // The outer search of this node already evaluated it
        raw_eval = td.stack[td.ply].static_eval;
        static_eval = raw_eval;
    } else {
        raw_eval = match entry {
            Some(e) if is_valid(e.eval) => e.eval,
            _ => td.evaluate(board),
        };
        static_eval = crate::search::value::clamp_eval(raw_eval + correction / 131072);
        td.stack[td.ply].static_eval = static_eval;
        if entry.is_none() {
            // Seed the table so siblings skip the evaluator
            tt.store(board.zobrist_hash, None, 0, Bound::None, VALUE_NONE, td.ply, td.stack[td.ply].tt_pv, raw_eval);
        }
    }

    // The tt value is a better guess at the node's worth than the static eval whenever its
    // bound points the right way
    let mut eval = static_eval;
    if is_valid(tt_value) && bound_covers(tt_bound, tt_value, eval) {
        eval = tt_value;
    }

    let improving = if in_check {
        false
    } else {
        let two_ago = td.stack[td.ply - 2].static_eval;
        if is_valid(two_ago) {
            static_eval > two_ago
        } else {
            let four_ago = td.stack[td.ply - 4].static_eval;
            is_valid(four_ago) && static_eval > four_ago
        }
    };

    // Step 6: the pre-move pruning gauntlet. Everything here wants a usable eval and no check.
    if !in_check && !is_root {
        // Razoring: hopeless nodes drop straight to quiescence
        if !PV && is_valid(eval) && eval < alpha - 514 - 294 * depth * depth {
            return qsearch::<false>(td, tt, board, pv, alpha, beta);
        }

        // Futility: comfortably above beta and shallow enough that nothing is likely to change
        if !td.stack[td.ply].tt_pv
            && depth < 14
            && is_valid(eval)
            && eval - futility_margin(depth, improving) >= beta
            && !is_decisive(eval)
            && !is_decisive(beta)
        {
            return (2 * beta + eval) / 3;
        }

        // Null move: hand over the turn; if the opponent still cannot reach beta at reduced
        // depth, a real move will not let them either
        if cut_node
            && excluded.is_none()
            && td.stack[td.ply - 1].played_move.is_some()
            && static_eval >= beta - 18 * depth + 390
            && !is_loss(beta)
            && board.has_non_pawns(board.stm)
            && td.ply >= td.nmp_min_ply
        {
            let r = 6 + depth / 3;
            let mut null_board = *board;
            null_board.make_null_move();
            tt.prefetch(null_board.zobrist_hash);

            td.stack[td.ply].played_move = None;
            td.stack[td.ply].capture = false;
            td.hash_history.push(null_board.zobrist_hash);
            td.ply += 1;
            let mut node_pv = PV::default();
            let mut null_value =
                -negamax::<false>(td, tt, &null_board, &mut node_pv, depth - r, -beta, -beta + 1, false);
            td.ply -= 1;
            td.hash_history.pop();

            if td.halt() {
                return 0;
            }

            if null_value >= beta {
                // Never return an unproven mate from a pass
                if is_win(null_value) {
                    null_value = beta;
                }
                if td.nmp_min_ply > 0 || depth < 16 {
                    return null_value;
                }
                // At high depth, verify without the null move before trusting it, disabling
                // further null passes in the verification subtree
                td.nmp_min_ply = td.ply + 3 * (depth - r) / 4;
                let verify =
                    negamax::<false>(td, tt, board, &mut node_pv, depth - r, beta - 1, beta, false);
                td.nmp_min_ply = 0;
                if verify >= beta {
                    return null_value;
                }
            }
        }

        // Internal iterative reduction: a would-be-interesting node with no table move is not
        // worth full depth yet
        if (PV || cut_node)
            && depth >= 6
            && tt_move.is_none()
            && td.stack[td.ply].reduction <= 3
        {
            depth -= 1;
        }

        // ProbCut: a good capture that beats beta with margin at reduced depth usually means
        // the whole node does
        let probcut_beta = beta + 224 - 64 * i32::from(improving);
        if depth >= 3
            && excluded.is_none()
            && !is_decisive(beta)
            && !(is_valid(tt_value) && tt_depth >= depth - 3 && tt_value < probcut_beta)
        {
            let mut picker = MovePicker::qsearch(board, tt_move.filter(|m| m.is_tactical(board)));
            while let Some(MoveListEntry { m, .. }) = picker.next(board, td) {
                if Some(m) == excluded || !board.see_ge(m, probcut_beta - static_eval) {
                    continue;
                }
                let mut next = *board;
                if !next.make_move(m) {
                    continue;
                }
                tt.prefetch(next.zobrist_hash);

                td.stack[td.ply].played_move = Some(m);
                td.stack[td.ply].capture = true;
                td.nodes.increment();
                td.hash_history.push(next.zobrist_hash);
                td.ply += 1;
                let mut node_pv = PV::default();
                let mut value =
                    -qsearch::<false>(td, tt, &next, &mut node_pv, -probcut_beta, -probcut_beta + 1);
                if value >= probcut_beta && depth >= 5 {
                    value = -negamax::<false>(
                        td,
                        tt,
                        &next,
                        &mut node_pv,
                        depth - 4,
                        -probcut_beta,
                        -probcut_beta + 1,
                        !cut_node,
                    );
                }
                td.ply -= 1;
                td.hash_history.pop();

                if td.halt() {
                    return 0;
                }
                if value >= probcut_beta {
                    tt.store(
                        board.zobrist_hash,
                        Some(m),
                        depth - 3,
                        Bound::Lower,
                        value,
                        td.ply,
                        td.stack[td.ply].tt_pv,
                        raw_eval,
                    );
                    if !is_decisive(value) {
                        return value - (probcut_beta - beta);
                    }
                }
            }
        }
    }

    // Step 7: the move loop
    let mut best_value = -INFINITY;
    let mut best_move: Option<Move> = None;
    let original_depth = depth;
    let mut move_count = 0;
    let mut quiets_tried: Vec<Move> = Vec::new();
    let mut captures_tried: Vec<Move> = Vec::new();

    let mut picker = MovePicker::new(board, tt_move);
    while let Some(MoveListEntry { m, .. }) = picker.next(board, td) {
        if Some(m) == excluded {
            continue;
        }
        // In multi-PV mode each line searches only the root moves not yet claimed by a
        // better line
        if is_root && !td.root_moves[td.pv_idx..].iter().any(|rm| rm.root_move() == m) {
            continue;
        }

        let is_quiet = m.is_quiet(board);
        let capt_hist = if is_quiet { 0 } else { td.history.capt_hist(board, m) };

        // Shallow pruning of late moves, once one non-losing line is banked
        if !is_root && !is_loss(best_value) && board.has_non_pawns(board.stm) {
            if move_count >= (3 + depth * depth) / (2 - i32::from(improving)) {
                picker.skip_quiet_moves();
            }

            let base_r = td.lmr.reduction(improving, depth, move_count.max(1), beta - alpha, td.root_delta);
            let lmr_depth = (depth - 1 - base_r / 1024).max(0);

            if !is_quiet {
                if !in_check && lmr_depth < 7 && !is_decisive(alpha) && is_valid(static_eval) {
                    let futility = static_eval
                        + 300
                        + board.capture(m).map_or(0, |p| p.value())
                        + capt_hist / 7;
                    if futility <= alpha {
                        continue;
                    }
                }
                let margin = (157 * depth + capt_hist / 29).max(0);
                if !board.see_ge(m, -margin) {
                    continue;
                }
            } else {
                let cont = td.history.cont_hist(&td.stack, td.ply, 1, m)
                    + td.history.cont_hist(&td.stack, td.ply, 2, m);
                if cont < -4312 * depth {
                    continue;
                }

                if !in_check && lmr_depth < 12 && is_valid(static_eval) {
                    let futility = static_eval
                        + 47
                        + 171 * i32::from(best_move.is_none())
                        + 134 * lmr_depth
                        + 90 * i32::from(static_eval > alpha);
                    if futility <= alpha {
                        picker.skip_quiet_moves();
                        continue;
                    }
                }

                if !board.see_ge(m, -26 * lmr_depth * lmr_depth) {
                    continue;
                }
            }
        }

        // Singular extension: when the table move, searched with itself excluded, collapses
        // below its stored value, it is the only move and deserves more depth. When the
        // exclusion search still beats beta, several moves do, and the node multi-cuts.
        let mut extension = 0;
        if !is_root
            && excluded.is_none()
            && Some(m) == tt_move
            && depth >= 6 + i32::from(td.stack[td.ply].tt_pv)
            && tt_depth >= depth - 3
            && matches!(tt_bound, Bound::Lower | Bound::Exact)
            && is_valid(tt_value)
            && !is_decisive(tt_value)
            && td.ply < 2 * td.root_depth
        {
            let singular_beta =
                tt_value - (56 + 81 * i32::from(td.stack[td.ply].tt_pv && !PV)) * depth / 60;
            let singular_depth = (depth - 1) / 2;

            td.stack[td.ply].excluded = Some(m);
            let mut sub_pv = PV::default();
            let value = negamax::<false>(
                td,
                tt,
                board,
                &mut sub_pv,
                singular_depth,
                singular_beta - 1,
                singular_beta,
                cut_node,
            );
            td.stack[td.ply].excluded = None;

            if td.halt() {
                return 0;
            }

            if value < singular_beta {
                let double_margin = 11 + 271 * i32::from(PV);
                let triple_margin = 94 + 287 * i32::from(PV) + 150 * i32::from(!td.stack[td.ply].tt_pv);
                extension = 1;
                if value < singular_beta - double_margin {
                    extension = 2;
                }
                if value < singular_beta - triple_margin {
                    extension = 3;
                }
            } else if value >= beta && !is_decisive(value) {
                return value;
            } else if tt_value >= beta {
                extension = -3;
            } else if cut_node {
                extension = -2;
            }
        }

        let mut next = *board;
        if !next.make_move(m) {
            continue;
        }
        tt.prefetch(next.zobrist_hash);
        move_count += 1;
        td.stack[td.ply].move_count = move_count;

        let stat_score = if is_quiet {
            td.history.stat_score(board, &td.stack, td.ply, m)
        } else {
            capt_hist
        };
        td.stack[td.ply].stat_score = stat_score;

        // The reduction for this child, assembled from the base table and the node's shape
        let mut r = td.lmr.reduction(improving, depth, move_count, beta - alpha, td.root_delta);
        if td.stack[td.ply].tt_pv {
            r += 946;
            if is_valid(tt_value) && tt_value > alpha {
                r -= 1183;
            }
            if PV {
                r -= 1013;
            }
        }
        r += 843;
        r -= 66 * move_count;
        if cut_node {
            r += 2864;
        }
        if tt_capture {
            r += 1030;
        }
        if td.stack[td.ply + 1].cutoff_cnt > 2 {
            r += 1114;
        }
        if Some(m) == tt_move {
            r -= 2000;
        }
        r -= td.stack[td.ply].stat_score * 794 / 8192;

        let new_depth = depth - 1 + extension;
        let pre_search_nodes = td.nodes.local_count();

        td.stack[td.ply].played_move = Some(m);
        td.stack[td.ply].capture = m.is_capture(board);
        td.nodes.increment();
        td.hash_history.push(next.zobrist_hash);
        td.ply += 1;

        let mut node_pv = PV::default();
        let mut value = -INFINITY;

        // Late move reductions, then the PVS ladder of re-searches
        if depth >= 2 && move_count > 1 {
            let d = (new_depth - r / 1024).clamp(1, new_depth + 2) + i32::from(PV);
            td.stack[td.ply].reduction = new_depth - d;
            value = -negamax::<false>(td, tt, &next, &mut node_pv, d, -alpha - 1, -alpha, true);
            td.stack[td.ply].reduction = 0;

            if value > alpha && d < new_depth {
                // A reduced fail-high decides between proving at full depth, one deeper, or
                // letting a marginal score stand a ply early
                let deeper = value > best_value + 43 + 2 * new_depth;
                let shallower = value < best_value + 9;
                let full_depth = new_depth + i32::from(deeper) - i32::from(shallower);
                if d < full_depth {
                    value =
                        -negamax::<false>(td, tt, &next, &mut node_pv, full_depth, -alpha - 1, -alpha, !cut_node);
                }
            }
        } else if !PV || move_count > 1 {
            value = -negamax::<false>(td, tt, &next, &mut node_pv, new_depth, -alpha - 1, -alpha, !cut_node);
        }

        if PV && (move_count == 1 || value > alpha) {
            node_pv.line.clear();
            value = -negamax::<true>(td, tt, &next, &mut node_pv, new_depth, -beta, -alpha, false);
        }

        td.ply -= 1;
        td.hash_history.pop();

        if td.halt() {
            return 0;
        }

        if is_root {
            let spent = td.nodes.local_count() - pre_search_nodes;
            let rm = td
                .root_moves
                .iter_mut()
                .find(|rm| rm.root_move() == m)
                .expect("searched root moves stay in the root list");
            rm.effort += spent;
            rm.average_score =
                if is_valid(rm.average_score) { (rm.average_score + value) / 2 } else { value };
            rm.mean_squared_score =
                (rm.mean_squared_score + i64::from(value) * i64::from(value.abs())) / 2;

            if move_count == 1 || value > alpha {
                rm.score = value;
                rm.uci_score = value;
                rm.sel_depth = td.sel_depth;
                rm.score_lowerbound = false;
                rm.score_upperbound = false;
                rm.pv.truncate(1);
                rm.pv.extend(node_pv.line.iter().copied());
                if move_count > 1 && td.pv_idx == 0 {
                    td.best_move_changes += 1.0;
                }
            } else {
                // Everything that is not the best line sinks, and the stable sort falls back
                // to the previous iteration's order
                rm.score = -INFINITY;
            }
        }

        if value > best_value {
            best_value = value;
            if value > alpha {
                best_move = Some(m);
                if PV && !is_root {
                    pv.update(m, &node_pv);
                }
                if value >= beta {
                    td.stack[td.ply].cutoff_cnt += 1;
                    break;
                }
                alpha = value;
                // A proven good move shrinks what is left to prove here
                if depth > 2 && depth < 14 && !is_decisive(value) {
                    depth -= 2;
                }
            }
        }

        if is_quiet {
            quiets_tried.push(m);
        } else {
            captures_tried.push(m);
        }
    }

    // Step 8: terminal states and statistics
    if move_count == 0 {
        return if excluded.is_some() {
            alpha
        } else if in_check {
            mated_in(td.ply)
        } else {
            DRAW
        };
    }

    if let Some(best) = best_move {
        let bonus = stat_bonus(original_depth, Some(best) == tt_move);
        let malus = stat_malus(original_depth);

        if best.is_quiet(board) {
            td.history.update_quiet(board, &td.stack, td.ply, best, bonus);
            for (i, &q) in quiets_tried.iter().filter(|&&q| q != best).enumerate() {
                td.history.update_quiet(board, &td.stack, td.ply, q, -(malus - 30 * i as i32));
            }
        } else {
            td.history.update_capt_hist(board, best, bonus);
        }
        for &c in captures_tried.iter().filter(|&&c| c != best) {
            td.history.update_capt_hist(board, c, -malus);
        }
    }

    // The correction history learns from the gap between what the search proved and what the
    // evaluator guessed, except where a bound makes the comparison meaningless
    let static_eval = td.stack[td.ply].static_eval;
    if !in_check
        && is_valid(static_eval)
        && !best_move.is_some_and(|m| m.is_capture(board))
        && !(best_value >= beta && best_value <= static_eval)
        && !(best_move.is_none() && best_value >= static_eval)
    {
        td.history.update_correction(board, &td.stack, td.ply, original_depth, best_value - static_eval);
    }

    // Step 9: the table write. Exclusion searches stay silent, and secondary multi-PV lines
    // must not clobber the primary line's entry.
    if excluded.is_none() && !(is_root && td.pv_idx > 0) {
        let bound = if best_value >= beta {
            Bound::Lower
        } else if PV && best_move.is_some() {
            Bound::Exact
        } else {
            Bound::Upper
        };
        tt.store(
            board.zobrist_hash,
            best_move,
            original_depth,
            bound,
            best_value,
            td.ply,
            td.stack[td.ply].tt_pv,
            raw_eval,
        );
    }

    best_value
}

/// Does the stored bound actually prove something about `value` relative to `threshold`?
fn bound_covers(bound: Bound, value: i32, threshold: i32) -> bool {
    match bound {
        Bound::None => false,
        Bound::Lower => value >= threshold,
        Bound::Upper => value <= threshold,
        Bound::Exact => true,
    }
}

/// Deep table cutoffs get a one-step look-ahead: play the stored move and require the child's
/// entry to agree that the score crosses beta. Fail-low cutoffs need no such proof.
fn verified_cutoff(
    td: &ThreadData,
    tt: &TranspositionTable,
    board: &Board,
    tt_move: Option<Move>,
    tt_value: i32,
    depth: i32,
    beta: i32,
) -> bool {
    if tt_value < beta || depth < 6 {
        return true;
    }
    let Some(m) = tt_move else { return true };
    let mut child = *board;
    if !child.make_move(m) {
        return false;
    }
    tt.probe(child.zobrist_hash, td.ply + 1, child.rule50_count()).is_some_and(|e| {
        is_valid(e.value) && -e.value >= beta && matches!(e.bound, Bound::Upper | Bound::Exact)
    })
}

fn futility_margin(depth: i32, improving: bool) -> i32 {
    (109 - 27 * i32::from(improving)) * depth
}

pub(crate) fn stat_bonus(depth: i32, is_tt_move: bool) -> i32 {
    (151 * depth - 91).min(1730) + 302 * i32::from(is_tt_move)
}

pub(crate) fn stat_malus(depth: i32) -> i32 {
    (951 * depth - 156).min(2468)
}

#[cfg(test)]
mod search_tests {
    use crate::board::fen::{build_board, STARTING_FEN};
    use crate::moves::movegenerator::MGT;
    use crate::search::thread::ThreadData;
    use crate::search::value::mate_in;
    use crate::search::SearchLimits;
    use crate::transposition::TranspositionTable;

    fn run_search(fen: &str, depth: i32) -> ThreadData<'static> {
        let board = build_board(fen);
        let tt = TranspositionTable::new(16);
        let mut td = ThreadData::test_instance();
        td.limits = SearchLimits::depth(depth);
        td.hash_history = vec![board.zobrist_hash];
        td.iterative_deepening(&board, &tt);
        td
    }

    #[test]
    fn finds_mate_in_one() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/2B1P3/5Q2/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
        let td = run_search(fen, 5);
        assert_eq!(td.stable_score, mate_in(1));
        assert_eq!(td.stable_pv[0].to_string(), "f3f7");

        // Mate soundness: replaying the PV reaches a mated side to move
        let mut board = build_board(fen);
        assert!(board.make_move(td.stable_pv[0]));
        assert!(board.in_check());
        let mated = board.generate_moves(MGT::All).iter().all(|e| {
            let mut next = board;
            !next.make_move(e.m)
        });
        assert!(mated);
    }

    #[test]
    fn startpos_stays_level() {
        let td = run_search(STARTING_FEN, 6);
        assert!(td.stable_score.abs() <= 200, "startpos score {}", td.stable_score);
        assert!(!td.stable_pv.is_empty());

        let board = build_board(STARTING_FEN);
        let legal = board.generate_moves(MGT::All);
        assert!(legal.iter().any(|e| e.m == td.stable_pv[0]));
    }

    #[test]
    fn wins_the_supported_promotion() {
        // King escorts the pawn in: decisively winning well within a dozen plies
        let td = run_search("3k4/3P4/3K4/8/8/8/8/8 w - - 0 1", 12);
        assert!(td.stable_score > 500, "promotion race scored {}", td.stable_score);
    }

    #[test]
    fn mated_and_stalemated_roots_have_no_moves() {
        let mated = run_search("r1bqkbnr/pppp1Qpp/2n5/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 3", 3);
        assert!(mated.root_moves.is_empty());
        assert!(mated.stable_pv.is_empty());

        let stalemated = run_search("8/8/8/8/8/3k4/3p4/3K4 w - - 0 1", 3);
        assert!(stalemated.root_moves.is_empty());
    }

    #[test]
    fn fixed_depth_search_is_deterministic() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let first = run_search(fen, 5);
        let second = run_search(fen, 5);
        assert_eq!(first.stable_score, second.stable_score);
        assert_eq!(first.stable_pv, second.stable_pv);
        assert_eq!(first.nodes.local_count(), second.nodes.local_count());
    }

    #[test]
    fn node_counts_grow_with_depth() {
        let shallow = run_search(STARTING_FEN, 4);
        let deep = run_search(STARTING_FEN, 6);
        assert!(deep.nodes.local_count() >= shallow.nodes.local_count());
    }
}
