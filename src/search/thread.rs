use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::board::board::Board;
use crate::eval::evaluate;
use crate::moves::movegenerator::MGT;
use crate::moves::moves::Move;
use crate::search::game_time::{Clock, TimeOptions};
use crate::search::history::HistoryTable;
use crate::search::lmr_table::LmrTable;
use crate::search::report::{IterationInfo, SearchReporter};
use crate::search::search::aspiration_search;
use crate::search::value::{is_valid, mated_in, DRAW, MAX_PLY, VALUE_NONE};
use crate::search::{RootMove, SearchLimits, SearchStack};
use crate::transposition::TranspositionTable;

/// Cross-thread coordination bits. `halt` is the only signal the hot search loop polls;
/// the ponder pair defers stop decisions while the GUI has us thinking on the opponent's time.
#[derive(Default)]
pub struct SearchFlags {
    pub halt: AtomicBool,
    pub ponder: AtomicBool,
    pub stop_on_ponderhit: AtomicBool,
    pub searching: AtomicBool,
}

impl SearchFlags {
    /// Converts the ponder search into a live one, releasing any deferred stop
    pub fn ponderhit(&self) {
        if self.stop_on_ponderhit.load(Ordering::Relaxed) {
            self.halt.store(true, Ordering::Relaxed);
        }
        self.ponder.store(false, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.halt.store(true, Ordering::Relaxed);
        self.ponder.store(false, Ordering::Relaxed);
    }
}

/// Node counter that batches updates into a shared global, so the hot loop touches the atomic
/// once every thousand nodes instead of every node
pub struct AtomicCounter<'a> {
    global_nodes: &'a AtomicU64,
    local_nodes: u64,
    batch: u64,
}

const BATCH_SIZE: u64 = 1024;

impl<'a> AtomicCounter<'a> {
    const fn new(global_nodes: &'a AtomicU64) -> Self {
        Self { global_nodes, local_nodes: 0, batch: 0 }
    }

    pub fn global_count(&self) -> u64 {
        self.global_nodes.load(Ordering::Relaxed) + self.batch
    }

    pub const fn local_count(&self) -> u64 {
        self.local_nodes + self.batch
    }

    pub fn increment(&mut self) {
        self.batch += 1;
        if self.batch >= BATCH_SIZE {
            self.local_nodes += self.batch;
            self.global_nodes.fetch_add(self.batch, Ordering::Relaxed);
            self.batch = 0;
        }
    }

    pub fn reset(&mut self) {
        self.batch = 0;
        self.local_nodes = 0;
        self.global_nodes.store(0, Ordering::Relaxed);
    }

    /// True once per batch rollover; the main thread checks the clock on this cadence
    pub const fn check_time(&self) -> bool {
        self.batch == 0
    }
}

/// Everything one search thread owns: its stack, histories, root move scoreboard and limits.
/// Only the transposition table is shared with the other workers.
pub struct ThreadData<'a> {
    pub thread_idx: usize,
    pub ply: i32,
    pub sel_depth: i32,
    pub root_depth: i32,
    pub completed_depth: i32,
    pub nmp_min_ply: i32,
    pub root_delta: i32,
    pub pv_idx: usize,
    pub multi_pv: usize,
    pub optimism: [i32; 2],
    pub root_moves: Vec<RootMove>,
    pub(crate) stack: SearchStack,
    pub history: HistoryTable,
    pub hash_history: Vec<u64>,
    pub nodes: AtomicCounter<'a>,
    pub lmr: &'a LmrTable,
    pub flags: &'a SearchFlags,
    pub limits: SearchLimits,
    pub clock: Option<Clock>,
    pub search_start: Instant,

    // Time-management state the driver accumulates across iterations and searches
    pub best_move_changes: f64,
    pub previous_time_reduction: f64,
    latest_time_reduction: f64,
    pub previous_average: i32,
    iter_value: i32,
    last_best_move: Option<Move>,
    last_best_move_depth: i32,

    /// PV and score of the last fully completed iteration; what the pool actually plays
    pub stable_pv: Vec<Move>,
    pub stable_score: i32,

    pub reporter: Option<&'a dyn SearchReporter>,
    last_bound_report: Option<Instant>,
}

impl<'a> ThreadData<'a> {
    pub fn new(
        thread_idx: usize,
        flags: &'a SearchFlags,
        lmr: &'a LmrTable,
        global_nodes: &'a AtomicU64,
    ) -> Self {
        Self {
            thread_idx,
            ply: 0,
            sel_depth: 0,
            root_depth: 0,
            completed_depth: 0,
            nmp_min_ply: 0,
            root_delta: 1,
            pv_idx: 0,
            multi_pv: 1,
            optimism: [0; 2],
            root_moves: Vec::new(),
            stack: SearchStack::default(),
            history: HistoryTable::default(),
            hash_history: Vec::new(),
            nodes: AtomicCounter::new(global_nodes),
            lmr,
            flags,
            limits: SearchLimits::default(),
            clock: None,
            search_start: Instant::now(),
            best_move_changes: 0.0,
            previous_time_reduction: 1.0,
            latest_time_reduction: 1.0,
            previous_average: VALUE_NONE,
            iter_value: VALUE_NONE,
            last_best_move: None,
            last_best_move_depth: 0,
            stable_pv: Vec::new(),
            stable_score: -crate::search::value::INFINITY,
            reporter: None,
            last_bound_report: None,
        }
    }

    pub fn main_thread(&self) -> bool {
        self.thread_idx == 0
    }

    pub fn halt(&self) -> bool {
        self.flags.halt.load(Ordering::Relaxed)
    }

    pub fn set_halt(&self, v: bool) {
        self.flags.halt.store(v, Ordering::Relaxed);
    }

    /// Static eval colored by the aspiration driver's optimism for the mover
    pub fn evaluate(&self, board: &Board) -> i32 {
        evaluate(board, self.optimism[board.stm])
    }

    /// Draws inside the tree carry one centipawn of node-count noise, so lines that force a
    /// repetition and lines that merely allow one stop looking identical
    pub fn draw_value(&self) -> i32 {
        (self.nodes.local_count() as i32 & 2) - 1
    }

    /// Has this position occurred before, in the game or above us in the tree? One occurrence
    /// is enough: whoever can force the first repetition can force the third.
    pub fn is_repetition(&self, board: &Board) -> bool {
        let len = self.hash_history.len();
        if len < 5 {
            return false;
        }
        self.hash_history[..len - 1]
            .iter()
            .rev()
            .take(board.rule50_count() as usize + 1)
            .skip(1)
            .step_by(2)
            .any(|&h| h == board.zobrist_hash)
    }

    /// Hard limits polled from the search hot loop on each counter rollover. Main thread only;
    /// the helpers follow through the shared halt flag.
    pub fn check_hard_stop(&mut self) -> bool {
        if let Some(n) = self.limits.nodes {
            if self.nodes.global_count() >= n {
                self.set_halt(true);
                return true;
            }
        }
        // Stop decisions wait while the GUI has us pondering
        if self.flags.ponder.load(Ordering::Relaxed) {
            return false;
        }
        if let Some(clock) = self.clock {
            if self.completed_depth >= 1 && self.search_start.elapsed() >= clock.maximum {
                self.set_halt(true);
                return true;
            }
        }
        false
    }

    /// Iterative deepening: each depth seeds the next through the transposition table, the
    /// history stores and the root move ordering, so the expensive depths start half-solved
    pub fn iterative_deepening(&mut self, board: &Board, tt: &TranspositionTable) {
        self.search_start = Instant::now();
        self.ply = 0;
        self.sel_depth = 0;
        self.root_depth = 0;
        self.completed_depth = 0;
        self.nmp_min_ply = 0;
        self.optimism = [0; 2];
        self.stack = SearchStack::default();
        self.best_move_changes = 0.0;
        self.iter_value = VALUE_NONE;
        self.last_best_move = None;
        self.last_best_move_depth = 0;
        self.last_bound_report = None;
        self.stable_pv.clear();
        self.stable_score = -crate::search::value::INFINITY;

        self.root_moves = legal_root_moves(board);
        if self.root_moves.is_empty() {
            // Mated or stalemated: nothing to search and no move to play, but the host still
            // deserves a score line
            if self.main_thread() {
                if let Some(reporter) = self.reporter {
                    let score = if board.in_check() { mated_in(0) } else { DRAW };
                    reporter.on_update_full(&IterationInfo {
                        depth: 0,
                        sel_depth: 0,
                        multipv: 1,
                        score,
                        lowerbound: false,
                        upperbound: false,
                        nodes: 0,
                        nps: 0,
                        time_ms: 0,
                        hashfull: 0,
                        pv: &[],
                    });
                }
            }
            return;
        }
        self.multi_pv = self.multi_pv.clamp(1, self.root_moves.len());

        while self.root_depth < MAX_PLY - 1 && !self.halt() {
            self.root_depth += 1;

            for rm in &mut self.root_moves {
                rm.previous_score = rm.score;
            }

            for pv_idx in 0..self.multi_pv {
                self.pv_idx = pv_idx;
                self.sel_depth = 0;
                aspiration_search(self, tt, board);
                if self.halt() {
                    break;
                }
                // Lines already finished this iteration stay ranked above the one just found
                self.sort_root_moves(0);
            }

            if !self.halt() {
                self.completed_depth = self.root_depth;
                self.stable_pv = self.root_moves[0].pv.clone();
                self.stable_score = self.root_moves[0].score;
            }

            let best_now = self.root_moves[0].root_move();
            if Some(best_now) != self.last_best_move {
                self.last_best_move = Some(best_now);
                self.last_best_move_depth = self.root_depth;
            }

            self.report_iteration(tt);

            if self.limits.depth.is_some_and(|d| self.root_depth >= d) {
                if self.main_thread() {
                    self.set_halt(true);
                }
                break;
            }

            if self.main_thread() && !self.halt() && self.should_stop_soft() {
                // A pondering search finishes its thought only when the GUI converts it
                if self.flags.ponder.load(Ordering::Relaxed) {
                    self.flags.stop_on_ponderhit.store(true, Ordering::Relaxed);
                } else {
                    self.set_halt(true);
                }
            }

            self.iter_value = self.root_moves[0].score;
            self.best_move_changes *= 0.5;
        }

        // An infinite search only answers once told to stop, even after hitting the depth wall
        if self.main_thread() && self.limits.infinite {
            while !self.halt() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        if self.main_thread() {
            self.previous_average = self.root_moves[0].average_score;
            self.previous_time_reduction = self.latest_time_reduction;
        }
    }

    /// The soft stop decision of the time manager: scale the optimum by how fast the eval is
    /// falling, how long the best move has been stable, and how often it has flipped
    fn should_stop_soft(&mut self) -> bool {
        if self.limits.infinite || !self.limits.has_clock() {
            return false;
        }
        let Some(clock) = self.clock else { return false };

        let best_value = self.root_moves[0].score;
        let prev_avg = if is_valid(self.previous_average) { self.previous_average } else { best_value };
        let prev_iter = if is_valid(self.iter_value) { self.iter_value } else { best_value };

        let falling_eval = ((11.325
            + 2.115 * f64::from(prev_avg - best_value)
            + 0.987 * f64::from(prev_iter - best_value))
            / 100.0)
            .clamp(0.569, 1.57);

        let stability = f64::from(self.completed_depth - self.last_best_move_depth);
        let time_reduction = 0.723 + 0.79 / (1.104 + (-0.5189 * (stability - 11.57)).exp());
        self.latest_time_reduction = time_reduction;

        let instability = 1.04 + 1.8956 * self.best_move_changes;

        let mut total_time = clock.optimum.as_millis() as f64
            * falling_eval
            * (1.455 + self.previous_time_reduction)
            / (2.2375 * time_reduction)
            * instability;
        if self.root_moves.len() == 1 {
            total_time = total_time.min(502.0);
        }
        total_time = total_time.min(clock.maximum.as_millis() as f64);

        let elapsed = self.search_start.elapsed().as_millis() as f64;
        if elapsed > total_time {
            return true;
        }

        // Nearly all effort on one move for a while means the verdict is in
        let effort = self.root_moves[0].effort as f64 / self.nodes.global_count().max(1) as f64;
        self.completed_depth >= 10 && effort >= 0.924 && elapsed > 0.666 * total_time
    }

    /// Stable sort keeps this iteration's scores primary and last iteration's order as the tie
    /// break, which is what keeps the root move ordering steady between iterations
    pub fn sort_root_moves(&mut self, from: usize) {
        self.root_moves[from..]
            .sort_by(|a, b| (b.score, b.previous_score).cmp(&(a.score, a.previous_score)));
    }

    /// Aspiration fail-highs and fail-lows report progress, but only once the search has run
    /// long enough to be interesting and never more than a few times a second
    pub fn report_bound_line(&mut self) {
        if !self.main_thread() || self.reporter.is_none() {
            return;
        }
        let elapsed = self.search_start.elapsed();
        if elapsed < Duration::from_millis(3000) && self.nodes.global_count() < 8_000_000 {
            return;
        }
        if self.last_bound_report.is_some_and(|last| last.elapsed() < Duration::from_millis(200)) {
            return;
        }
        self.last_bound_report = Some(Instant::now());
        self.emit_pv_line(self.pv_idx, None);
    }

    fn report_iteration(&mut self, tt: &TranspositionTable) {
        if !self.main_thread() {
            return;
        }
        let Some(reporter) = self.reporter else { return };
        for i in 0..self.multi_pv {
            self.emit_pv_line(i, Some(tt));
        }
        reporter.on_iter(self.root_depth, self.nodes.global_count());
    }

    fn emit_pv_line(&self, idx: usize, tt: Option<&TranspositionTable>) {
        let Some(reporter) = self.reporter else { return };
        let rm = &self.root_moves[idx];
        let nodes = self.nodes.global_count();
        let time_ms = self.search_start.elapsed().as_millis();
        let info = IterationInfo {
            depth: self.root_depth,
            sel_depth: rm.sel_depth.max(1),
            multipv: idx + 1,
            score: rm.uci_score,
            lowerbound: rm.score_lowerbound,
            upperbound: rm.score_upperbound,
            nodes,
            nps: (nodes as u128 * 1000 / time_ms.max(1)) as u64,
            time_ms,
            hashfull: tt.map_or(0, TranspositionTable::hashfull),
            pv: &rm.pv,
        };
        reporter.on_update_full(&info);
    }

    #[cfg(test)]
    pub fn test_instance() -> ThreadData<'static> {
        let flags = Box::leak(Box::new(SearchFlags::default()));
        let lmr = Box::leak(Box::new(LmrTable::default()));
        let nodes = Box::leak(Box::new(AtomicU64::new(0)));
        ThreadData::new(0, flags, lmr, nodes)
    }
}

fn legal_root_moves(board: &Board) -> Vec<RootMove> {
    board
        .generate_moves(MGT::All)
        .iter()
        .filter(|entry| {
            let mut next = *board;
            next.make_move(entry.m)
        })
        .map(|entry| RootMove::new(entry.m))
        .collect()
}

/// Lazy SMP: every worker searches the same root independently, sharing only the transposition
/// table and the halt flag. The main worker drives the clock; the pool arbitrates the final
/// answer between threads when the search stops.
pub struct ThreadPool<'a> {
    pub main: ThreadData<'a>,
    pub workers: Vec<ThreadData<'a>>,
    flags: &'a SearchFlags,
}

impl<'a> ThreadPool<'a> {
    pub fn new(flags: &'a SearchFlags, lmr: &'a LmrTable, global_nodes: &'a AtomicU64) -> Self {
        Self { main: ThreadData::new(0, flags, lmr, global_nodes), workers: Vec::new(), flags }
    }

    /// The main thread counts as one; `threads - 1` helpers are (re)created on top of it
    pub fn set_threads(&mut self, threads: usize, lmr: &'a LmrTable, global_nodes: &'a AtomicU64) {
        self.workers.clear();
        for idx in 1..threads.max(1) {
            self.workers.push(ThreadData::new(idx, self.flags, lmr, global_nodes));
        }
    }

    /// `ucinewgame`: forget everything learned from the previous game
    pub fn reset(&mut self) {
        for td in std::iter::once(&mut self.main).chain(self.workers.iter_mut()) {
            td.history = HistoryTable::default();
            td.nodes.reset();
            td.previous_average = VALUE_NONE;
            td.previous_time_reduction = 1.0;
            td.stable_pv.clear();
        }
        self.flags.halt.store(false, Ordering::Relaxed);
    }

    /// Runs a full search and reports the best move. Blocks until the search completes; `stop`
    /// and `ponderhit` arrive through the shared flags from the input thread.
    #[allow(clippy::too_many_arguments)]
    pub fn go(
        &mut self,
        board: &Board,
        limits: SearchLimits,
        tt: &TranspositionTable,
        game_history: &[u64],
        time_options: &TimeOptions,
        multi_pv: usize,
        reporter: &'a dyn SearchReporter,
    ) {
        self.flags.halt.store(false, Ordering::Relaxed);
        self.flags.stop_on_ponderhit.store(false, Ordering::Relaxed);
        self.flags.ponder.store(limits.ponder, Ordering::Relaxed);
        self.flags.searching.store(true, Ordering::Relaxed);

        tt.age_up();

        let game_ply = u32::from(board.fullmove_number.saturating_sub(1)) * 2;
        let clock = Clock::for_move(&limits, time_options, board.stm, game_ply);

        for td in std::iter::once(&mut self.main).chain(self.workers.iter_mut()) {
            td.limits = limits;
            td.clock = clock;
            td.multi_pv = multi_pv;
            td.hash_history = game_history.to_vec();
            td.nodes.reset();
            td.reporter = None;
        }
        self.main.reporter = Some(reporter);

        std::thread::scope(|s| {
            let b = *board;
            for td in &mut self.workers {
                // The stack holds a board copy and a move picker per ply, so give the workers
                // room for a full-depth line
                std::thread::Builder::new()
                    .stack_size(8 * 1024 * 1024)
                    .spawn_scoped(s, move || td.iterative_deepening(&b, tt))
                    .expect("failed to spawn search thread");
            }
            self.main.iterative_deepening(board, tt);
            self.flags.halt.store(true, Ordering::Relaxed);
        });

        // A pondering search holds its answer until the GUI converts or cancels it
        while self.flags.ponder.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(1));
        }

        let (best, ponder) = self.select_best_thread();
        reporter.on_bestmove(best, ponder);
        self.flags.searching.store(false, Ordering::Relaxed);
    }

    /// Ranks threads by score, breaking ties toward the deepest completed iteration, per the
    /// rule that a thread sharing the best score but having seen further is the better witness
    fn select_best_thread(&self) -> (Option<Move>, Option<Move>) {
        if self.main.root_moves.is_empty() {
            return (None, None);
        }

        let mut best = &self.main;
        for td in &self.workers {
            if td.root_moves.is_empty() || td.completed_depth == 0 {
                continue;
            }
            if (td.stable_score, td.completed_depth) > (best.stable_score, best.completed_depth) {
                best = td;
            }
        }

        let pv: &[Move] =
            if best.stable_pv.is_empty() { &best.root_moves[0].pv } else { &best.stable_pv };
        (pv.first().copied(), pv.get(1).copied())
    }
}

#[cfg(test)]
mod thread_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};

    #[test]
    fn repetition_detected_through_hash_history() {
        let mut td = ThreadData::test_instance();
        let mut board = build_board(STARTING_FEN);
        td.hash_history.push(board.zobrist_hash);

        // Shuffle knights out and back; the fourth move restores the start position's hash
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let m = Move::from_uci(uci, &board).unwrap();
            assert!(board.make_move(m));
            td.hash_history.push(board.zobrist_hash);
        }

        assert!(td.is_repetition(&board));
    }

    #[test]
    fn no_false_repetition_on_fresh_positions() {
        let mut td = ThreadData::test_instance();
        let mut board = build_board(STARTING_FEN);
        td.hash_history.push(board.zobrist_hash);
        for uci in ["e2e4", "e7e5", "g1f3", "b8c6"] {
            let m = Move::from_uci(uci, &board).unwrap();
            assert!(board.make_move(m));
            td.hash_history.push(board.zobrist_hash);
        }
        assert!(!td.is_repetition(&board));
    }

    #[test]
    fn root_moves_are_legal_only() {
        // White king in check from the queen on c3: four safe king squares, nothing else
        let board = build_board("4k3/8/8/8/8/2q5/8/4K3 w - - 0 1");
        let root_moves = legal_root_moves(&board);
        assert!(root_moves.iter().all(|rm| {
            let mut next = board;
            next.make_move(rm.root_move())
        }));
        assert_eq!(root_moves.len(), 4);
    }

    #[test]
    fn checkmate_has_no_root_moves() {
        let board = build_board("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3");
        assert!(board.in_check());
        assert!(legal_root_moves(&board).is_empty());
    }

    #[test]
    fn multipv_lines_are_distinct_and_ordered() {
        let board = build_board(STARTING_FEN);
        let tt = crate::transposition::TranspositionTable::new(16);
        let mut td = ThreadData::test_instance();
        td.limits = SearchLimits::depth(4);
        td.multi_pv = 3;
        td.hash_history = vec![board.zobrist_hash];
        td.iterative_deepening(&board, &tt);

        let leads: Vec<Move> = td.root_moves[..3].iter().map(RootMove::root_move).collect();
        assert!(leads[0] != leads[1] && leads[1] != leads[2] && leads[0] != leads[2]);
        assert!(td.root_moves[0].score >= td.root_moves[1].score);
        assert!(td.root_moves[1].score >= td.root_moves[2].score);
    }
}
