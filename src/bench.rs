use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::board::fen::build_board;
use crate::search::game_time::TimeOptions;
use crate::search::lmr_table::LmrTable;
use crate::search::report::SilentReporter;
use crate::search::thread::{SearchFlags, ThreadPool};
use crate::search::SearchLimits;
use crate::transposition::TranspositionTable;

const BENCH_DEPTH: i32 = 9;

/// Positions spanning openings, tactical middlegames and thin endings, so the node count
/// reflects every part of the search
const BENCH_FENS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
    "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "r1bq1rk1/pp2bppp/2n2n2/3p4/3P4/2NBPN2/PP3PPP/R1BQK2R w KQ - 3 9",
    "2kr3r/ppp2ppp/2n1b3/2bqp3/8/2NP1N2/PPP1BPPP/R1BQ1RK1 w - - 4 9",
    "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
    "8/8/1p6/p1p5/P1P5/1P6/8/4K2k w - - 0 1",
    "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
    "3k4/3P4/3K4/8/8/8/8/8 w - - 0 1",
];

/// Fixed-depth sweep over the bench suite, printing the node count and speed the way openbench
/// style runners consume them
pub fn bench() {
    let reporter = SilentReporter;
    let flags = SearchFlags::default();
    let lmr = LmrTable::default();
    let global_nodes = AtomicU64::new(0);
    let tt = TranspositionTable::new(16);
    let mut pool = ThreadPool::new(&flags, &lmr, &global_nodes);

    let mut total_nodes = 0u64;
    let start = Instant::now();

    for fen in BENCH_FENS {
        let board = build_board(fen);
        tt.clear();
        pool.reset();
        pool.go(
            &board,
            SearchLimits::depth(BENCH_DEPTH),
            &tt,
            &[board.zobrist_hash],
            &TimeOptions::default(),
            1,
            &reporter,
        );
        total_nodes += global_nodes.load(Ordering::Relaxed);
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!("{total_nodes} nodes {:.0} nps", total_nodes as f64 / elapsed.max(f64::EPSILON));
}
