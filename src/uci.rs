use itertools::Itertools;
use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::mpsc::{self, Sender};
use std::thread;

use crate::board::board::Board;
use crate::board::fen::{build_board, STARTING_FEN};
use crate::moves::moves::Move;
use crate::perft::perft;
use crate::search::game_time::TimeOptions;
use crate::search::lmr_table::LmrTable;
use crate::search::report::UciReporter;
use crate::search::thread::{SearchFlags, ThreadPool};
use crate::search::SearchLimits;
use crate::transposition::{TranspositionTable, DEFAULT_TT_MB};
use crate::types::pieces::Color;

const NAME: &str = "Cinder";
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct EngineOptions {
    threads: usize,
    multi_pv: usize,
    time: TimeOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { threads: 1, multi_pv: 1, time: TimeOptions::default() }
    }
}

/// The UCI driver. A dedicated thread owns stdin so that `stop`, `ponderhit` and `isready`
/// keep working while a search holds the main loop; everything else queues up behind the
/// search in arrival order.
pub fn main_loop() -> ! {
    let reporter = UciReporter;
    let flags = SearchFlags::default();
    let lmr = LmrTable::default();
    let global_nodes = AtomicU64::new(0);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel::<String>();
        let flags_ref = &flags;
        s.spawn(move || input_loop(&tx, flags_ref));

        let mut tt = TranspositionTable::new(DEFAULT_TT_MB);
        let mut pool = ThreadPool::new(&flags, &lmr, &global_nodes);
        let mut options = EngineOptions::default();
        let mut board = build_board(STARTING_FEN);
        let mut game_history = vec![board.zobrist_hash];

        for line in rx {
            let buffer: Vec<&str> = line.split_whitespace().collect();
            match buffer.first() {
                Some(&"uci") => {
                    println!("id name {NAME} {VERSION}");
                    println!("id author the {NAME} developers");
                    println!("option name Hash type spin default {DEFAULT_TT_MB} min 1 max 1048576");
                    println!("option name Threads type spin default 1 min 1 max 512");
                    println!("option name MultiPV type spin default 1 min 1 max 256");
                    println!("option name Ponder type check default false");
                    println!("option name Move Overhead type spin default 10 min 0 max 5000");
                    println!("option name Slow Mover type spin default 100 min 10 max 1000");
                    println!("option name Minimum Thinking Time type spin default 20 min 0 max 5000");
                    println!("option name Clear Hash type button");
                    println!("uciok");
                }
                Some(&"isready") => println!("readyok"),
                Some(&"ucinewgame") => {
                    tt.clear();
                    pool.reset();
                    board = build_board(STARTING_FEN);
                    game_history = vec![board.zobrist_hash];
                }
                Some(&"position") => parse_position(&buffer, &mut board, &mut game_history),
                Some(&"go") if buffer.get(1) == Some(&"perft") => {
                    let depth = buffer.get(2).and_then(|d| d.parse().ok()).unwrap_or(5);
                    perft(&board, depth);
                }
                Some(&"go") => {
                    let limits = parse_go(&buffer);
                    pool.go(&board, limits, &tt, &game_history, &options.time, options.multi_pv, &reporter);
                }
                Some(&"setoption") => {
                    parse_setoption(&buffer, &mut options, &mut tt, &mut pool, &lmr, &global_nodes);
                }
                Some(&"stop") => flags.stop(),
                Some(&"ponderhit") => flags.ponderhit(),
                Some(&"d") => print!("{board:?}"),
                Some(&"quit") => std::process::exit(0),
                Some(_) => println!("info string unknown command: {line}"),
                None => {}
            }
        }
        std::process::exit(0)
    })
}

/// Owns stdin. Search-control commands act on the shared flags immediately; the rest is handed
/// to the main loop.
fn input_loop(tx: &Sender<String>, flags: &SearchFlags) {
    loop {
        let mut line = String::new();
        let read = io::stdin().read_line(&mut line).unwrap_or(0);
        if read == 0 {
            // Stdin closed; tournament runners expect a clean exit
            std::process::exit(0);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let searching = flags.searching.load(std::sync::atomic::Ordering::Relaxed);
        match trimmed {
            "stop" if searching => flags.stop(),
            "ponderhit" if searching => flags.ponderhit(),
            "isready" if searching => println!("readyok"),
            "quit" => {
                flags.stop();
                std::process::exit(0);
            }
            _ => {
                if tx.send(trimmed.to_string()).is_err() {
                    return;
                }
            }
        }
    }
}

fn parse_position(buffer: &[&str], board: &mut Board, game_history: &mut Vec<u64>) {
    let moves_at = buffer.iter().position(|&t| t == "moves");
    match buffer.get(1) {
        Some(&"startpos") => *board = build_board(STARTING_FEN),
        Some(&"fen") => {
            let end = moves_at.unwrap_or(buffer.len());
            let fen = buffer[2..end].iter().join(" ");
            *board = build_board(&fen);
        }
        _ => return,
    }

    game_history.clear();
    game_history.push(board.zobrist_hash);

    if let Some(at) = moves_at {
        for token in &buffer[at + 1..] {
            let Some(m) = Move::from_uci(token, board) else { break };
            if !board.make_move(m) {
                break;
            }
            game_history.push(board.zobrist_hash);
        }
    }
}

fn parse_go(buffer: &[&str]) -> SearchLimits {
    let mut limits = SearchLimits::default();
    let mut iter = buffer.iter().skip(1);
    while let Some(&token) = iter.next() {
        let mut value = || iter.next().and_then(|v| v.parse::<u64>().ok());
        match token {
            "infinite" => limits.infinite = true,
            "ponder" => limits.ponder = true,
            "depth" => limits.depth = value().map(|v| v as i32),
            "nodes" => limits.nodes = value(),
            "movetime" => limits.movetime = value().map(std::time::Duration::from_millis),
            "wtime" => limits.remaining[Color::White] = value().map(std::time::Duration::from_millis),
            "btime" => limits.remaining[Color::Black] = value().map(std::time::Duration::from_millis),
            "winc" => limits.increment[Color::White] = value().map(std::time::Duration::from_millis),
            "binc" => limits.increment[Color::Black] = value().map(std::time::Duration::from_millis),
            "movestogo" => limits.moves_to_go = value().map(|v| v as u32),
            _ => {}
        }
    }
    limits
}

fn parse_setoption<'a>(
    buffer: &[&str],
    options: &mut EngineOptions,
    tt: &mut TranspositionTable,
    pool: &mut ThreadPool<'a>,
    lmr: &'a LmrTable,
    global_nodes: &'a std::sync::atomic::AtomicU64,
) {
    // setoption name <spaced name> [value <value>]
    let Some(name_at) = buffer.iter().position(|&t| t == "name") else { return };
    let value_at = buffer.iter().position(|&t| t == "value");
    let name = buffer[name_at + 1..value_at.unwrap_or(buffer.len())].iter().join(" ");
    let value = value_at.and_then(|at| buffer.get(at + 1)).copied();
    let spin = |default: u64| value.and_then(|v| v.parse::<u64>().ok()).unwrap_or(default);

    match name.as_str() {
        "Hash" => tt.resize(spin(DEFAULT_TT_MB as u64).max(1) as usize),
        "Clear Hash" => tt.clear(),
        "Threads" => {
            options.threads = spin(1).clamp(1, 512) as usize;
            pool.set_threads(options.threads, lmr, global_nodes);
        }
        "MultiPV" => options.multi_pv = spin(1).clamp(1, 256) as usize,
        "Move Overhead" => options.time.move_overhead = spin(10),
        "Slow Mover" => options.time.slow_mover = spin(100).max(1),
        "Minimum Thinking Time" => options.time.minimum_thinking_time = spin(20),
        // Pondering is driven entirely by `go ponder`; the check box exists so GUIs offer it
        "Ponder" => {}
        _ => println!("info string unknown option: {name}"),
    }
}

#[cfg(test)]
mod uci_tests {
    use super::*;

    #[test]
    fn go_parsing() {
        let limits = parse_go(&["go", "wtime", "60000", "btime", "55000", "winc", "1000", "binc", "1000"]);
        assert_eq!(limits.remaining[Color::White], Some(std::time::Duration::from_millis(60000)));
        assert_eq!(limits.increment[Color::Black], Some(std::time::Duration::from_millis(1000)));
        assert!(!limits.infinite);

        let limits = parse_go(&["go", "depth", "12"]);
        assert_eq!(limits.depth, Some(12));

        let limits = parse_go(&["go", "infinite"]);
        assert!(limits.infinite);
        assert!(!limits.has_clock());
    }

    #[test]
    fn position_parsing_applies_moves() {
        let mut board = build_board(STARTING_FEN);
        let mut history = vec![board.zobrist_hash];
        parse_position(
            &["position", "startpos", "moves", "e2e4", "e7e5", "g1f3"],
            &mut board,
            &mut history,
        );
        assert_eq!(history.len(), 4);
        assert_eq!(board.stm, Color::Black);
        assert_eq!(board.fullmove_number, 2);
    }

    #[test]
    fn position_parsing_reads_fen() {
        let mut board = build_board(STARTING_FEN);
        let mut history = Vec::new();
        parse_position(
            &["position", "fen", "4k3/8/8/8/8/8/4P3/4K3", "w", "-", "-", "0", "1"],
            &mut board,
            &mut history,
        );
        assert_eq!(board.to_fen(), "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1");
        assert_eq!(history.len(), 1);
    }
}
