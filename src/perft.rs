use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::time::Instant;

use crate::board::board::Board;
use crate::moves::movegenerator::MGT;

/// Counts leaf nodes of the legal move tree, splitting the root across threads. Prints the
/// per-move breakdown the way GUIs and debugging scripts expect.
pub fn perft(board: &Board, depth: u32) -> u64 {
    let start = Instant::now();
    let count: u64 = board
        .generate_moves(MGT::All)
        .arr
        .to_vec()
        .into_par_iter()
        .filter_map(|entry| {
            let mut next = *board;
            if !next.make_move(entry.m) {
                return None;
            }
            let count = count_leaves(&next, depth - 1);
            println!("{}: {count}", entry.m);
            Some(count)
        })
        .sum();
    let elapsed = start.elapsed().as_secs_f64();
    println!("{count} nodes in {elapsed:.3} secs = {:.0} nps", count as f64 / elapsed);
    count
}

fn count_leaves(board: &Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut count = 0;
    for entry in board.generate_moves(MGT::All).iter() {
        let mut next = *board;
        if next.make_move(entry.m) {
            count += count_leaves(&next, depth - 1);
        }
    }
    count
}

#[cfg(test)]
mod perft_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};

    fn nodes(fen: &str, depth: u32) -> u64 {
        let board = build_board(fen);
        let mut count = 0;
        for entry in board.generate_moves(MGT::All).iter() {
            let mut next = board;
            if next.make_move(entry.m) {
                count += count_leaves(&next, depth - 1);
            }
        }
        count
    }

    #[test]
    fn startpos_counts() {
        assert_eq!(nodes(STARTING_FEN, 1), 20);
        assert_eq!(nodes(STARTING_FEN, 2), 400);
        assert_eq!(nodes(STARTING_FEN, 3), 8902);
        assert_eq!(nodes(STARTING_FEN, 4), 197_281);
    }

    #[test]
    fn kiwipete_counts() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        assert_eq!(nodes(fen, 1), 48);
        assert_eq!(nodes(fen, 2), 2039);
        assert_eq!(nodes(fen, 3), 97_862);
    }

    #[test]
    fn en_passant_and_promotion_tangle() {
        // Position 5 from the chessprogramming wiki perft suite
        let fen = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
        assert_eq!(nodes(fen, 1), 44);
        assert_eq!(nodes(fen, 2), 1486);
        assert_eq!(nodes(fen, 3), 62_379);
    }

    #[test]
    fn pin_heavy_position() {
        // Position 4 exercises discovered checks and pins
        let fen = "r2q1rk1/pP1p2pp/Q4n2/bbp1p3/Np6/1B3NBn/pPPP1PPP/R3K2R b KQ - 0 1";
        assert_eq!(nodes(fen, 1), 6);
        assert_eq!(nodes(fen, 2), 264);
        assert_eq!(nodes(fen, 3), 9467);
    }
}
