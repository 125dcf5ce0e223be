use std::mem::size_of;
use std::sync::atomic::{AtomicI16, AtomicU16, AtomicU8, Ordering};

use crate::board::board::Board;
use crate::moves::moves::Move;
use crate::search::value::{value_from_tt, value_to_tt, VALUE_NONE};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Bound {
    #[default]
    None = 0,
    /// The stored value failed low: an upper bound on the true score
    Upper = 1,
    /// The stored value failed high: a lower bound on the true score
    Lower = 2,
    Exact = 3,
}

/// A probe result, decoded and ply-adjusted. Sixteen key bits mean occasional false hits, and
/// unsynchronised sharing means occasional torn field groups; every consumer validates what it
/// uses against the current board before acting on it.
#[derive(Clone, Copy)]
pub struct TableEntry {
    pub depth: i32,
    pub bound: Bound,
    pub value: i32,
    pub eval: i32,
    pub was_pv: bool,
    raw_move: u16,
}

impl TableEntry {
    pub fn best_move(&self, board: &Board) -> Option<Move> {
        Move::from_u16(self.raw_move, board).filter(|m| board.is_pseudo_legal(*m))
    }
}

/// Entries are ten bytes: three share a 32 byte cluster addressed by the upper bits of the
/// position key. Fields are individually atomic; a reader may see fields from two different
/// writes, which the probe-side validation tolerates.
#[repr(C)]
struct InternalEntry {
    key: AtomicU16,
    mv: AtomicU16,
    value: AtomicI16,
    eval: AtomicI16,
    depth: AtomicU8,
    /// `generation (5) | was_pv (1) | bound (2)`
    flags: AtomicU8,
}

const CLUSTER_SIZE: usize = 3;

#[repr(C)]
struct Cluster {
    entries: [InternalEntry; CLUSTER_SIZE],
    _padding: [u8; 2],
}

const _: () = assert!(size_of::<Cluster>() == 32);

const GENERATION_CYCLE: u8 = 32;
const BOUND_MASK: u8 = 0b11;
const PV_MASK: u8 = 0b100;

fn bound_of(flags: u8) -> Bound {
    match flags & BOUND_MASK {
        0 => Bound::None,
        1 => Bound::Upper,
        2 => Bound::Lower,
        _ => Bound::Exact,
    }
}

pub struct TranspositionTable {
    clusters: Box<[Cluster]>,
    generation: AtomicU8,
}

impl TranspositionTable {
    pub fn new(mb: usize) -> Self {
        let count = mb * 1024 * 1024 / size_of::<Cluster>();
        let mut clusters = Vec::with_capacity(count);
        clusters.resize_with(count, empty_cluster);
        Self { clusters: clusters.into_boxed_slice(), generation: AtomicU8::new(0) }
    }

    /// The pool drains all workers before calling this
    pub fn resize(&mut self, mb: usize) {
        *self = Self::new(mb);
    }

    pub fn clear(&self) {
        for cluster in self.clusters.iter() {
            for entry in &cluster.entries {
                entry.key.store(0, Ordering::Relaxed);
                entry.mv.store(0, Ordering::Relaxed);
                entry.value.store(VALUE_NONE as i16, Ordering::Relaxed);
                entry.eval.store(VALUE_NONE as i16, Ordering::Relaxed);
                entry.depth.store(0, Ordering::Relaxed);
                entry.flags.store(0, Ordering::Relaxed);
            }
        }
        self.generation.store(0, Ordering::Relaxed);
    }

    fn generation(&self) -> u8 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Called once per `go`; lets replacement prefer entries from the current search
    pub fn age_up(&self) {
        self.generation.store((self.generation() + 1) % GENERATION_CYCLE, Ordering::Relaxed);
    }

    fn cluster_index(&self, hash: u64) -> usize {
        ((u128::from(hash) * self.clusters.len() as u128) >> 64) as usize
    }

    pub fn prefetch(&self, hash: u64) {
        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_mm_prefetch, _MM_HINT_T0};
            let cluster = self.clusters.get_unchecked(self.cluster_index(hash));
            _mm_prefetch::<_MM_HINT_T0>((cluster as *const Cluster).cast());
        }
        #[cfg(not(target_arch = "x86_64"))]
        let _ = hash;
    }

    /// How far behind the current generation an entry's stamp is, in generations
    fn relative_age(&self, flags: u8) -> i32 {
        i32::from((GENERATION_CYCLE + self.generation() - (flags >> 3)) % GENERATION_CYCLE)
    }

    pub fn probe(&self, hash: u64, ply: i32, rule50: u8) -> Option<TableEntry> {
        let cluster = &self.clusters[self.cluster_index(hash)];
        let key = hash as u16;

        for entry in &cluster.entries {
            if entry.key.load(Ordering::Relaxed) != key {
                continue;
            }
            let flags = entry.flags.load(Ordering::Relaxed);
            return Some(TableEntry {
                depth: i32::from(entry.depth.load(Ordering::Relaxed)),
                bound: bound_of(flags),
                value: value_from_tt(i32::from(entry.value.load(Ordering::Relaxed)), ply, rule50),
                eval: i32::from(entry.eval.load(Ordering::Relaxed)),
                was_pv: flags & PV_MASK != 0,
                raw_move: entry.mv.load(Ordering::Relaxed),
            });
        }
        None
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        hash: u64,
        m: Option<Move>,
        depth: i32,
        bound: Bound,
        value: i32,
        ply: i32,
        is_pv: bool,
        eval: i32,
    ) {
        let cluster = &self.clusters[self.cluster_index(hash)];
        let key = hash as u16;

        // Prefer the slot already holding this position; otherwise evict the slot whose depth,
        // discounted by age, is least worth keeping
        let mut slot = &cluster.entries[0];
        let mut found = false;
        for entry in &cluster.entries {
            if entry.key.load(Ordering::Relaxed) == key {
                slot = entry;
                found = true;
                break;
            }
            let worth = |e: &InternalEntry| {
                i32::from(e.depth.load(Ordering::Relaxed))
                    - 8 * self.relative_age(e.flags.load(Ordering::Relaxed))
            };
            if worth(entry) < worth(slot) {
                slot = entry;
            }
        }

        let old_flags = slot.flags.load(Ordering::Relaxed);
        if found {
            // A shallower non-exact result never replaces an exact one for the same position
            if bound != Bound::Exact
                && bound_of(old_flags) == Bound::Exact
                && depth < i32::from(slot.depth.load(Ordering::Relaxed))
            {
                return;
            }
        }

        let was_pv = is_pv || (found && old_flags & PV_MASK != 0);
        let flags = (self.generation() << 3) | u8::from(was_pv) << 2 | bound as u8;

        let stored_value = if value == VALUE_NONE { VALUE_NONE } else { value_to_tt(value, ply) };

        slot.key.store(key, Ordering::Relaxed);
        if let Some(m) = m {
            slot.mv.store(m.as_u16(), Ordering::Relaxed);
        } else if !found {
            slot.mv.store(0, Ordering::Relaxed);
        }
        slot.value.store(stored_value as i16, Ordering::Relaxed);
        slot.eval.store(eval as i16, Ordering::Relaxed);
        slot.depth.store(depth.clamp(0, 255) as u8, Ordering::Relaxed);
        slot.flags.store(flags, Ordering::Relaxed);
    }

    /// Fraction of the table holding current-generation results, per mille, sampled from the
    /// front of the table
    pub fn hashfull(&self) -> usize {
        let sample = self.clusters.len().min(1000);
        self.clusters[..sample]
            .iter()
            .flat_map(|c| c.entries.iter())
            .filter(|e| {
                let flags = e.flags.load(Ordering::Relaxed);
                flags & BOUND_MASK != 0 && flags >> 3 == self.generation()
            })
            .count()
            / (CLUSTER_SIZE * sample / 1000).max(1)
    }
}

fn empty_cluster() -> Cluster {
    Cluster {
        entries: std::array::from_fn(|_| InternalEntry {
            key: AtomicU16::new(0),
            mv: AtomicU16::new(0),
            value: AtomicI16::new(VALUE_NONE as i16),
            eval: AtomicI16::new(VALUE_NONE as i16),
            depth: AtomicU8::new(0),
            flags: AtomicU8::new(0),
        }),
        _padding: [0; 2],
    }
}

pub const DEFAULT_TT_MB: usize = 16;

#[cfg(test)]
mod tt_tests {
    use super::*;
    use crate::board::fen::{build_board, STARTING_FEN};
    use crate::moves::moves::MoveType;
    use crate::search::value::mate_in;
    use crate::types::pieces::Piece;
    use crate::types::square::Square;

    #[test]
    fn store_and_probe() {
        let board = build_board(STARTING_FEN);
        let tt = TranspositionTable::new(16);
        assert!(tt.probe(board.zobrist_hash, 0, 0).is_none());

        let m = Move::new(Square(12), Square(28), MoveType::DoublePush, Piece::WhitePawn);
        tt.store(board.zobrist_hash, Some(m), 4, Bound::Exact, 25, 0, false, 17);

        let entry = tt.probe(board.zobrist_hash, 0, 0).unwrap();
        assert_eq!(entry.value, 25);
        assert_eq!(entry.eval, 17);
        assert_eq!(entry.depth, 4);
        assert_eq!(entry.bound, Bound::Exact);
        assert_eq!(entry.best_move(&board), Some(m));
    }

    #[test]
    fn mate_scores_shift_with_ply() {
        let tt = TranspositionTable::new(1);
        let m = Move::new(Square(12), Square(28), MoveType::Normal, Piece::WhiteQueen);

        // Mate in 15 plies discovered at ply 15: from the node it is mate in 0... plus the
        // distance back down when probed from ply 2
        tt.store(77, Some(m), 1, Bound::Exact, mate_in(15), 15, false, 0);
        let entry = tt.probe(77, 2, 0).unwrap();
        assert_eq!(entry.value, mate_in(2 + (15 - 15)));
    }

    #[test]
    fn exact_entries_resist_shallow_overwrites() {
        let tt = TranspositionTable::new(1);
        let m = Move::new(Square(1), Square(18), MoveType::Normal, Piece::WhiteKnight);

        tt.store(42, Some(m), 10, Bound::Exact, 50, 0, false, 50);
        tt.store(42, None, 3, Bound::Upper, -20, 0, false, -20);

        let entry = tt.probe(42, 0, 0).unwrap();
        assert_eq!(entry.value, 50);
        assert_eq!(entry.bound, Bound::Exact);
    }

    #[test]
    fn pv_flag_is_sticky() {
        let tt = TranspositionTable::new(1);
        tt.store(9, None, 5, Bound::Exact, 10, 0, true, 10);
        tt.store(9, None, 6, Bound::Lower, 30, 0, false, 10);
        assert!(tt.probe(9, 0, 0).unwrap().was_pv);
    }

    #[test]
    fn aging_discounts_old_entries() {
        let tt = TranspositionTable::new(1);
        tt.store(5, None, 20, Bound::Exact, 1, 0, false, 1);
        for _ in 0..4 {
            tt.age_up();
        }
        // The key has vanished from the replacement victim's perspective once a fresh store with
        // a colliding cluster needs the space; here just confirm the stamp arithmetic
        assert_eq!(tt.relative_age(tt.clusters[tt.cluster_index(5)].entries[0].flags.load(Ordering::Relaxed)), 4);
    }
}
