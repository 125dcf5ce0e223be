use std::time::Duration;

use crate::search::SearchLimits;
use crate::types::pieces::Color;

/// Time allocation for one move. `optimum` is the target the iterative deepening driver scales
/// by its stability heuristics; `maximum` is never exceeded while a forced reply exists.
#[derive(Copy, Clone, Debug, Default)]
pub struct Clock {
    pub optimum: Duration,
    pub maximum: Duration,
}

/// Knobs the host snapshots into the clock at `go` time
#[derive(Copy, Clone, Debug)]
pub struct TimeOptions {
    pub move_overhead: u64,
    pub minimum_thinking_time: u64,
    /// Percentage scale on the optimum; 100 is neutral
    pub slow_mover: u64,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self { move_overhead: 10, minimum_thinking_time: 20, slow_mover: 100 }
    }
}

impl Clock {
    /// Splits the remaining clock into optimum and maximum budgets for this move. With
    /// `moves_to_go` the budget leans on the coming control; otherwise it assumes a long
    /// remaining game and banks increment.
    pub fn for_move(limits: &SearchLimits, options: &TimeOptions, stm: Color, game_ply: u32) -> Option<Self> {
        if let Some(movetime) = limits.movetime {
            let fixed = movetime.saturating_sub(Duration::from_millis(options.move_overhead));
            return Some(Self { optimum: fixed, maximum: fixed });
        }

        let remaining = limits.remaining[stm]?;
        let increment = limits.increment[stm].unwrap_or(Duration::ZERO);

        let mtg = limits.moves_to_go.map_or(40, |m| m.clamp(1, 50)) as u64;
        let remaining_ms = remaining.as_millis() as u64;
        let increment_ms = increment.as_millis() as u64;

        // Budget the increment for every future move, then keep a GUI latency reserve
        let time_left = (remaining_ms + increment_ms * (mtg - 1))
            .saturating_sub(options.move_overhead * (2 + mtg))
            .max(1);

        // The early game deserves a larger slice than a long shuffle toward move 200
        let phase_scale = if game_ply < 40 { 120 } else { 100 };

        let optimum_ms = (time_left / mtg * options.slow_mover / 100 * phase_scale / 100)
            .max(options.minimum_thinking_time);
        let maximum_ms = (remaining_ms * 4 / 5)
            .saturating_sub(options.move_overhead)
            .max(1)
            .min(optimum_ms * 6);

        Some(Self {
            optimum: Duration::from_millis(optimum_ms.min(maximum_ms.max(1))),
            maximum: Duration::from_millis(maximum_ms.max(1)),
        })
    }
}

#[cfg(test)]
mod game_time_tests {
    use super::*;

    fn limits_with_clock(remaining_ms: u64, increment_ms: u64) -> SearchLimits {
        let mut limits = SearchLimits::default();
        limits.remaining[Color::White] = Some(Duration::from_millis(remaining_ms));
        limits.increment[Color::White] = Some(Duration::from_millis(increment_ms));
        limits
    }

    #[test]
    fn optimum_never_exceeds_maximum() {
        for (remaining, inc) in [(60_000, 0), (1_000, 100), (50, 0), (600_000, 5_000)] {
            let clock =
                Clock::for_move(&limits_with_clock(remaining, inc), &TimeOptions::default(), Color::White, 20)
                    .unwrap();
            assert!(clock.optimum <= clock.maximum, "{remaining}ms + {inc}ms inc");
            assert!(clock.maximum.as_millis() > 0);
        }
    }

    #[test]
    fn more_time_means_longer_budgets() {
        let short =
            Clock::for_move(&limits_with_clock(10_000, 0), &TimeOptions::default(), Color::White, 20).unwrap();
        let long =
            Clock::for_move(&limits_with_clock(300_000, 0), &TimeOptions::default(), Color::White, 20).unwrap();
        assert!(long.optimum > short.optimum);
    }

    #[test]
    fn movetime_is_taken_literally() {
        let mut limits = SearchLimits::default();
        limits.movetime = Some(Duration::from_millis(1000));
        let clock = Clock::for_move(&limits, &TimeOptions::default(), Color::White, 0).unwrap();
        assert_eq!(clock.optimum, clock.maximum);
        assert!(clock.maximum <= Duration::from_millis(1000));
    }

    #[test]
    fn no_clock_no_budget() {
        let limits = SearchLimits::default();
        assert!(Clock::for_move(&limits, &TimeOptions::default(), Color::White, 0).is_none());
    }
}
