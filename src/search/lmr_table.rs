/// Base late move reduction amounts, expressed in 1024ths of a ply. Indexed once by depth and
/// once by move number, so reductions grow with the product of both logarithms.
pub struct LmrTable {
    reductions: [i32; 256],
}

impl Default for LmrTable {
    fn default() -> Self {
        let mut reductions = [0; 256];
        for (i, r) in reductions.iter_mut().enumerate().skip(1) {
            *r = (2809.0 / 128.0 * (i as f64).ln()).round() as i32;
        }
        Self { reductions }
    }
}

impl LmrTable {
    /// Scaled reduction for a move, before the per-move adjustments the search layers on top.
    /// A wide aspiration window (large `delta` relative to the root's) softens reductions, and
    /// not improving hardens them.
    pub fn reduction(&self, improving: bool, depth: i32, move_count: i32, delta: i32, root_delta: i32) -> i32 {
        let scale = self.reductions[depth.clamp(0, 255) as usize]
            * self.reductions[move_count.clamp(0, 255) as usize];
        scale - delta * 757 / root_delta.max(1) + i32::from(!improving) * scale * 218 / 512 + 1200
    }
}

#[cfg(test)]
mod lmr_tests {
    use super::*;

    #[test]
    fn reductions_grow_with_depth_and_move_count() {
        let lmr = LmrTable::default();
        let shallow = lmr.reduction(true, 4, 4, 10, 10);
        let deep = lmr.reduction(true, 16, 4, 10, 10);
        let late = lmr.reduction(true, 4, 30, 10, 10);
        assert!(deep > shallow);
        assert!(late > shallow);
    }

    #[test]
    fn not_improving_reduces_more() {
        let lmr = LmrTable::default();
        assert!(lmr.reduction(false, 8, 8, 10, 10) > lmr.reduction(true, 8, 8, 10, 10));
    }
}
