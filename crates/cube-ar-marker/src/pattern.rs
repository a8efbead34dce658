//! The one recognized marker identity and its rotation helpers.

use cube_ar_core::GrayImage;
use serde::{Deserialize, Serialize};

/// Largest supported inner grid (`8 × 8 = 64` bits).
pub const MAX_PATTERN_SIZE: usize = 8;

/// Inner bits of the built-in pattern, row-major, black = 1:
///
/// ```text
/// # . # #
/// . # . .
/// # # . #
/// . . # .
/// ```
const DEFAULT_CODE: u64 = 0x4b2d;
const DEFAULT_SIZE: usize = 4;

/// Pattern validation errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("pattern size must be in 1..={max} (got {size})", max = MAX_PATTERN_SIZE)]
    InvalidSize { size: usize },
    #[error("pattern row {row} has {got} cells, expected {expected}")]
    RowLength {
        row: usize,
        got: usize,
        expected: usize,
    },
    #[error("pattern cell '{cell}' is not one of '1', '#', '0', '.'")]
    InvalidCell { cell: char },
    #[error("pattern code {code:#x} has bits outside the {size}x{size} grid")]
    CodeOutOfRange { code: u64, size: usize },
    #[error("pattern is ambiguous: it matches itself after {rotation} quarter turn(s)")]
    Ambiguous { rotation: u8 },
}

/// A fixed `N × N` grid of binary cells surrounded by a one-cell ink border.
///
/// Bits are stored row-major (`idx = y * N + x`) with **black = 1**, the
/// same packing as ArUco dictionaries. Construction guarantees that the four
/// quarter-turn rotations of the code are pairwise distinct, so at most one
/// rotation can match an observed grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PatternSpec", into = "PatternSpec")]
pub struct MarkerPattern {
    size: usize,
    code: u64,
}

impl MarkerPattern {
    /// Validate and build a pattern from a packed code.
    pub fn new(size: usize, code: u64) -> Result<Self, PatternError> {
        if size == 0 || size > MAX_PATTERN_SIZE {
            return Err(PatternError::InvalidSize { size });
        }
        if code & !bit_mask(size) != 0 {
            return Err(PatternError::CodeOutOfRange { code, size });
        }
        for rotation in 1..4u8 {
            if rotate_code_u64(code, size, rotation) == code {
                return Err(PatternError::Ambiguous { rotation });
            }
        }
        Ok(Self { size, code })
    }

    /// Parse rows such as `"#.##"`; `'1'`/`'#'` are black, `'0'`/`'.'` white.
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Self, PatternError> {
        let size = rows.len();
        if size == 0 || size > MAX_PATTERN_SIZE {
            return Err(PatternError::InvalidSize { size });
        }
        let mut code = 0u64;
        for (y, row) in rows.iter().enumerate() {
            let cells: Vec<char> = row.as_ref().chars().filter(|c| !c.is_whitespace()).collect();
            if cells.len() != size {
                return Err(PatternError::RowLength {
                    row: y,
                    got: cells.len(),
                    expected: size,
                });
            }
            for (x, cell) in cells.into_iter().enumerate() {
                let black = match cell {
                    '1' | '#' => true,
                    '0' | '.' => false,
                    other => return Err(PatternError::InvalidCell { cell: other }),
                };
                if black {
                    code |= 1u64 << (y * size + x);
                }
            }
        }
        Self::new(size, code)
    }

    /// Inner bits per side.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Cells per side including the one-cell border.
    #[inline]
    pub fn grid_cells(&self) -> usize {
        self.size + 2
    }

    #[inline]
    pub fn code(&self) -> u64 {
        self.code
    }

    #[inline]
    pub fn bit(&self, x: usize, y: usize) -> bool {
        (self.code >> (y * self.size + x)) & 1 == 1
    }

    /// Code as it appears after `rotation` clockwise quarter turns.
    #[inline]
    pub fn rotated_code(&self, rotation: u8) -> u64 {
        rotate_code_u64(self.code, self.size, rotation)
    }

    /// Rotation `r` such that `observed == rotated_code(r)`, if any.
    pub fn match_rotation(&self, observed: u64) -> Option<u8> {
        (0..4u8).find(|&r| self.rotated_code(r) == observed)
    }

    /// Whether the full grid cell `(gx, gy)` (border included) is black.
    pub fn grid_cell_is_black(&self, gx: usize, gy: usize) -> bool {
        let cells = self.grid_cells();
        if gx == 0 || gy == 0 || gx + 1 == cells || gy + 1 == cells {
            return true;
        }
        self.bit(gx - 1, gy - 1)
    }

    /// Printable image of the marker, `cell_px` pixels per cell, with a
    /// white quiet zone of one cell on each side.
    pub fn render(&self, cell_px: usize) -> GrayImage {
        let cells = self.grid_cells();
        let side = (cells + 2) * cell_px;
        let mut img = GrayImage::filled(side, side, 255);
        for gy in 0..cells {
            for gx in 0..cells {
                if !self.grid_cell_is_black(gx, gy) {
                    continue;
                }
                for yy in 0..cell_px {
                    for xx in 0..cell_px {
                        img.set((gx + 1) * cell_px + xx, (gy + 1) * cell_px + yy, 0);
                    }
                }
            }
        }
        img
    }

    pub fn rows(&self) -> Vec<String> {
        (0..self.size)
            .map(|y| {
                (0..self.size)
                    .map(|x| if self.bit(x, y) { '#' } else { '.' })
                    .collect()
            })
            .collect()
    }
}

impl Default for MarkerPattern {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            code: DEFAULT_CODE,
        }
    }
}

/// Serialized form of a [`MarkerPattern`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternSpec {
    pub rows: Vec<String>,
}

impl TryFrom<PatternSpec> for MarkerPattern {
    type Error = PatternError;

    fn try_from(spec: PatternSpec) -> Result<Self, Self::Error> {
        MarkerPattern::from_rows(&spec.rows)
    }
}

impl From<MarkerPattern> for PatternSpec {
    fn from(p: MarkerPattern) -> Self {
        PatternSpec { rows: p.rows() }
    }
}

#[inline]
fn bit_mask(size: usize) -> u64 {
    let bits = size * size;
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Rotate a code stored in row-major bits (`idx = y * N + x`) by `rot`
/// clockwise quarter turns (x right, y down).
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    #[inline]
    fn get(code: u64, idx: usize) -> u64 {
        (code >> idx) & 1
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                0 => (x, y),
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            out |= get(code, sy * n + sx) << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let n = 8;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, n, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn quarter_turn_moves_top_left_to_top_right() {
        // Only the top-left bit set.
        let r = rotate_code_u64(1, 4, 1);
        assert_eq!(r, 1 << 3);
        let r = rotate_code_u64(1, 4, 2);
        assert_eq!(r, 1 << 15);
        let r = rotate_code_u64(1, 4, 3);
        assert_eq!(r, 1 << 12);
    }

    #[test]
    fn default_pattern_is_valid_and_matches_its_rows() {
        let p = MarkerPattern::default();
        assert_eq!(MarkerPattern::new(p.size(), p.code()), Ok(p));
        let parsed = MarkerPattern::from_rows(&["#.##", ".#..", "##.#", "..#."]).expect("rows");
        assert_eq!(parsed, p);
        assert_eq!(p.rows(), vec!["#.##", ".#..", "##.#", "..#."]);
    }

    #[test]
    fn symmetric_patterns_are_rejected_at_construction() {
        assert_eq!(
            MarkerPattern::new(4, 0),
            Err(PatternError::Ambiguous { rotation: 1 })
        );
        // Corner blocks: invariant under a half turn only.
        let err = MarkerPattern::from_rows(&["##..", "....", "....", "..##"]).unwrap_err();
        assert_eq!(err, PatternError::Ambiguous { rotation: 2 });
    }

    #[test]
    fn malformed_definitions_are_rejected() {
        assert_eq!(
            MarkerPattern::new(9, 1),
            Err(PatternError::InvalidSize { size: 9 })
        );
        assert!(matches!(
            MarkerPattern::new(2, 0x10),
            Err(PatternError::CodeOutOfRange { .. })
        ));
        assert!(matches!(
            MarkerPattern::from_rows(&["#.", "x."]),
            Err(PatternError::InvalidCell { cell: 'x' })
        ));
        assert!(matches!(
            MarkerPattern::from_rows(&["#.#", ".."]),
            Err(PatternError::RowLength { row: 0, .. })
        ));
    }

    #[test]
    fn every_rotation_matches_exactly_once() {
        let p = MarkerPattern::default();
        for r in 0..4u8 {
            assert_eq!(p.match_rotation(p.rotated_code(r)), Some(r));
        }
        assert_eq!(p.match_rotation(p.code() ^ 1), None);
    }

    #[test]
    fn serde_round_trips_through_rows() {
        let p = MarkerPattern::default();
        let json = serde_json::to_string(&p).expect("serialize");
        assert!(json.contains("#.##"));
        let back: MarkerPattern = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, p);

        let bad = r#"{"rows":["....","....","....","...."]}"#;
        assert!(serde_json::from_str::<MarkerPattern>(bad).is_err());
    }

    #[test]
    fn render_draws_border_and_quiet_zone() {
        let p = MarkerPattern::default();
        let img = p.render(2);
        assert_eq!(img.width, 16);
        assert_eq!(img.get(0, 0), 255);
        assert_eq!(img.get(2, 2), 0);
        // Inner (0,0) is black, inner (1,0) white.
        assert_eq!(img.get(4, 4), 0);
        assert_eq!(img.get(6, 4), 255);
    }
}
