//! Cell-grid decoding of a rectified marker patch.

use crate::MarkerPattern;
use cube_ar_core::{GrayImageView, Quad};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Which intensity counts as marker "ink" (the border color).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Black marker printed on a light background.
    #[default]
    DarkOnLight,
    /// Light marker on a dark background.
    LightOnDark,
}

impl Polarity {
    #[inline]
    pub fn is_ink(self, value: u8, threshold: u8) -> bool {
        match self {
            Polarity::DarkOnLight => value < threshold,
            Polarity::LightOnDark => value >= threshold,
        }
    }
}

/// Patch decoding settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    /// Per-pixel threshold applied to the sampled patch. Independent of the
    /// scene threshold because resampling changes brightness and contrast.
    pub marker_threshold: u8,
    /// A cell is ink when at least this fraction of its pixels is ink.
    pub cell_fill_ratio: f32,
    /// Fraction of the cell side ignored on each edge before averaging.
    pub cell_inset_frac: f32,
    pub polarity: Polarity,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            marker_threshold: 100,
            cell_fill_ratio: 0.5,
            cell_inset_frac: 0.2,
            polarity: Polarity::DarkOnLight,
        }
    }
}

/// An accepted patch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObservation {
    /// Clockwise quarter turns such that `observed == pattern.rotated_code(rotation)`.
    pub rotation: u8,
    /// Observed inner bits (row-major, ink = 1) in patch orientation.
    pub code: u64,
    /// Mean ink fraction over the border cells.
    pub border_ink: f32,
}

impl MarkerObservation {
    /// Re-index the sampled quad so that corner 0 is the pattern's top-left
    /// corner, followed clockwise by top-right, bottom-right, bottom-left.
    ///
    /// The pattern's top-left shows up at patch corner `rotation`, hence
    /// `out[k] = quad[(k + rotation) % 4]`.
    pub fn reorder(&self, quad: &Quad) -> Quad {
        quad.shifted(self.rotation as usize)
    }
}

/// Decoder for one fixed pattern; keeps its per-cell scratch between calls.
#[derive(Clone, Debug)]
pub struct MarkerDecoder {
    pattern: MarkerPattern,
    params: DecodeParams,
    cell_ink: Vec<f32>,
}

impl MarkerDecoder {
    pub fn new(pattern: MarkerPattern, params: DecodeParams) -> Self {
        let cells = pattern.grid_cells();
        Self {
            pattern,
            params,
            cell_ink: Vec::with_capacity(cells * cells),
        }
    }

    #[inline]
    pub fn pattern(&self) -> &MarkerPattern {
        &self.pattern
    }

    #[inline]
    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    pub fn set_params(&mut self, params: DecodeParams) {
        self.params = params;
    }

    /// Decode a square patch whose side spans the full bordered grid.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip(self, patch), fields(side = patch.width))
    )]
    pub fn decode(&mut self, patch: &GrayImageView<'_>) -> Option<MarkerObservation> {
        let cells = self.pattern.grid_cells();
        if patch.width < cells || patch.height < cells {
            return None;
        }
        measure_cell_ink(patch, cells, &self.params, &mut self.cell_ink);

        let ratio = self.params.cell_fill_ratio;
        let bits = self.pattern.size();
        let mut border_sum = 0.0f32;
        let mut border_total = 0u32;
        let mut code = 0u64;

        for cy in 0..cells {
            for cx in 0..cells {
                let ink = self.cell_ink[cy * cells + cx];
                let is_border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
                if is_border {
                    if ink < ratio {
                        log::trace!("border cell ({cx},{cy}) not inked ({ink:.2})");
                        return None;
                    }
                    border_sum += ink;
                    border_total += 1;
                } else if ink >= ratio {
                    code |= 1u64 << ((cy - 1) * bits + (cx - 1));
                }
            }
        }

        let rotation = self.pattern.match_rotation(code)?;
        Some(MarkerObservation {
            rotation,
            code,
            border_ink: border_sum / border_total.max(1) as f32,
        })
    }
}

/// One-shot decode of `patch` against `pattern`.
pub fn decode_patch(
    patch: &GrayImageView<'_>,
    pattern: &MarkerPattern,
    params: &DecodeParams,
) -> Option<MarkerObservation> {
    MarkerDecoder::new(*pattern, params.clone()).decode(patch)
}

/// Fraction of ink pixels inside the inset area of every grid cell,
/// row-major into `out`.
fn measure_cell_ink(
    patch: &GrayImageView<'_>,
    cells: usize,
    params: &DecodeParams,
    out: &mut Vec<f32>,
) {
    out.clear();
    let cw = patch.width as f32 / cells as f32;
    let ch = patch.height as f32 / cells as f32;
    let inset = params.cell_inset_frac.clamp(0.0, 0.45);

    let span = |c: usize, step: f32, limit: usize| {
        let lo = ((c as f32 + inset) * step).round() as usize;
        let hi = ((c as f32 + 1.0 - inset) * step).round() as usize;
        let lo = lo.min(limit.saturating_sub(1));
        (lo, hi.clamp(lo + 1, limit))
    };

    for cy in 0..cells {
        let (y0, y1) = span(cy, ch, patch.height);
        for cx in 0..cells {
            let (x0, x1) = span(cx, cw, patch.width);
            let mut ink = 0u32;
            let mut total = 0u32;
            for y in y0..y1 {
                let row = &patch.data[y * patch.width..(y + 1) * patch.width];
                for &v in &row[x0..x1] {
                    total += 1;
                    if params.polarity.is_ink(v, params.marker_threshold) {
                        ink += 1;
                    }
                }
            }
            out.push(ink as f32 / total.max(1) as f32);
        }
    }
}
