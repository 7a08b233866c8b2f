//! Cell-width sequences from block descriptions
//!
//! A block is `(cell_size, count)` for a uniform run of cells, or
//! `(cell_size, count, factor)` for a geometrically padded run whose k-th cell
//! (k = 1..=count) is `cell_size * |factor|^k`. A negative factor reverses the
//! padded run so it grows towards the left (the start of the axis).

use super::MeshError;
use serde::{Deserialize, Serialize};

/// One block of a width sequence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensorBlock {
    /// Base cell size (m)
    pub cell_size: f64,
    /// Number of cells in the block
    pub count: usize,
    /// Padding factor; `None` for a uniform block
    pub factor: Option<f64>,
}

impl TensorBlock {
    /// `count` cells of width `cell_size`
    #[must_use]
    pub fn uniform(cell_size: f64, count: usize) -> Self {
        Self {
            cell_size,
            count,
            factor: None,
        }
    }

    /// `count` cells growing by `factor`; negative factors grow leftwards
    #[must_use]
    pub fn padded(cell_size: f64, count: usize, factor: f64) -> Self {
        Self {
            cell_size,
            count,
            factor: Some(factor),
        }
    }

    fn widths(&self) -> Vec<f64> {
        match self.factor {
            None => vec![self.cell_size; self.count],
            Some(f) => {
                let growth = f.abs();
                let mut widths: Vec<f64> = (1..=self.count)
                    .map(|k| self.cell_size * growth.powi(k as i32))
                    .collect();
                if f < 0.0 {
                    widths.reverse();
                }
                widths
            }
        }
    }
}

/// Concatenate the widths of all blocks
///
/// # Errors
/// Returns error if a block has a non-positive cell size or a zero factor
pub fn mesh_tensor(blocks: &[TensorBlock]) -> Result<Vec<f64>, MeshError> {
    let mut widths = Vec::with_capacity(blocks.iter().map(|b| b.count).sum());
    for block in blocks {
        if !(block.cell_size.is_finite() && block.cell_size > 0.0) {
            return Err(MeshError::InvalidParameter {
                name: "cell_size",
                reason: format!("must be finite and positive, got {}", block.cell_size),
            });
        }
        if let Some(f) = block.factor {
            if !(f.is_finite() && f != 0.0) {
                return Err(MeshError::InvalidParameter {
                    name: "factor",
                    reason: format!("must be finite and non-zero, got {f}"),
                });
            }
        }
        widths.extend(block.widths());
    }
    Ok(widths)
}

/// Widths for a core of `n_core` cells padded by `n_pad` cells on both sides
///
/// # Errors
/// Returns error if `cell_size` or `factor` is invalid
pub fn padded_core(
    cell_size: f64,
    n_core: usize,
    n_pad: usize,
    factor: f64,
) -> Result<Vec<f64>, MeshError> {
    mesh_tensor(&[
        TensorBlock::padded(cell_size, n_pad, -factor),
        TensorBlock::uniform(cell_size, n_core),
        TensorBlock::padded(cell_size, n_pad, factor),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_block() {
        let h = mesh_tensor(&[TensorBlock::uniform(2.0, 3)]).unwrap();
        assert_eq!(h, vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_padding_grows_outward() {
        let h = padded_core(10.0, 4, 3, 1.5).unwrap();
        assert_eq!(h.len(), 10);
        assert_relative_eq!(h[0], 10.0 * 1.5f64.powi(3));
        assert_relative_eq!(h[2], 15.0);
        assert_relative_eq!(h[9], 10.0 * 1.5f64.powi(3));

        // left padding shrinks towards the core, right padding grows away from it
        assert!(h[..3].windows(2).all(|w| w[0] >= w[1]));
        assert!(h[7..].windows(2).all(|w| w[0] <= w[1]));
        assert!(h.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_zero_count_blocks_are_empty() {
        let h = padded_core(1.0, 0, 0, 2.0).unwrap();
        assert!(h.is_empty());
    }

    #[test]
    fn test_rejects_bad_blocks() {
        assert!(mesh_tensor(&[TensorBlock::uniform(0.0, 2)]).is_err());
        assert!(mesh_tensor(&[TensorBlock::padded(1.0, 2, 0.0)]).is_err());
        assert!(mesh_tensor(&[TensorBlock::uniform(f64::NAN, 2)]).is_err());
    }
}
