// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Row-major geometry of the six-dimensional toroidal lattice.

use ndarray::{ArrayView, ArrayViewD, IxDyn};

use crate::config::LATTICE_RANK;
use crate::error::LatticeResult;

/// Axis lengths and row-major strides of the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LatticeShape {
    dims: [usize; LATTICE_RANK],
    strides: [usize; LATTICE_RANK],
    total: usize,
}

impl LatticeShape {
    pub fn new(dims: [usize; LATTICE_RANK]) -> Self {
        let mut strides = [1usize; LATTICE_RANK];
        for axis in (0..LATTICE_RANK - 1).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }
        Self {
            dims,
            strides,
            total: dims.iter().product(),
        }
    }

    pub fn dims(&self) -> &[usize; LATTICE_RANK] {
        &self.dims
    }

    pub fn total_points(&self) -> usize {
        self.total
    }

    pub fn coords(&self, index: usize) -> [usize; LATTICE_RANK] {
        let mut out = [0usize; LATTICE_RANK];
        for axis in 0..LATTICE_RANK {
            out[axis] = (index / self.strides[axis]) % self.dims[axis];
        }
        out
    }

    /// Flat indices of the periodic neighbours `(coord - 1, coord + 1)` along `axis`.
    #[inline]
    pub fn neighbours(&self, index: usize, axis: usize) -> (usize, usize) {
        let dim = self.dims[axis];
        let stride = self.strides[axis];
        let coord = (index / stride) % dim;
        let prev = if coord == 0 {
            index + (dim - 1) * stride
        } else {
            index - stride
        };
        let next = if coord + 1 == dim {
            index - (dim - 1) * stride
        } else {
            index + stride
        };
        (prev, next)
    }

    /// Views a flat buffer as a six-dimensional array.
    pub fn view<'a, T>(&self, flat: &'a [T]) -> LatticeResult<ArrayViewD<'a, T>> {
        Ok(ArrayView::from_shape(IxDyn(&self.dims), flat)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coords_round_trip_through_strides() {
        let shape = LatticeShape::new([5, 5, 5, 5, 3, 3]);
        assert_eq!(shape.total_points(), 5625);
        let coords = shape.coords(5624);
        assert_eq!(coords, [4, 4, 4, 4, 2, 2]);
        assert_eq!(shape.coords(3), [0, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn neighbours_wrap_around_each_axis() {
        let shape = LatticeShape::new([5, 5, 5, 5, 3, 3]);
        assert_eq!(shape.neighbours(0, 5), (2, 1));
        assert_eq!(shape.neighbours(2, 5), (1, 0));
        assert_eq!(shape.neighbours(0, 0), (4 * 1125, 1125));
        let (prev, next) = shape.neighbours(4 * 1125, 0);
        assert_eq!((prev, next), (3 * 1125, 0));
    }

    #[test]
    fn singleton_axes_are_their_own_neighbours() {
        let shape = LatticeShape::new([16, 16, 1, 1, 1, 1]);
        assert_eq!(shape.neighbours(17, 3), (17, 17));
    }

    #[test]
    fn view_matches_row_major_layout() {
        let shape = LatticeShape::new([2, 1, 1, 1, 2, 3]);
        let flat: Vec<usize> = (0..shape.total_points()).collect();
        let view = shape.view(&flat).unwrap();
        assert_eq!(view.shape(), &[2, 1, 1, 1, 2, 3]);
        assert_eq!(view[&[1, 0, 0, 0, 1, 2][..]], 11);
    }
}
