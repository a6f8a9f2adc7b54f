use std::fmt::{Display, Formatter};

use itertools::Itertools;
use strata_error::{StrataResult, strata_bail, strata_err};

/// A sparse index paired with its weight.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightedIndex {
    /// Position in the sparse dimension.
    pub index: u32,
    /// Weight attached to the position.
    pub weight: f32,
}

impl WeightedIndex {
    /// Create a new weighted index.
    pub const fn new(index: u32, weight: f32) -> Self {
        Self { index, weight }
    }
}

impl Display for WeightedIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.weight)
    }
}

fn element_count(shape: &[u32]) -> StrataResult<usize> {
    shape.iter().try_fold(1usize, |acc, dim| {
        acc.checked_mul(*dim as usize)
            .ok_or_else(|| strata_err!("tensor shape {} overflows usize", shape.iter().join("x")))
    })
}

fn check_shape(shape: &[u32], len: usize) -> StrataResult<()> {
    let expected = element_count(shape)?;
    if expected != len {
        strata_bail!(
            "tensor shape {} requires {} elements but {} were provided",
            shape.iter().join("x"),
            expected,
            len
        );
    }
    Ok(())
}

macro_rules! tensor {
    ($(#[$meta:meta])* $name:ident { $($dim:ident),+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name {
            $($dim: u32,)+
            data: Vec<f32>,
        }

        impl $name {
            /// Create a tensor, validating that `data` holds exactly one value per cell.
            pub fn try_new($($dim: u32,)+ data: Vec<f32>) -> StrataResult<Self> {
                check_shape(&[$($dim),+], data.len())?;
                Ok(Self { $($dim,)+ data })
            }

            $(
                #[doc = concat!("The `", stringify!($dim), "` extent.")]
                pub fn $dim(&self) -> u32 {
                    self.$dim
                }
            )+

            /// The extents, outermost first.
            pub fn shape(&self) -> Vec<u32> {
                vec![$(self.$dim),+]
            }

            /// The row-major cell values.
            pub fn data(&self) -> &[f32] {
                &self.data
            }

            /// Consume the tensor, returning its row-major cell values.
            pub fn into_data(self) -> Vec<f32> {
                self.data
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    "{}[{}]",
                    stringify!($name),
                    self.shape().iter().join("x")
                )
            }
        }
    };
}

tensor!(
    /// A row-major two-dimensional `f32` tensor.
    Matrix { rows, columns }
);

tensor!(
    /// A row-major three-dimensional `f32` tensor.
    Tensor3 { depth, rows, columns }
);

tensor!(
    /// A row-major four-dimensional `f32` tensor.
    Tensor4 { outer, depth, rows, columns }
);

impl Matrix {
    /// The cell at `(row, column)`.
    pub fn get(&self, row: u32, column: u32) -> Option<f32> {
        if row >= self.rows || column >= self.columns {
            return None;
        }
        self.data
            .get(row as usize * self.columns as usize + column as usize)
            .copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Matrix, Tensor3, Tensor4};

    #[test]
    fn matrix_shape_is_validated() {
        let m = Matrix::try_new(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(m.shape(), vec![2, 3]);
        assert_eq!(m.get(1, 2), Some(5.0));
        assert_eq!(m.get(2, 0), None);
        assert!(Matrix::try_new(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn higher_rank_shapes() {
        let t = Tensor3::try_new(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(t.shape(), vec![2, 1, 2]);
        assert_eq!(t.to_string(), "Tensor3[2x1x2]");

        let t = Tensor4::try_new(1, 1, 1, 0, vec![]).unwrap();
        assert!(t.data().is_empty());
        assert!(Tensor4::try_new(u32::MAX, u32::MAX, u32::MAX, u32::MAX, vec![]).is_err());
    }
}
