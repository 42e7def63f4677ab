use ndarray::{Array2, ArrayView2, Zip};
use num_traits::Float;

use crate::{Error, Result};

/// One of the three collocated measurement arrays
///
/// Values are held alongside a validity mask of the same shape. A position is *missing* when its
/// mask entry is `false`; the value stored at a missing position is never read.
///
/// Datasets are two dimensional with shape `1 x N`, `M x 1` or `M x N`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset<E> {
    values: Array2<E>,
    valid: Array2<bool>,
}

impl<E: Float> Dataset<E> {
    /// Build a dataset in which every `NaN` marks a missing value
    pub fn from_nan_marked(values: Array2<E>) -> Self {
        let valid = values.mapv(|value| !value.is_nan());
        Self { values, valid }
    }

    /// Build a dataset from optional values, `None` marking a missing value
    pub fn from_options(values: &Array2<Option<E>>) -> Self {
        Self {
            values: values.mapv(|value| value.unwrap_or_else(E::nan)),
            valid: values.mapv(|value| value.is_some()),
        }
    }

    /// Build a dataset from values and an explicit validity mask
    ///
    /// A `NaN` value is missing even where `valid` is `true`.
    ///
    /// # Errors
    /// Returns [`Error::MaskShape`] if `valid` does not have the shape of `values`.
    pub fn with_mask(values: Array2<E>, mut valid: Array2<bool>) -> Result<Self> {
        if values.dim() != valid.dim() {
            return Err(Error::MaskShape {
                values: values.dim(),
                mask: valid.dim(),
            });
        }
        Zip::from(&mut valid)
            .and(&values)
            .for_each(|valid, value| *valid = *valid && !value.is_nan());
        Ok(Self { values, valid })
    }

    /// Convert back to the sentinel representation, writing `NaN` at every missing position
    pub fn to_nan_marked(&self) -> Array2<E> {
        let mut values = self.values.clone();
        Zip::from(&mut values)
            .and(&self.valid)
            .for_each(|value, &valid| {
                if !valid {
                    *value = E::nan();
                }
            });
        values
    }

    /// Number of non-missing positions
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&valid| valid).count()
    }

    /// The value at `(row, column)`, or `None` where it is missing or out of bounds
    pub fn get(&self, row: usize, column: usize) -> Option<E> {
        match self.valid.get((row, column)) {
            Some(true) => self.values.get((row, column)).copied(),
            _ => None,
        }
    }

    /// Mark the positions where `exclude` is `true` as missing
    ///
    /// Returns the number of positions that were valid before the call.
    pub(crate) fn mark_missing(&mut self, exclude: &Array2<bool>) -> usize {
        let mut newly_missing = 0;
        Zip::from(&mut self.valid)
            .and(exclude)
            .for_each(|valid, &exclude| {
                if exclude && *valid {
                    *valid = false;
                    newly_missing += 1;
                }
            });
        newly_missing
    }

    /// Mask which is `true` wherever this dataset is missing
    pub(crate) fn missing(&self) -> Array2<bool> {
        self.valid.mapv(|valid| !valid)
    }
}

impl<E> Dataset<E> {
    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn values(&self) -> ArrayView2<'_, E> {
        self.values.view()
    }

    pub fn validity(&self) -> ArrayView2<'_, bool> {
        self.valid.view()
    }

    pub fn is_missing(&self, row: usize, column: usize) -> bool {
        !self.valid.get((row, column)).copied().unwrap_or(false)
    }
}

impl<E: Float> From<Array2<E>> for Dataset<E> {
    fn from(values: Array2<E>) -> Self {
        Self::from_nan_marked(values)
    }
}
