use itertools::izip;
use ndarray::{s, ArrayView2};
use num_traits::Float;

use crate::dataset::Dataset;

/// How a dataset is reduced to variance and covariance estimates
///
/// Vectors (`1 x N` or `M x 1`) reduce to a single value. Matrices reduce over the row axis,
/// giving one value per column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reduction {
    Whole,
    PerColumn,
}

impl Reduction {
    pub const fn for_shape((rows, columns): (usize, usize)) -> Self {
        if rows > 1 && columns > 1 {
            Self::PerColumn
        } else {
            Self::Whole
        }
    }

    /// The number of values the reduction produces
    pub const fn slot_count(self, (_, columns): (usize, usize)) -> usize {
        match self {
            Self::Whole => 1,
            Self::PerColumn => columns,
        }
    }

    fn slots<'a, T>(self, view: ArrayView2<'a, T>) -> Vec<ArrayView2<'a, T>> {
        match self {
            Self::Whole => vec![view],
            Self::PerColumn => (0..view.ncols())
                .map(|column| view.slice_move(s![.., column..=column]))
                .collect(),
        }
    }
}

/// Sample variance of the non-missing values of `dataset`, for each slot of `reduction`
///
/// Uses Bessel's correction. A slot with fewer than two values present yields `None`.
pub fn variance<E: Float>(dataset: &Dataset<E>, reduction: Reduction) -> Vec<Option<E>> {
    izip!(
        reduction.slots(dataset.values()),
        reduction.slots(dataset.validity())
    )
    .map(|(x, x_valid)| sample_covariance(&paired(x, x_valid, x, x_valid)))
    .collect()
}

/// Sample covariance of `a` and `b` over positions where both are present, for each slot of
/// `reduction`
///
/// Uses Bessel's correction, with `N` the number of paired observations in the slot. A slot with
/// fewer than two pairs yields `None`.
///
/// `a` and `b` must have the same shape.
pub fn covariance<E: Float>(a: &Dataset<E>, b: &Dataset<E>, reduction: Reduction) -> Vec<Option<E>> {
    debug_assert_eq!(a.shape(), b.shape());
    izip!(
        reduction.slots(a.values()),
        reduction.slots(a.validity()),
        reduction.slots(b.values()),
        reduction.slots(b.validity())
    )
    .map(|(x, x_valid, y, y_valid)| sample_covariance(&paired(x, x_valid, y, y_valid)))
    .collect()
}

/// Collect the pairs of values at which both `x` and `y` are present
fn paired<E: Float>(
    x: ArrayView2<'_, E>,
    x_valid: ArrayView2<'_, bool>,
    y: ArrayView2<'_, E>,
    y_valid: ArrayView2<'_, bool>,
) -> Vec<(E, E)> {
    izip!(x.iter(), x_valid.iter(), y.iter(), y_valid.iter())
        .filter(|(_, x_valid, _, y_valid)| **x_valid && **y_valid)
        .map(|(&x, _, &y, _)| (x, y))
        .collect()
}

fn sample_covariance<E: Float>(pairs: &[(E, E)]) -> Option<E> {
    if pairs.len() < 2 {
        return None;
    }
    let n: E = num_traits::cast(pairs.len())?;

    let (sum_x, sum_y) = pairs
        .iter()
        .fold((E::zero(), E::zero()), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);

    let sum_of_products = pairs
        .iter()
        .fold(E::zero(), |acc, &(x, y)| acc + (x - mean_x) * (y - mean_y));

    Some(sum_of_products / (n - E::one()))
}
