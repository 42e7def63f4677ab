use ndarray::{Array2, Zip};
use num_traits::Float;
use tracing::debug;

use crate::config::Filtering;
use crate::dataset::Dataset;

/// Largest absolute difference between two collocated measurements which is retained when
/// filtering is enabled, in the units of the measurements (PSU for salinity).
pub const DIFFERENCE_THRESHOLD: f64 = 5.0;

/// What screening removed from the three datasets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Screening {
    /// Positions excluded because `|d1 - d3|` exceeded the threshold
    pub first_third: usize,
    /// Positions excluded because `|d2 - d3|` exceeded the threshold
    pub second_third: usize,
    /// Positions excluded because `|d1 - d2|` exceeded the threshold, after the two passes above
    pub first_second: usize,
    /// Values marked missing because another dataset was missing at the same position
    pub harmonised: usize,
}

impl Screening {
    /// Total positions excluded by the difference filter
    pub const fn filtered(&self) -> usize {
        self.first_third + self.second_third + self.first_second
    }
}

/// Prepare three same-shaped datasets for collocation, in place
///
/// When `filtering` is enabled, positions where a pairwise difference is larger than
/// [`DIFFERENCE_THRESHOLD`] are excluded from both members of the pair. The pairs are visited in
/// the order `(d1, d3)`, `(d2, d3)`, `(d1, d2)`, and each pass sees the exclusions made by the
/// passes before it.
///
/// Missing values are then made uniform, so a position missing in any dataset is missing in all
/// three.
///
/// A float type too narrow to hold the threshold saturates it at `E::max_value()`.
pub(crate) fn screen<E: Float>(
    datasets: &mut [Dataset<E>; 3],
    filtering: Filtering,
) -> Screening {
    let [d1, d2, d3] = datasets;
    let mut screening = Screening::default();

    if filtering.is_enabled() {
        let threshold: E = num_traits::cast(DIFFERENCE_THRESHOLD).unwrap_or_else(E::max_value);
        screening.first_third = exclude_large_differences(d1, d3, threshold);
        screening.second_third = exclude_large_differences(d2, d3, threshold);
        screening.first_second = exclude_large_differences(d1, d2, threshold);
        debug!(
            first_third = screening.first_third,
            second_third = screening.second_third,
            first_second = screening.first_second,
            "excluded large differences"
        );
    }

    screening.harmonised = harmonise(d1, d2, d3);
    debug!(harmonised = screening.harmonised, "harmonised missing values");

    screening
}

/// Mark both `a` and `b` missing wherever both are present and differ by more than `threshold`
///
/// Returns the number of excluded positions.
pub(crate) fn exclude_large_differences<E: Float>(
    a: &mut Dataset<E>,
    b: &mut Dataset<E>,
    threshold: E,
) -> usize {
    let exclude: Array2<bool> = Zip::from(a.values())
        .and(a.validity())
        .and(b.values())
        .and(b.validity())
        .map_collect(|&x, &x_valid, &y, &y_valid| {
            x_valid && y_valid && (x - y).abs() > threshold
        });

    a.mark_missing(&exclude);
    b.mark_missing(&exclude);

    exclude.iter().filter(|&&excluded| excluded).count()
}

/// Propagate missing values so that all three datasets share one mask
///
/// Returns the number of values newly marked missing.
pub(crate) fn harmonise<E: Float>(
    d1: &mut Dataset<E>,
    d2: &mut Dataset<E>,
    d3: &mut Dataset<E>,
) -> usize {
    let mut newly_missing = 0;

    let missing = d1.missing();
    newly_missing += d2.mark_missing(&missing);
    newly_missing += d3.mark_missing(&missing);

    let missing = d2.missing();
    newly_missing += d1.mark_missing(&missing);
    newly_missing += d3.mark_missing(&missing);

    let missing = d3.missing();
    newly_missing += d1.mark_missing(&missing);
    newly_missing += d2.mark_missing(&missing);

    newly_missing
}
