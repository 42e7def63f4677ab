//! Triple collocation error estimates
//!
//! Given three collocated measurements $x_i = \alpha_i + \beta_i t + \epsilon_i$ of the same
//! underlying signal $t$, with errors $\epsilon_i$ independent of one another and of $t$, the
//! variance of each error follows from the variances and pairwise covariances of the
//! measurements alone. For the first dataset
//!
//! $$
//!     \sigma_{\epsilon_1}^2 = \sigma_1^2 - \frac{\sigma_{12} \sigma_{13}}{\sigma_{23}},
//! $$
//!
//! and similarly for the others. These *unscaled* error variances are expressed in the units of
//! each dataset; they are not rescaled to a common reference.

use itertools::izip;
use ndarray::{Array1, Array2};
use num_traits::Float;
use tracing::{debug, instrument};

use crate::config::{Config, Filtering};
use crate::dataset::Dataset;
use crate::screening::{screen, Screening};
use crate::statistics::{covariance, variance, Reduction};
use crate::{Error, Result};

/// Variances and pairwise covariances of the three datasets, for one slot of the reduction
///
/// Any value which could not be estimated, because too few paired observations remained, is
/// `None`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Moments<E> {
    /// Variance of each dataset over the non-missing values of this slot
    pub variance: [Option<E>; 3],
    pub cov12: Option<E>,
    pub cov13: Option<E>,
    pub cov23: Option<E>,
}

impl<E: Float> Moments<E> {
    /// The unscaled error variance of each dataset
    ///
    /// No clipping is applied, so a negative estimate is returned as is. An estimate is `None`
    /// when one of its moments is missing, or when the covariance it divides by is zero.
    pub fn error_variances(&self) -> [Option<E>; 3] {
        let [var1, var2, var3] = self.variance;
        [
            unscaled_error_variance(var1, self.cov12, self.cov13, self.cov23),
            unscaled_error_variance(var2, self.cov12, self.cov23, self.cov13),
            unscaled_error_variance(var3, self.cov13, self.cov23, self.cov12),
        ]
    }
}

fn unscaled_error_variance<E: Float>(
    variance: Option<E>,
    a: Option<E>,
    b: Option<E>,
    denominator: Option<E>,
) -> Option<E> {
    let denominator = denominator.filter(|denominator| !denominator.is_zero())?;
    Some(variance? - a? * b? / denominator).filter(|error_variance| error_variance.is_finite())
}

/// Root-mean-square deviation from an unscaled error variance
///
/// A negative error variance has no real root, so yields `None`, as does a missing one.
pub fn rmsd<E: Float>(error_variance: Option<E>) -> Option<E> {
    error_variance
        .filter(|error_variance| *error_variance >= E::zero())
        .map(|error_variance| error_variance.abs().sqrt())
}

/// The outcome of a triple collocation analysis
#[derive(Clone, Debug)]
pub struct ErrorEstimate<E> {
    reduction: Reduction,
    moments: Vec<Moments<E>>,
    error_variances: [Array1<Option<E>>; 3],
    rmsd: [Array1<Option<E>>; 3],
    datasets: [Dataset<E>; 3],
    screening: Screening,
}

impl<E: Float> ErrorEstimate<E> {
    /// RMSD of the first, second and third dataset
    ///
    /// Each array holds one value per slot of [`ErrorEstimate::reduction`]: a single value for
    /// vector input, one per column for matrix input. `None` marks an estimate which could not be
    /// computed.
    pub const fn rmsd(&self) -> &[Array1<Option<E>>; 3] {
        &self.rmsd
    }

    /// RMSD with `NaN` written wherever the estimate could not be computed
    pub fn rmsd_nan_filled(&self) -> [Array1<E>; 3] {
        self.rmsd
            .clone()
            .map(|rmsd| rmsd.mapv(|value| value.unwrap_or_else(E::nan)))
    }

    /// Unscaled error variances, laid out as [`ErrorEstimate::rmsd`]
    pub const fn error_variances(&self) -> &[Array1<Option<E>>; 3] {
        &self.error_variances
    }

    pub fn moments(&self) -> &[Moments<E>] {
        &self.moments
    }

    pub const fn reduction(&self) -> Reduction {
        self.reduction
    }

    /// The datasets the statistics were computed from, after filtering and harmonisation
    pub const fn datasets(&self) -> &[Dataset<E>; 3] {
        &self.datasets
    }

    pub fn into_datasets(self) -> [Dataset<E>; 3] {
        self.datasets
    }

    pub const fn screening(&self) -> &Screening {
        &self.screening
    }
}

/// Triple collocation estimator
///
/// The inputs are never modified: filtering and harmonisation act on copies, which are returned
/// in the [`ErrorEstimate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TripleCollocation {
    filtering: Filtering,
}

impl TripleCollocation {
    pub const fn new(filtering: Filtering) -> Self {
        Self { filtering }
    }

    pub const fn from_config(config: &Config) -> Self {
        Self::new(config.filter_outliers)
    }

    pub const fn filtering(&self) -> Filtering {
        self.filtering
    }

    /// Estimate the random error of three collocated datasets
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] if the datasets do not all share one shape.
    #[instrument(skip_all, fields(shape = ?d1.shape(), filtering = ?self.filtering))]
    pub fn estimate<E: Float>(
        &self,
        d1: &Dataset<E>,
        d2: &Dataset<E>,
        d3: &Dataset<E>,
    ) -> Result<ErrorEstimate<E>> {
        check_shapes(d1.shape(), d2.shape(), d3.shape())?;

        let mut datasets = [d1.clone(), d2.clone(), d3.clone()];
        let screening = screen(&mut datasets, self.filtering);

        let reduction = Reduction::for_shape(d1.shape());
        let [p1, p2, p3] = &datasets;
        debug!(
            valid = p1.valid_count(),
            ?reduction,
            "computing moments of harmonised datasets"
        );

        let moments: Vec<Moments<E>> = izip!(
            variance(p1, reduction),
            variance(p2, reduction),
            variance(p3, reduction),
            covariance(p1, p2, reduction),
            covariance(p1, p3, reduction),
            covariance(p2, p3, reduction)
        )
        .map(|(var1, var2, var3, cov12, cov13, cov23)| Moments {
            variance: [var1, var2, var3],
            cov12,
            cov13,
            cov23,
        })
        .collect();

        let per_slot: Vec<[Option<E>; 3]> = moments.iter().map(Moments::error_variances).collect();
        let error_variances: [Array1<Option<E>>; 3] =
            [0, 1, 2].map(|ii| per_slot.iter().map(|slot| slot[ii]).collect());
        let deviations = error_variances.clone().map(|error_variance| error_variance.mapv(rmsd));

        let not_computable = deviations
            .iter()
            .flatten()
            .filter(|value| value.is_none())
            .count();
        if not_computable > 0 {
            debug!(
                not_computable,
                "error variance negative or not computable, rmsd left missing"
            );
        }

        Ok(ErrorEstimate {
            reduction,
            moments,
            error_variances,
            rmsd: deviations,
            datasets,
            screening,
        })
    }
}

/// Estimate the random error of three collocated datasets
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if the datasets do not all share one shape.
pub fn estimate<E: Float>(
    d1: &Dataset<E>,
    d2: &Dataset<E>,
    d3: &Dataset<E>,
    filtering: Filtering,
) -> Result<ErrorEstimate<E>> {
    TripleCollocation::new(filtering).estimate(d1, d2, d3)
}

/// Estimate the random error of three collocated arrays in which `NaN` marks a missing value
///
/// `flag` is `1` to exclude large dataset differences from the analysis and `0` to include all of
/// them.
///
/// # Errors
/// Returns [`Error::ShapeMismatch`] if the arrays do not all share one shape, and otherwise
/// [`Error::InvalidFlag`] if `flag` is neither `0` nor `1`.
pub fn estimate_with_flag<E: Float>(
    d1: &Array2<E>,
    d2: &Array2<E>,
    d3: &Array2<E>,
    flag: i64,
) -> Result<ErrorEstimate<E>> {
    check_shapes(d1.dim(), d2.dim(), d3.dim())?;
    let filtering = Filtering::try_from(flag)?;

    TripleCollocation::new(filtering).estimate(
        &Dataset::from_nan_marked(d1.clone()),
        &Dataset::from_nan_marked(d2.clone()),
        &Dataset::from_nan_marked(d3.clone()),
    )
}

fn check_shapes(
    first: (usize, usize),
    second: (usize, usize),
    third: (usize, usize),
) -> Result<()> {
    if first == second && first == third && second == third {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            first,
            second,
            third,
        })
    }
}
