use ndarray::{arr2, Array1, Array2};
use ndarray_rand::rand::{Rng, SeedableRng};
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand_isaac::Isaac64Rng;
use tempdir::TempDir;

use triple_collocation::statistics::Reduction;
use triple_collocation::{
    estimate, estimate_with_flag, Config, Dataset, Error, Filtering, Result, TripleCollocation,
};

/// Three measurements of one salinity-like signal, each with independent Gaussian noise
struct Collocated {
    d1: Array2<f64>,
    d2: Array2<f64>,
    d3: Array2<f64>,
}

fn generate_collocated<R: Rng>(
    shape: (usize, usize),
    standard_deviations: [f64; 3],
    rng: &mut R,
) -> Collocated {
    let truth = Array2::random_using(shape, Uniform::new(34., 36.), rng);
    let mut noisy = standard_deviations.into_iter().map(|standard_deviation| {
        let noise = Array2::random_using(
            shape,
            Normal::new(0., standard_deviation).expect("standard deviation is positive"),
            rng,
        );
        &truth + &noise
    });

    Collocated {
        d1: noisy.next().unwrap(),
        d2: noisy.next().unwrap(),
        d3: noisy.next().unwrap(),
    }
}

/// `truth` plus independent Gaussian noise, with its own standard deviation for each column
fn add_column_noise<R: Rng>(
    truth: &Array2<f64>,
    standard_deviations: &[f64],
    rng: &mut R,
) -> Array2<f64> {
    let mut noisy = truth.clone();
    for (mut column, &standard_deviation) in noisy.columns_mut().into_iter().zip(standard_deviations)
    {
        let noise = Array1::random_using(
            column.len(),
            Normal::new(0., standard_deviation).expect("standard deviation is positive"),
            rng,
        );
        column += &noise;
    }
    noisy
}

fn assert_near_zero_or_missing(value: Option<f64>) {
    if let Some(value) = value {
        assert!(value < 1e-6, "expected vanishing rmsd, found {value}");
    }
}

#[test]
fn rmsd_recovers_known_error_of_each_dataset() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let standard_deviations = [0.1, 0.2, 0.3];
    let data = generate_collocated((1, 50_000), standard_deviations, &mut rng);

    let estimate = estimate_with_flag(&data.d1, &data.d2, &data.d3, 0)?;

    for (rmsd, expected) in estimate.rmsd().iter().zip(standard_deviations) {
        assert_eq!(rmsd.len(), 1);
        approx::assert_relative_eq!(rmsd[0].unwrap(), expected, max_relative = 0.1);
    }

    Ok(())
}

#[test]
fn filtering_has_no_effect_when_differences_are_small() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let data = generate_collocated((1, 1_000), [0.1, 0.2, 0.3], &mut rng);

    let unfiltered = estimate_with_flag(&data.d1, &data.d2, &data.d3, 0)?;
    let filtered = estimate_with_flag(&data.d1, &data.d2, &data.d3, 1)?;

    assert_eq!(filtered.screening().filtered(), 0);
    assert_eq!(filtered.rmsd(), unfiltered.rmsd());

    Ok(())
}

#[test]
fn filtering_removes_gross_outliers() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let standard_deviations = [0.1, 0.2, 0.3];
    let mut data = generate_collocated((1, 50_000), standard_deviations, &mut rng);

    // A malfunctioning second instrument reads 20 PSU high at about one position in a hundred
    let mut num_outliers = 0;
    for value in &mut data.d2 {
        if rng.gen_bool(0.01) {
            *value += 20.;
            num_outliers += 1;
        }
    }

    let unfiltered = estimate_with_flag(&data.d1, &data.d2, &data.d3, 0)?;
    let filtered = estimate_with_flag(&data.d1, &data.d2, &data.d3, 1)?;

    assert!(unfiltered.rmsd()[1][0].unwrap() > 1.0);
    approx::assert_relative_eq!(
        filtered.rmsd()[1][0].unwrap(),
        standard_deviations[1],
        max_relative = 0.1
    );
    assert_eq!(filtered.screening().filtered(), num_outliers);
    assert_eq!(filtered.screening().second_third, num_outliers);

    Ok(())
}

#[test]
fn identical_vectors_have_no_error() -> Result<()> {
    let d = arr2(&[[1., 2., 3., 4., 5.]]);

    let estimate = estimate_with_flag(&d, &d, &d, 0)?;

    for rmsd in estimate.rmsd() {
        assert_eq!(rmsd.len(), 1);
        approx::assert_abs_diff_eq!(rmsd[0].unwrap(), 0.0);
    }
    assert!(estimate.datasets().iter().all(|d| d.valid_count() == 5));

    Ok(())
}

#[test]
fn missing_value_in_one_dataset_is_excluded_from_all() -> Result<()> {
    let d1 = arr2(&[[1., 2., f64::NAN, 4., 5.]]);
    let d = arr2(&[[1., 2., 3., 4., 5.]]);

    let estimate = estimate_with_flag(&d1, &d, &d, 0)?;

    for dataset in estimate.datasets() {
        assert!(dataset.is_missing(0, 2));
        assert_eq!(dataset.valid_count(), 4);
    }
    assert_eq!(estimate.screening().harmonised, 2);

    // Moments are taken over the remaining positions [1, 2, 4, 5]
    let moments = estimate.moments()[0];
    for variance in moments.variance {
        approx::assert_relative_eq!(variance.unwrap(), 10. / 3.);
    }
    approx::assert_relative_eq!(moments.cov12.unwrap(), 10. / 3.);

    for rmsd in estimate.rmsd() {
        assert_near_zero_or_missing(rmsd[0]);
    }

    Ok(())
}

#[test]
fn row_and_column_vectors_give_the_same_estimate() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let data = generate_collocated((1, 500), [0.1, 0.2, 0.3], &mut rng);

    let rows = estimate_with_flag(&data.d1, &data.d2, &data.d3, 1)?;
    let columns = estimate_with_flag(
        &data.d1.t().to_owned(),
        &data.d2.t().to_owned(),
        &data.d3.t().to_owned(),
        1,
    )?;

    assert_eq!(columns.reduction(), Reduction::Whole);
    for (from_rows, from_columns) in rows.rmsd().iter().zip(columns.rmsd()) {
        approx::assert_relative_eq!(
            from_rows[0].unwrap(),
            from_columns[0].unwrap(),
            max_relative = 1e-10
        );
    }

    Ok(())
}

#[test]
fn matrix_columns_are_estimated_independently() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let num_rows = 50_000;

    // A salinity-like column around 35 and a second column spread over [0, 100]
    let mut truth = Array2::random_using((num_rows, 2), Uniform::new(0., 1.), &mut rng);
    truth.column_mut(0).mapv_inplace(|u| 34. + 2. * u);
    truth.column_mut(1).mapv_inplace(|u| 100. * u);

    // Standard deviation of each dataset's noise, per column
    let standard_deviations = [[0.1, 1.0], [0.2, 1.5], [0.3, 2.0]];
    let d1 = add_column_noise(&truth, &standard_deviations[0], &mut rng);
    let d2 = add_column_noise(&truth, &standard_deviations[1], &mut rng);
    let d3 = add_column_noise(&truth, &standard_deviations[2], &mut rng);

    let estimate = estimate_with_flag(&d1, &d2, &d3, 0)?;

    assert_eq!(estimate.reduction(), Reduction::PerColumn);
    for (rmsd, expected) in estimate.rmsd().iter().zip(standard_deviations) {
        assert_eq!(rmsd.len(), 2);
        for (value, expected) in rmsd.iter().zip(expected) {
            approx::assert_relative_eq!(value.unwrap(), expected, max_relative = 0.1);
        }
    }

    Ok(())
}

#[test]
fn identical_matrices_have_no_error_in_any_column() -> Result<()> {
    let seed = 40;
    let mut rng = Isaac64Rng::seed_from_u64(seed);
    let mut d = Array2::random_using((100, 4), Uniform::new(0., 1.), &mut rng);
    for (scale, mut column) in [0.1, 1., 3., 10.].into_iter().zip(d.columns_mut()) {
        column *= scale;
    }

    let estimate = estimate_with_flag(&d, &d, &d, 0)?;

    for rmsd in estimate.rmsd() {
        assert_eq!(rmsd.len(), 4);
        for &value in rmsd {
            assert_near_zero_or_missing(value);
        }
    }

    Ok(())
}

#[test]
fn nan_values_under_an_explicit_mask_are_excluded() -> Result<()> {
    let values = arr2(&[[1., 2., f64::NAN, 4., 5.]]);
    let masked = Dataset::with_mask(values.clone(), Array2::from_elem((1, 5), true))?;
    let d = Dataset::from_nan_marked(arr2(&[[1., 3., 3., 4., 6.]]));

    let from_mask = estimate(&masked, &d, &d, Filtering::Disabled)?;
    let from_nan = estimate(&Dataset::from_nan_marked(values), &d, &d, Filtering::Disabled)?;

    assert!(from_mask.moments()[0].cov12.is_some());
    assert_eq!(from_mask.moments(), from_nan.moments());
    assert_eq!(from_mask.screening().harmonised, 2);

    Ok(())
}

#[test]
fn datasets_with_different_shapes_are_rejected() {
    let d1 = Dataset::from_nan_marked(Array2::<f64>::zeros((1, 5)));
    let d2 = Dataset::from_nan_marked(Array2::<f64>::zeros((5, 1)));

    let result = estimate(&d1, &d1, &d2, Filtering::Disabled);

    match result {
        Err(Error::ShapeMismatch {
            first,
            second,
            third,
        }) => {
            assert_eq!(first, (1, 5));
            assert_eq!(second, (1, 5));
            assert_eq!(third, (5, 1));
        }
        other => panic!("expected shape mismatch, found {other:?}"),
    }
}

#[test]
fn flag_outside_zero_and_one_is_rejected() {
    let d = arr2(&[[1., 2., 3.]]);
    for flag in [-1, 2, 5, i64::MAX] {
        assert!(matches!(
            estimate_with_flag(&d, &d, &d, flag),
            Err(Error::InvalidFlag(rejected)) if rejected == flag
        ));
    }
}

#[test]
fn estimator_reads_filtering_from_config_file() -> Result<()> {
    let tmp_dir = TempDir::new("estimator_reads_filtering_from_config_file")?;
    let config_path = tmp_dir.path().join("collocation.toml");
    std::fs::write(&config_path, "filter_outliers = 1\n")?;

    let config = Config::from_file(&config_path)?;
    let estimator = TripleCollocation::from_config(&config);
    assert_eq!(estimator.filtering(), Filtering::Enabled);

    // |d1 - d3| is exactly 6 at the second position
    let d1 = Dataset::from_nan_marked(arr2(&[[1., 8., 3., 4., 5.]]));
    let d2 = Dataset::from_nan_marked(arr2(&[[1., 4., 3., 4., 5.]]));
    let d3 = Dataset::from_nan_marked(arr2(&[[1., 2., 3., 4., 5.]]));
    let estimate = estimator.estimate(&d1, &d2, &d3)?;

    assert_eq!(estimate.screening().first_third, 1);
    assert!(estimate.datasets().iter().all(|d| d.is_missing(0, 1)));

    Ok(())
}

#[test]
fn config_file_with_invalid_flag_is_rejected() -> Result<()> {
    let tmp_dir = TempDir::new("config_file_with_invalid_flag_is_rejected")?;
    let config_path = tmp_dir.path().join("collocation.toml");
    std::fs::write(&config_path, "filter_outliers = 3\n")?;

    assert!(matches!(
        Config::from_file(&config_path),
        Err(Error::InvalidFlag(3))
    ));
    assert!(matches!(
        Config::from_file(&tmp_dir.path().join("missing.toml")),
        Err(Error::Io(_))
    ));

    Ok(())
}
