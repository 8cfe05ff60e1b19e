// Closed-form least-squares fitting of the model catalogue
//
// Every non-constant family is fitted by ordinary least squares on a
// linearized form (u, v) = (fx(x), fy(y)). Sums are centered before use, which
// keeps the normal equations well conditioned for large x values (quadratic
// fits square them).

use crate::fitting::family::{Model, ModelFamily};
use crate::profile::Observation;
use std::collections::BTreeMap;
use thiserror::Error;

/// Reason a single model family could not be fitted
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitFailure {
    #[error("no observations to fit")]
    Empty,

    #[error("{family} model is undefined for {reason}")]
    Domain {
        family: ModelFamily,
        reason: &'static str,
    },

    #[error("{family} model needs at least two observations with distinct x values")]
    Degenerate { family: ModelFamily },

    #[error("{family} model cannot be fitted to data with zero variance in y")]
    FlatData { family: ModelFamily },

    #[error("singular system while fitting {family} model")]
    SingularSystem { family: ModelFamily },

    #[error("non-finite result while fitting {family} model")]
    NonFinite { family: ModelFamily },
}

/// Fit one model family to the observations
///
/// # Errors
/// Returns [`FitFailure`] when the data is empty, outside the family's domain,
/// degenerate (fewer than two distinct x values or flat y for non-constant
/// families), or when a closed-form denominator vanishes.
///
/// # Example
/// ```
/// use perfdelta::fitting::{fit, ModelFamily};
/// use perfdelta::profile::Observation;
///
/// let data: Vec<Observation> = [(1.0, 3.0), (2.0, 5.0), (3.0, 7.0)]
///     .into_iter()
///     .map(Observation::from)
///     .collect();
/// let model = fit(&data, ModelFamily::Linear).unwrap();
/// assert!((model.coefficients[1] - 2.0).abs() < 1e-9);
/// assert!((model.r_square - 1.0).abs() < 1e-9);
/// ```
pub fn fit(observations: &[Observation], family: ModelFamily) -> Result<Model, FitFailure> {
    if observations.is_empty() {
        return Err(FitFailure::Empty);
    }
    check_domain(observations, family)?;

    if family != ModelFamily::Constant {
        if observations.len() < 2 || distinct_x_count(observations) < 2 {
            return Err(FitFailure::Degenerate { family });
        }
        let first_y = observations[0].y;
        if observations.iter().all(|o| o.y == first_y) {
            return Err(FitFailure::FlatData { family });
        }
    }

    let coefficients = match family {
        ModelFamily::Constant => vec![mean(observations.iter().map(|o| o.y))],
        ModelFamily::Linear => {
            let (a, b) = simple_regression(family, observations, |x| x, |y| y)?;
            vec![a, b]
        }
        ModelFamily::Logarithmic => {
            let (a, b) = simple_regression(family, observations, f64::log10, |y| y)?;
            vec![a, b]
        }
        ModelFamily::Power => {
            let (a, b) = simple_regression(family, observations, f64::log10, f64::log10)?;
            vec![10f64.powf(a), b]
        }
        ModelFamily::Exponential => {
            let (a, b) = simple_regression(family, observations, |x| x, f64::log10)?;
            vec![10f64.powf(a), 10f64.powf(b)]
        }
        ModelFamily::Quadratic => {
            let (a, b) = simple_regression(family, observations, |x| x * x, |y| y)?;
            vec![a, b]
        }
    };

    if coefficients.iter().any(|c| !c.is_finite()) {
        return Err(FitFailure::NonFinite { family });
    }

    let (x_start, x_end) = x_interval(observations);
    let mut model = Model {
        family,
        coefficients,
        r_square: 0.0,
        x_start,
        x_end,
    };
    model.r_square = r_square(&model, observations);
    if !model.r_square.is_finite() {
        return Err(FitFailure::NonFinite { family });
    }

    Ok(model)
}

/// Fit every family whose domain admits the observations
///
/// Families outside their domain are not attempted; families that fail to fit
/// are dropped. The result may be empty.
pub fn fit_all(observations: &[Observation]) -> BTreeMap<ModelFamily, Model> {
    let mut models = BTreeMap::new();

    for family in ModelFamily::ALL {
        if let Err(skip) = check_domain(observations, family) {
            tracing::trace!("Skipping {}", skip);
            continue;
        }
        match fit(observations, family) {
            Ok(model) => {
                models.insert(family, model);
            }
            Err(failure) => tracing::trace!("Fit failed: {}", failure),
        }
    }

    models
}

fn check_domain(observations: &[Observation], family: ModelFamily) -> Result<(), FitFailure> {
    if family.requires_positive_x() && observations.iter().any(|o| o.x <= 0.0) {
        return Err(FitFailure::Domain {
            family,
            reason: "non-positive x",
        });
    }
    if family.requires_positive_y() && observations.iter().any(|o| o.y <= 0.0) {
        return Err(FitFailure::Domain {
            family,
            reason: "non-positive y",
        });
    }
    Ok(())
}

fn distinct_x_count(observations: &[Observation]) -> usize {
    let mut xs: Vec<f64> = observations.iter().map(|o| o.x).collect();
    xs.sort_by(f64::total_cmp);
    xs.dedup();
    xs.len()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    sum / count as f64
}

fn x_interval(observations: &[Observation]) -> (f64, f64) {
    observations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
            (lo.min(o.x), hi.max(o.x))
        })
}

/// Least squares for `v = a + b * u` with `u = fx(x)`, `v = fy(y)`
fn simple_regression(
    family: ModelFamily,
    observations: &[Observation],
    fx: impl Fn(f64) -> f64,
    fy: impl Fn(f64) -> f64,
) -> Result<(f64, f64), FitFailure> {
    let points: Vec<(f64, f64)> = observations.iter().map(|o| (fx(o.x), fy(o.y))).collect();
    let u_mean = mean(points.iter().map(|p| p.0));
    let v_mean = mean(points.iter().map(|p| p.1));

    let mut s_uu = 0.0;
    let mut s_uv = 0.0;
    let mut max_deviation: f64 = 0.0;
    for (u, v) in &points {
        let du = u - u_mean;
        s_uu += du * du;
        s_uv += du * (v - v_mean);
        max_deviation = max_deviation.max(du.abs());
    }

    if !s_uu.is_finite() || !s_uv.is_finite() {
        return Err(FitFailure::NonFinite { family });
    }
    // Deviations within the rounding error of the mean carry no spread
    let rounding = points.len() as f64 * f64::EPSILON * u_mean.abs();
    if s_uu == 0.0 || max_deviation <= rounding {
        return Err(FitFailure::SingularSystem { family });
    }

    let b = s_uv / s_uu;
    let a = v_mean - b * u_mean;
    Ok((a, b))
}

/// Coefficient of determination against the original y values
///
/// Flat data is explained perfectly by a constant and by nothing else, so it
/// scores 1.0 (only the constant family reaches this point with flat data).
fn r_square(model: &Model, observations: &[Observation]) -> f64 {
    let y_mean = mean(observations.iter().map(|o| o.y));
    let (ss_res, ss_tot) = observations.iter().fold((0.0, 0.0), |(res, tot), o| {
        let residual = o.y - model.evaluate(o.x);
        let deviation = o.y - y_mean;
        (res + residual * residual, tot + deviation * deviation)
    });

    if ss_tot == 0.0 {
        return 1.0;
    }
    1.0 - ss_res / ss_tot
}
