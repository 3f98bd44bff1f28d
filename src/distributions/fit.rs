//! Maximum-likelihood fits of reference samples, with the location parameter fixed at zero.

use std::path::Path;

use roots::find_root_brent;
use statrs::function::gamma::digamma;

use crate::error::EpiError;

/// Parameters of a log-normal fit: `ln(x) ~ Normal(mu, sigma)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNormalFit {
    pub mu: f64,
    pub sigma: f64,
}

/// Parameters of a gamma fit in shape/scale form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaFit {
    pub shape: f64,
    pub scale: f64,
}

// Root bracket growth steps before giving up; each step doubles or halves a bound.
const MAX_BRACKET_STEPS: usize = 64;
const SHAPE_TOLERANCE: f64 = 1e-10;

/// Reads every number in a headerless text/CSV file. Fields may be separated by commas or
/// spread across lines; blank fields are skipped.
pub fn read_sample(path: &Path) -> Result<Vec<f64>, EpiError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record?;
        for field in record.iter().filter(|field| !field.is_empty()) {
            let value = field.parse::<f64>().map_err(|_| {
                EpiError::InvalidDistribution(format!(
                    "{}: {field:?} is not a number",
                    path.display()
                ))
            })?;
            values.push(value);
        }
    }
    Ok(values)
}

fn check_sample(sample: &[f64]) -> Result<(), EpiError> {
    if sample.is_empty() {
        return Err(EpiError::InvalidDistribution(
            "cannot fit an empty sample".to_string(),
        ));
    }
    if let Some(bad) = sample.iter().find(|x| !x.is_finite() || **x <= 0.0) {
        return Err(EpiError::InvalidDistribution(format!(
            "samples must be positive and finite, found {bad}"
        )));
    }
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), x| (sum + x, n + 1));
    sum / n as f64
}

/// Log-normal MLE: the mean and the population standard deviation of `ln(x)`.
pub fn fit_lognormal(sample: &[f64]) -> Result<LogNormalFit, EpiError> {
    check_sample(sample)?;
    let mu = mean(sample.iter().map(|x| x.ln()));
    let variance = mean(sample.iter().map(|x| (x.ln() - mu).powi(2)));
    Ok(LogNormalFit {
        mu,
        sigma: variance.sqrt(),
    })
}

/// Gamma MLE. The shape solves `ln(k) - digamma(k) = ln(mean(x)) - mean(ln(x))`, found with
/// Brent's method on a bracket around the Minka starting point; the scale is then
/// `mean(x) / k`.
///
/// A sample with no spread has `s = 0` and no finite solution; it is reported as an
/// infinite shape and the caller treats it as a point mass.
pub fn fit_gamma(sample: &[f64]) -> Result<GammaFit, EpiError> {
    check_sample(sample)?;
    let m = mean(sample.iter().copied());
    let s = m.ln() - mean(sample.iter().map(|x| x.ln()));
    if s <= f64::EPSILON {
        return Ok(GammaFit {
            shape: f64::INFINITY,
            scale: 0.0,
        });
    }

    // Strictly decreasing in k, from +inf at 0 down to 0 at infinity.
    let profile = |k: f64| k.ln() - digamma(k) - s;
    let start = (3.0 - s + ((s - 3.0).powi(2) + 24.0 * s).sqrt()) / (12.0 * s);
    let (mut low, mut high) = (start / 2.0, start * 2.0);
    for _ in 0..MAX_BRACKET_STEPS {
        if profile(low) > 0.0 {
            break;
        }
        low /= 2.0;
    }
    for _ in 0..MAX_BRACKET_STEPS {
        if profile(high) < 0.0 {
            break;
        }
        high *= 2.0;
    }

    let mut tolerance = SHAPE_TOLERANCE;
    let shape = find_root_brent(low, high, profile, &mut tolerance).map_err(|e| {
        EpiError::InvalidDistribution(format!(
            "gamma fit did not converge in [{low}, {high}]: {e:?}"
        ))
    })?;
    Ok(GammaFit {
        shape,
        scale: m / shape,
    })
}
