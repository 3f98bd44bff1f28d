//! The delay sampler.
//!
//! Every delay in the disease progression is described by a [`DelayConfig`]: a closed set of
//! distribution families with typed parameters. Configurations are resolved once, when the
//! engine is built, into a [`DelayDistribution`] that draws directly from `rand_distr`. Sources
//! fitted from a reference sample on disk are memoised per `(path, family)` in the
//! [`Sampler`], so the fit runs at most once however many milestones share the file.
mod fit;

use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

pub use fit::{fit_gamma, fit_lognormal, read_sample, GammaFit, LogNormalFit};
use log::{debug, info};
use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Poisson};
use serde::{Deserialize, Serialize};

use crate::error::EpiError;
use crate::{HashMap, HashMapExt};

/// The family fitted to an empirical reference sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFamily {
    Lognormal,
    Gamma,
}

impl Display for FitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitFamily::Lognormal => write!(f, "lognormal"),
            FitFamily::Gamma => write!(f, "gamma"),
        }
    }
}

/// A named distribution and its parameters, as written in the parameter file:
///
/// ```json
/// {"distribution": "lognormal", "mean": 1.2, "sigma": 0.4}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDelayConfig", into = "RawDelayConfig")]
pub enum DelayConfig {
    /// Poisson with rate `lambda` (default 1). `lambda = 0` is a point mass at zero.
    Poisson { lambda: f64 },
    /// Exponential with rate `lambda` (default 1), i.e. scale `1 / lambda`.
    Exponential { lambda: f64 },
    /// `exp(Normal(mean, sigma))`, defaults `mean = 0`, `sigma = 1`. `sigma = 0` is a point
    /// mass at `exp(mean)`.
    Lognormal { mean: f64, sigma: f64 },
    /// Fit `approximate_distribution` to the numbers stored in `filepath`.
    FromFile {
        filepath: PathBuf,
        approximate_distribution: FitFamily,
    },
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig::Poisson { lambda: 1.0 }
    }
}

/// The flat shape of a [`DelayConfig`] on the wire. Keeping the distribution name a plain
/// string lets an unknown name surface as [`EpiError::UnsupportedDistribution`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawDelayConfig {
    distribution: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lambda: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sigma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filepath: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    approximate_distribution: Option<String>,
}

impl TryFrom<RawDelayConfig> for DelayConfig {
    type Error = EpiError;

    fn try_from(raw: RawDelayConfig) -> Result<Self, Self::Error> {
        match raw.distribution.as_str() {
            "poisson" => Ok(DelayConfig::Poisson {
                lambda: raw.lambda.unwrap_or(1.0),
            }),
            "exponential" => Ok(DelayConfig::Exponential {
                lambda: raw.lambda.unwrap_or(1.0),
            }),
            "lognormal" => Ok(DelayConfig::Lognormal {
                mean: raw.mean.unwrap_or(0.0),
                sigma: raw.sigma.unwrap_or(1.0),
            }),
            "from_file" => {
                let filepath = raw
                    .filepath
                    .ok_or_else(|| EpiError::MissingParameter("filepath".to_string()))?;
                let approximate_distribution = match raw.approximate_distribution.as_deref() {
                    Some("lognormal") => FitFamily::Lognormal,
                    Some("gamma") => FitFamily::Gamma,
                    Some(other) => {
                        return Err(EpiError::UnsupportedDistribution(format!(
                            "cannot approximate a sample with {other}"
                        )))
                    }
                    None => {
                        return Err(EpiError::MissingParameter(
                            "approximate_distribution".to_string(),
                        ))
                    }
                };
                Ok(DelayConfig::FromFile {
                    filepath,
                    approximate_distribution,
                })
            }
            other => Err(EpiError::UnsupportedDistribution(other.to_string())),
        }
    }
}

impl From<DelayConfig> for RawDelayConfig {
    fn from(config: DelayConfig) -> Self {
        match config {
            DelayConfig::Poisson { lambda } => RawDelayConfig {
                distribution: "poisson".to_string(),
                lambda: Some(lambda),
                ..Default::default()
            },
            DelayConfig::Exponential { lambda } => RawDelayConfig {
                distribution: "exponential".to_string(),
                lambda: Some(lambda),
                ..Default::default()
            },
            DelayConfig::Lognormal { mean, sigma } => RawDelayConfig {
                distribution: "lognormal".to_string(),
                mean: Some(mean),
                sigma: Some(sigma),
                ..Default::default()
            },
            DelayConfig::FromFile {
                filepath,
                approximate_distribution,
            } => RawDelayConfig {
                distribution: "from_file".to_string(),
                filepath: Some(filepath),
                approximate_distribution: Some(approximate_distribution.to_string()),
                ..Default::default()
            },
        }
    }
}

impl DelayConfig {
    /// A point mass at `value`, written as a zero-spread log-normal (or a zero-rate Poisson
    /// for `value = 0`).
    #[must_use]
    pub fn constant(value: f64) -> Self {
        if value == 0.0 {
            DelayConfig::Poisson { lambda: 0.0 }
        } else {
            DelayConfig::Lognormal {
                mean: value.ln(),
                sigma: 0.0,
            }
        }
    }

    /// Checks the parameters without touching the file system.
    pub fn validate(&self) -> Result<(), EpiError> {
        match self {
            DelayConfig::Poisson { lambda } if !(lambda.is_finite() && *lambda >= 0.0) => Err(
                EpiError::InvalidDistribution(format!("poisson lambda must be >= 0, got {lambda}")),
            ),
            DelayConfig::Exponential { lambda } if !(lambda.is_finite() && *lambda > 0.0) => {
                Err(EpiError::InvalidDistribution(format!(
                    "exponential lambda must be > 0, got {lambda}"
                )))
            }
            DelayConfig::Lognormal { mean, sigma }
                if !(mean.is_finite() && sigma.is_finite() && *sigma >= 0.0) =>
            {
                Err(EpiError::InvalidDistribution(format!(
                    "lognormal needs a finite mean and sigma >= 0, got mean={mean} sigma={sigma}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// A resolved delay distribution, ready to draw from.
#[derive(Debug, Clone)]
pub enum DelayDistribution {
    Degenerate(f64),
    Poisson(Poisson<f64>),
    Exponential(Exp<f64>),
    LogNormal(LogNormal<f64>),
    Gamma(Gamma<f64>),
}

impl Distribution<f64> for DelayDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            DelayDistribution::Degenerate(value) => *value,
            DelayDistribution::Poisson(distr) => distr.sample(rng),
            DelayDistribution::Exponential(distr) => distr.sample(rng),
            DelayDistribution::LogNormal(distr) => distr.sample(rng),
            DelayDistribution::Gamma(distr) => distr.sample(rng),
        }
    }
}

fn invalid(e: impl Display) -> EpiError {
    EpiError::InvalidDistribution(e.to_string())
}

/// Resolves [`DelayConfig`]s, caching fits of on-disk reference samples.
#[derive(Default)]
pub struct Sampler {
    fitted: HashMap<(PathBuf, FitFamily), DelayDistribution>,
}

impl Sampler {
    #[must_use]
    pub fn new() -> Self {
        Sampler {
            fitted: HashMap::new(),
        }
    }

    /// Turns a configuration into something that can be sampled. Fitting a file happens at
    /// most once per `(path, family)`.
    pub fn resolve(&mut self, config: &DelayConfig) -> Result<DelayDistribution, EpiError> {
        config.validate()?;
        match config {
            DelayConfig::Poisson { lambda } => {
                if *lambda == 0.0 {
                    Ok(DelayDistribution::Degenerate(0.0))
                } else {
                    Ok(DelayDistribution::Poisson(
                        Poisson::new(*lambda).map_err(invalid)?,
                    ))
                }
            }
            DelayConfig::Exponential { lambda } => Ok(DelayDistribution::Exponential(
                Exp::new(*lambda).map_err(invalid)?,
            )),
            DelayConfig::Lognormal { mean, sigma } => {
                if *sigma == 0.0 {
                    Ok(DelayDistribution::Degenerate(mean.exp()))
                } else {
                    Ok(DelayDistribution::LogNormal(
                        LogNormal::new(*mean, *sigma).map_err(invalid)?,
                    ))
                }
            }
            DelayConfig::FromFile {
                filepath,
                approximate_distribution,
            } => {
                let key = (filepath.clone(), *approximate_distribution);
                if let Some(distr) = self.fitted.get(&key) {
                    return Ok(distr.clone());
                }
                let distr = fit_file(filepath, *approximate_distribution)?;
                self.fitted.insert(key, distr.clone());
                Ok(distr)
            }
        }
    }

    /// Number of distinct reference samples fitted so far
    #[must_use]
    pub fn fitted_count(&self) -> usize {
        self.fitted.len()
    }
}

fn fit_file(path: &Path, family: FitFamily) -> Result<DelayDistribution, EpiError> {
    if !path.exists() {
        return Err(EpiError::InvalidDistribution(format!(
            "reference sample {} does not exist",
            path.display()
        )));
    }
    let sample = read_sample(path)?;
    let distr = match family {
        FitFamily::Lognormal => {
            let LogNormalFit { mu, sigma } = fit_lognormal(&sample)?;
            info!(
                "fitted lognormal to {}: mu={mu} sigma={sigma}",
                path.display()
            );
            if sigma == 0.0 {
                DelayDistribution::Degenerate(mu.exp())
            } else {
                DelayDistribution::LogNormal(LogNormal::new(mu, sigma).map_err(invalid)?)
            }
        }
        FitFamily::Gamma => {
            let GammaFit { shape, scale } = fit_gamma(&sample)?;
            info!(
                "fitted gamma to {}: shape={shape} scale={scale}",
                path.display()
            );
            if shape.is_infinite() {
                DelayDistribution::Degenerate(sample[0])
            } else {
                DelayDistribution::Gamma(Gamma::new(shape, scale).map_err(invalid)?)
            }
        }
    };
    debug!("cached {family} fit for {}", path.display());
    Ok(distr)
}
