use serde::{Deserialize, Serialize};
use std::f64::consts::LN_10;
use std::fmt;
use std::str::FromStr;

/// Parametric function shape fitted to observations
///
/// Variants are declared in lexicographic order of their names, so the derived
/// `Ord` agrees with the name order used for tie-breaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    /// `y = a`
    Constant,
    /// `y = a * b^x`
    #[serde(alias = "exp")]
    Exponential,
    /// `y = a + b * x`
    Linear,
    /// `y = a + b * log10(x)`
    #[serde(alias = "log")]
    Logarithmic,
    /// `y = a * x^b`
    Power,
    /// `y = a + b * x^2`
    #[serde(alias = "quad")]
    Quadratic,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 6] = [
        ModelFamily::Constant,
        ModelFamily::Exponential,
        ModelFamily::Linear,
        ModelFamily::Logarithmic,
        ModelFamily::Power,
        ModelFamily::Quadratic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::Constant => "constant",
            ModelFamily::Exponential => "exponential",
            ModelFamily::Linear => "linear",
            ModelFamily::Logarithmic => "logarithmic",
            ModelFamily::Power => "power",
            ModelFamily::Quadratic => "quadratic",
        }
    }

    /// Position in the complexity ordering used to classify order changes
    ///
    /// constant < logarithmic < linear < quadratic < power < exponential
    pub fn complexity_rank(self) -> u8 {
        match self {
            ModelFamily::Constant => 0,
            ModelFamily::Logarithmic => 1,
            ModelFamily::Linear => 2,
            ModelFamily::Quadratic => 3,
            ModelFamily::Power => 4,
            ModelFamily::Exponential => 5,
        }
    }

    pub fn coefficient_count(self) -> usize {
        match self {
            ModelFamily::Constant => 1,
            _ => 2,
        }
    }

    /// log10(x) is taken during linearization
    pub fn requires_positive_x(self) -> bool {
        matches!(self, ModelFamily::Logarithmic | ModelFamily::Power)
    }

    /// log10(y) is taken during linearization
    pub fn requires_positive_y(self) -> bool {
        matches!(self, ModelFamily::Power | ModelFamily::Exponential)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "constant" => Ok(ModelFamily::Constant),
            "exponential" | "exp" => Ok(ModelFamily::Exponential),
            "linear" => Ok(ModelFamily::Linear),
            "logarithmic" | "log" => Ok(ModelFamily::Logarithmic),
            "power" => Ok(ModelFamily::Power),
            "quadratic" | "quad" => Ok(ModelFamily::Quadratic),
            other => Err(format!("unknown model family '{}'", other)),
        }
    }
}

/// Fitted function `y ≈ f(x; coefficients)` for one uid's observations
///
/// Coefficients are stored in ascending order (`a`, `b`) and are only
/// meaningful for the observation set the model was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub family: ModelFamily,
    pub coefficients: Vec<f64>,
    /// Coefficient of determination against the original y values
    pub r_square: f64,
    pub x_start: f64,
    pub x_end: f64,
}

impl Model {
    /// Value of the fitted function at `x`
    pub fn evaluate(&self, x: f64) -> f64 {
        let c = |i: usize| self.coefficients.get(i).copied().unwrap_or(0.0);
        match self.family {
            ModelFamily::Constant => c(0),
            ModelFamily::Linear => c(0) + c(1) * x,
            ModelFamily::Logarithmic => c(0) + c(1) * x.log10(),
            ModelFamily::Quadratic => c(0) + c(1) * x * x,
            ModelFamily::Power => c(0) * x.powf(c(1)),
            ModelFamily::Exponential => c(0) * c(1).powf(x),
        }
    }

    /// Definite integral of the fitted function over `[start, end]`
    pub fn integral(&self, start: f64, end: f64) -> f64 {
        let c = |i: usize| self.coefficients.get(i).copied().unwrap_or(0.0);
        let width = end - start;
        match self.family {
            ModelFamily::Constant => c(0) * width,
            ModelFamily::Linear => c(0) * width + c(1) * (end * end - start * start) / 2.0,
            ModelFamily::Quadratic => c(0) * width + c(1) * (end.powi(3) - start.powi(3)) / 3.0,
            ModelFamily::Logarithmic => {
                // x * ln(x) - x, continuous at 0
                let antiderivative = |x: f64| if x == 0.0 { 0.0 } else { x * x.ln() - x };
                c(0) * width + c(1) * (antiderivative(end) - antiderivative(start)) / LN_10
            }
            ModelFamily::Power => {
                let k = c(1) + 1.0;
                if k == 0.0 {
                    c(0) * (end / start).ln()
                } else {
                    c(0) * (end.powf(k) - start.powf(k)) / k
                }
            }
            ModelFamily::Exponential => {
                let ln_b = c(1).ln();
                if ln_b == 0.0 {
                    c(0) * width
                } else {
                    c(0) * (c(1).powf(end) - c(1).powf(start)) / ln_b
                }
            }
        }
    }
}
