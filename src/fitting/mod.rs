// Regression model fitting and selection
//
// Fits a fixed catalogue of parametric model families to the observations of
// one resource group and selects the family that explains the data best.
//
// All fits are closed-form least squares on a linearized form of the family
// (e.g. log10(y) = log10(a) + b * log10(x) for power), so results are
// deterministic and bit-identical across runs. Goodness of fit (R^2) is always
// computed against the original y values, which keeps scores comparable
// across families.
//
// Failures are typed (FitFailure) and local to one family: fit_all() drops
// failed families, and select_best() reports Selection::Unknown when nothing
// is left.

mod family;
mod fitter;
mod selector;

pub use family::{Model, ModelFamily};
pub use fitter::{fit, fit_all, FitFailure};
pub use selector::{select_best, select_best_of, Selection};
