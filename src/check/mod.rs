// Degradation checking
//
// Resolves which methods apply to a profile, compares target profiles with
// their baselines and renders the resulting change reports. Methods either
// compare raw amounts or the regression models fitted to them.

mod change;
mod config;
mod detection;
mod methods;
mod report;
mod runner;
mod strategy;

pub use change::{ChangeKind, ChangeReport};
pub use config::{CheckConfig, ConfigError, DegradationConfig};
pub use detection::{FastCheck, IntegralComparison, LinearRegression, CURVE_SAMPLES};
pub use methods::{AverageAmountThreshold, BestModelOrder, DegradationMethod, MethodParams, MethodRegistry};
pub use report::{render_reports, ChangeSummary};
pub use runner::{CheckError, Checker, NotComparable, ProfileCheck, VersionCheck};
pub use strategy::{resolve, ApplyMode, StrategyRule};
