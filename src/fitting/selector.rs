use crate::fitting::family::{Model, ModelFamily};
use std::collections::BTreeMap;

/// Outcome of best-model selection for one uid
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Best(Model),
    /// No family could be fitted; the uid is not comparable
    Unknown,
}

impl Selection {
    pub fn model(&self) -> Option<&Model> {
        match self {
            Selection::Best(model) => Some(model),
            Selection::Unknown => None,
        }
    }

    pub fn family(&self) -> Option<ModelFamily> {
        self.model().map(|m| m.family)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Selection::Unknown)
    }
}

/// Pick the model with the highest R^2
///
/// Ties are broken by the lexicographically earlier family name, so the result
/// does not depend on the order of the input.
pub fn select_best(models: &BTreeMap<ModelFamily, Model>) -> Selection {
    select_best_of(models.values())
}

/// Same as [`select_best`] over any collection of models, e.g. stored ones
pub fn select_best_of<'a, I>(models: I) -> Selection
where
    I: IntoIterator<Item = &'a Model>,
{
    let mut best: Option<&Model> = None;

    for candidate in models {
        if !candidate.r_square.is_finite() {
            continue;
        }
        best = match best {
            None => Some(candidate),
            Some(current) if beats(candidate, current) => Some(candidate),
            keep => keep,
        };
    }

    best.cloned().map_or(Selection::Unknown, Selection::Best)
}

fn beats(candidate: &Model, current: &Model) -> bool {
    candidate.r_square > current.r_square
        || (candidate.r_square == current.r_square
            && candidate.family.name() < current.family.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(family: ModelFamily, r_square: f64) -> Model {
        Model {
            family,
            coefficients: vec![0.0; family.coefficient_count()],
            r_square,
            x_start: 0.0,
            x_end: 1.0,
        }
    }

    #[test]
    fn test_empty_is_unknown() {
        assert_eq!(select_best(&BTreeMap::new()), Selection::Unknown);
        assert!(select_best_of(&[]).is_unknown());
    }

    #[test]
    fn test_highest_r_square_wins() {
        let models = [
            model(ModelFamily::Linear, 0.7),
            model(ModelFamily::Quadratic, 0.95),
            model(ModelFamily::Constant, 0.0),
        ];
        assert_eq!(select_best_of(&models).family(), Some(ModelFamily::Quadratic));
    }

    #[test]
    fn test_tie_break_by_name_in_any_order() {
        let forward = [
            model(ModelFamily::Power, 0.9),
            model(ModelFamily::Linear, 0.9),
        ];
        let backward = [
            model(ModelFamily::Linear, 0.9),
            model(ModelFamily::Power, 0.9),
        ];
        assert_eq!(select_best_of(&forward).family(), Some(ModelFamily::Linear));
        assert_eq!(select_best_of(&backward).family(), Some(ModelFamily::Linear));
    }

    #[test]
    fn test_nan_scores_ignored() {
        let models = [
            model(ModelFamily::Exponential, f64::NAN),
            model(ModelFamily::Linear, 0.1),
        ];
        assert_eq!(select_best_of(&models).family(), Some(ModelFamily::Linear));

        let only_nan = [model(ModelFamily::Exponential, f64::NAN)];
        assert!(select_best_of(&only_nan).is_unknown());
    }
}
