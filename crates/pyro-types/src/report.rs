//! Parameter importance report.

use serde::{Deserialize, Serialize};

/// Importance of one parameter, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterImportance {
    pub name: String,
    pub score: f64,
}

/// Parameters ranked by descending importance; scores sum to about one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportanceReport {
    pub ranking: Vec<ParameterImportance>,
}

impl ImportanceReport {
    /// Build a report from per-parameter scores given in parameter order.
    pub fn from_scores(names: &[String], scores: &[f64]) -> Self {
        let mut ranking: Vec<ParameterImportance> = names
            .iter()
            .zip(scores)
            .map(|(name, &score)| ParameterImportance {
                name: name.clone(),
                score,
            })
            .collect();
        // Stable sort keeps parameter order among equal scores.
        ranking.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { ranking }
    }

    pub fn top(&self) -> Option<&ParameterImportance> {
        self.ranking.first()
    }

    pub fn score_of(&self, name: &str) -> Option<f64> {
        self.ranking.iter().find(|p| p.name == name).map(|p| p.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_sorted_descending() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let report = ImportanceReport::from_scores(&names, &[0.2, 0.5, 0.3]);

        let order: Vec<&str> = report.ranking.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(report.top().unwrap().name, "b");
        assert_eq!(report.score_of("a"), Some(0.2));
    }
}
