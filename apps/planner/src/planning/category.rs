use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::planning::PlanningError;

/// Study layout. Grid studies may cap how many categories are active in one row;
/// layer studies let every layer be active independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyMode {
    #[default]
    Grid,
    Layer,
}

impl StudyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyMode::Grid => "grid",
            StudyMode::Layer => "layer",
        }
    }
}

impl fmt::Display for StudyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of one category (grid) or layer (layer study).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(alias = "category_name", alias = "layer_name")]
    pub name: String,
    #[serde(alias = "images")]
    pub elements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub elements: Vec<String>,
}

/// Validated, ordered mapping of category name to element identifiers.
///
/// Counts are computed once at construction; the struct has no mutators, so
/// `total_elements` can never drift from the element lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    categories: Vec<Category>,
    counts: Vec<u64>,
    total_elements: u64,
}

impl CategoryInfo {
    pub fn new<N, E, I>(entries: I) -> Result<Self, PlanningError>
    where
        N: Into<String>,
        E: Into<String>,
        I: IntoIterator<Item = (N, Vec<E>)>,
    {
        let categories: Vec<Category> = entries
            .into_iter()
            .map(|(name, elements)| Category {
                name: name.into(),
                elements: elements.into_iter().map(Into::into).collect(),
            })
            .collect();

        if categories.is_empty() {
            return Err(PlanningError::Configuration(
                "at least one category is required".to_string(),
            ));
        }

        let mut seen_names = HashSet::new();
        for category in &categories {
            if !seen_names.insert(category.name.as_str()) {
                return Err(PlanningError::Configuration(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
            if category.elements.is_empty() {
                return Err(PlanningError::Configuration(format!(
                    "category '{}' has no elements",
                    category.name
                )));
            }
            let mut seen_elements = HashSet::new();
            for element in &category.elements {
                if !seen_elements.insert(element.as_str()) {
                    return Err(PlanningError::Configuration(format!(
                        "duplicate element '{element}' in category '{}'",
                        category.name
                    )));
                }
            }
        }

        let counts: Vec<u64> = categories.iter().map(|c| c.elements.len() as u64).collect();
        let total_elements = counts.iter().sum();

        Ok(Self {
            categories,
            counts,
            total_elements,
        })
    }

    pub fn from_inputs(inputs: &[CategoryInput]) -> Result<Self, PlanningError> {
        Self::new(
            inputs
                .iter()
                .map(|c| (c.name.clone(), c.elements.clone())),
        )
    }

    /// Per-category element counts `q[c]`, in category order.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// `C`
    pub fn category_count(&self) -> u64 {
        self.categories.len() as u64
    }

    /// `M`
    pub fn total_elements(&self) -> u64 {
        self.total_elements
    }

    /// Iterates `(name, q[c])` pairs in category order.
    pub fn iter_counts(&self) -> impl Iterator<Item = (&str, u64)> {
        self.categories
            .iter()
            .zip(self.counts.iter())
            .map(|(c, &q)| (c.name.as_str(), q))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_totals() {
        let info = CategoryInfo::new(vec![
            ("A", vec!["a1", "a2"]),
            ("B", vec!["b1", "b2", "b3"]),
        ])
        .unwrap();
        assert_eq!(info.counts(), &[2, 3]);
        assert_eq!(info.category_count(), 2);
        assert_eq!(info.total_elements(), 5);
        let pairs: Vec<_> = info.iter_counts().collect();
        assert_eq!(pairs, vec![("A", 2), ("B", 3)]);
    }

    #[test]
    fn test_empty_mapping_rejected() {
        let err = CategoryInfo::new(Vec::<(String, Vec<String>)>::new()).unwrap_err();
        assert!(matches!(err, PlanningError::Configuration(_)));
    }

    #[test]
    fn test_empty_category_rejected() {
        let err = CategoryInfo::new(vec![("A", vec!["a1"]), ("B", vec![])]).unwrap_err();
        match err {
            PlanningError::Configuration(msg) => assert!(msg.contains("'B'"), "{msg}"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_element_within_category_rejected() {
        let err = CategoryInfo::new(vec![("A", vec!["a1", "a1"])]).unwrap_err();
        assert!(matches!(err, PlanningError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_element_across_categories_allowed() {
        let info = CategoryInfo::new(vec![("A", vec!["x"]), ("B", vec!["x"])]).unwrap();
        assert_eq!(info.total_elements(), 2);
    }

    #[test]
    fn test_duplicate_category_rejected() {
        let err = CategoryInfo::new(vec![("A", vec!["a1"]), ("A", vec!["a2"])]).unwrap_err();
        assert!(matches!(err, PlanningError::Configuration(_)));
    }

    #[test]
    fn test_from_inputs_accepts_aliases() {
        let inputs: Vec<CategoryInput> = serde_json::from_str(
            r#"[{"category_name": "Brand", "elements": ["b1", "b2"]},
                {"layer_name": "Background", "images": ["bg1"]}]"#,
        )
        .unwrap();
        let info = CategoryInfo::from_inputs(&inputs).unwrap();
        let pairs: Vec<_> = info.iter_counts().collect();
        assert_eq!(pairs, vec![("Brand", 2), ("Background", 1)]);
    }

    #[test]
    fn test_study_mode_wire_format() {
        assert_eq!(
            serde_json::from_str::<StudyMode>("\"grid\"").unwrap(),
            StudyMode::Grid
        );
        assert!(serde_json::from_str::<StudyMode>("\"matrix\"").is_err());
        assert_eq!(
            serde_json::to_string(&StudyMode::Layer).unwrap(),
            "\"layer\""
        );
    }
}
