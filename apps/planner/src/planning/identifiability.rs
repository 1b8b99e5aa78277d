use crate::planning::category::CategoryInfo;

/// Number of free parameters in a main-effects-only linear model over the design:
/// one intercept plus `q[c] - 1` indicators per category, i.e. `M - C + 1`.
///
/// This is the row floor a design must clear before it is estimable.
pub fn params_main_effects(info: &CategoryInfo) -> u64 {
    // q[c] >= 1 for every category, so M >= C and this cannot underflow.
    info.total_elements() - info.category_count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_categories() {
        let info = CategoryInfo::new(vec![
            ("A", vec!["a1", "a2"]),
            ("B", vec!["b1", "b2", "b3"]),
        ])
        .unwrap();
        assert_eq!(params_main_effects(&info), 4);
    }

    #[test]
    fn test_singleton_categories_leave_only_intercept() {
        let info = CategoryInfo::new(vec![("A", vec!["a"]), ("B", vec!["b"]), ("C", vec!["c"])])
            .unwrap();
        assert_eq!(params_main_effects(&info), 1);
    }

    #[test]
    fn test_matches_per_category_sum() {
        let info = CategoryInfo::new(vec![
            ("A", vec!["1", "2", "3", "4"]),
            ("B", vec!["1", "2"]),
            ("C", vec!["1", "2", "3", "4", "5"]),
        ])
        .unwrap();
        let expected = 1 + info.counts().iter().map(|q| q - 1).sum::<u64>();
        assert_eq!(params_main_effects(&info), expected);
    }
}
