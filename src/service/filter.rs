use crate::domain::models::RecallRecord;

/// Drops records whose product type falls outside the target categories.
///
/// Matching is a case-sensitive substring test: listing labels carry
/// qualifiers ("Animal & Veterinary, Pet Food"), so exact matches would miss.
#[derive(Debug, Clone)]
pub struct CategoryFilter {
    exclusions: Vec<String>,
}

impl CategoryFilter {
    pub fn new(exclusions: &[String]) -> Self {
        Self {
            exclusions: exclusions
                .iter()
                .filter(|e| !e.is_empty())
                .cloned()
                .collect(),
        }
    }

    pub fn keep(&self, record: &RecallRecord) -> bool {
        !self
            .exclusions
            .iter()
            .any(|excluded| record.product_type.contains(excluded.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(product_type: &str) -> RecallRecord {
        RecallRecord {
            product_type: product_type.to_string(),
            ..Default::default()
        }
    }

    fn filter() -> CategoryFilter {
        CategoryFilter::new(&[
            "Animal & Veterinary".to_string(),
            "Cosmetics".to_string(),
            "Medical Devices".to_string(),
        ])
    }

    #[test]
    fn test_substring_exclusion() {
        let filter = filter();
        assert!(!filter.keep(&record("Animal & Veterinary, Pet Food")));
        assert!(!filter.keep(&record("Food & Beverages, Cosmetics")));
        assert!(!filter.keep(&record("Medical Devices")));
        assert!(filter.keep(&record("Food & Beverages, Allergens")));
    }

    #[test]
    fn test_case_sensitive() {
        assert!(filter().keep(&record("cosmetics")));
    }

    #[test]
    fn test_empty_exclusion_ignored() {
        let filter = CategoryFilter::new(&[String::new()]);
        assert!(filter.keep(&record("Food & Beverages")));
    }
}
