// src/model/labels.rs

//! Label keys written onto synchronized records

/// Prefix shared by every label this controller owns
pub const DOMAIN: &str = "marketplace.criticalstack.com/";

/// Name of the Source an Application was synchronized from
pub const SOURCE_NAME: &str = "marketplace.criticalstack.com/source.name";

/// Package name of an Application within its Source
pub const APPLICATION_NAME: &str = "marketplace.criticalstack.com/application.name";

/// Prefix of per-category membership labels (value is always empty)
pub const CATEGORY_PREFIX: &str = "marketplace.criticalstack.com/application.category.";

/// Set to `"true"` when any recorded version is deprecated
pub const DEPRECATED: &str = "marketplace.criticalstack.com/app.deprecated";

pub fn category_label(category: &str) -> String {
    format!("{CATEGORY_PREFIX}{category}")
}

/// Category name carried by a label key, if it is a category label
pub fn category_of(key: &str) -> Option<&str> {
    key.strip_prefix(CATEGORY_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_label_round_trip() {
        let key = category_label("database");
        assert_eq!(key, "marketplace.criticalstack.com/application.category.database");
        assert_eq!(category_of(&key), Some("database"));
        assert_eq!(category_of(SOURCE_NAME), None);
    }
}
