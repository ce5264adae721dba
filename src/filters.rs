//! Request filter resolution.
//!
//! Turns the raw query string of a data request into [`FilterParams`]. This
//! is the only place request parameters are looked up by name.

pub const DEFAULT_START_DATE: &str = "2025-10-01";
pub const DEFAULT_END_DATE: &str = "2025-10-07";

/// Category value the frontend sends when no category is selected.
pub const ALL_CATEGORIES: &str = "All Categories";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterParams {
    /// Inclusive lower bound on the request's creation date, as supplied.
    pub start_date: String,
    /// Inclusive upper bound on the request's creation date, as supplied.
    pub end_date: String,
    pub category: Option<String>,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            start_date: DEFAULT_START_DATE.to_string(),
            end_date: DEFAULT_END_DATE.to_string(),
            category: None,
        }
    }
}

impl FilterParams {
    /// Resolve filters from decoded query-string pairs.
    ///
    /// The first occurrence of a key wins and unknown keys are ignored. Dates
    /// are not validated here: a malformed date reaches the warehouse as a
    /// typed DATE parameter and fails there.
    pub fn resolve<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut start_date = None;
        let mut end_date = None;
        let mut category = None;

        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "start_date" => &mut start_date,
                "end_date" => &mut end_date,
                "category" => &mut category,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }

        Self {
            start_date: start_date.unwrap_or_else(|| DEFAULT_START_DATE.to_string()),
            end_date: end_date.unwrap_or_else(|| DEFAULT_END_DATE.to_string()),
            category: category.filter(|c: &String| !c.is_empty() && c != ALL_CATEGORIES),
        }
    }

    /// Resolve filters from a raw, still percent-encoded query string.
    pub fn from_query_string(query: Option<&str>) -> Self {
        let query = query.unwrap_or_default();
        Self::resolve(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let params = FilterParams::resolve(Vec::<(&str, &str)>::new());
        assert_eq!(params, FilterParams::default());
        assert_eq!(params.start_date, "2025-10-01");
        assert_eq!(params.end_date, "2025-10-07");
        assert!(params.category.is_none());
    }

    #[test]
    fn test_explicit_dates_pass_through() {
        let params = FilterParams::resolve([("start_date", "2024-01-01"), ("end_date", "2024-02-01")]);
        assert_eq!(params.start_date, "2024-01-01");
        assert_eq!(params.end_date, "2024-02-01");
    }

    #[test]
    fn test_malformed_dates_are_not_validated() {
        let params = FilterParams::resolve([("start_date", "not-a-date"), ("end_date", "")]);
        assert_eq!(params.start_date, "not-a-date");
        assert_eq!(params.end_date, "");
    }

    #[test]
    fn test_all_categories_sentinel_means_no_filter() {
        let params = FilterParams::resolve([("category", "All Categories")]);
        assert!(params.category.is_none());
        assert_eq!(params, FilterParams::resolve(Vec::<(&str, &str)>::new()));
    }

    #[test]
    fn test_empty_category_means_no_filter() {
        let params = FilterParams::resolve([("category", "")]);
        assert!(params.category.is_none());
    }

    #[test]
    fn test_category_is_verbatim() {
        let params = FilterParams::resolve([("category", "  street and sidewalk Cleaning ")]);
        assert_eq!(
            params.category.as_deref(),
            Some("  street and sidewalk Cleaning ")
        );

        // Sentinel matching is exact
        let params = FilterParams::resolve([("category", "all categories")]);
        assert_eq!(params.category.as_deref(), Some("all categories"));
    }

    #[test]
    fn test_first_occurrence_wins() {
        let params = FilterParams::resolve([
            ("category", "Graffiti"),
            ("category", "Encampments"),
            ("start_date", "2024-03-01"),
            ("start_date", "2024-04-01"),
        ]);
        assert_eq!(params.category.as_deref(), Some("Graffiti"));
        assert_eq!(params.start_date, "2024-03-01");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let params = FilterParams::resolve([("limit", "10"), ("startDate", "2024-01-01")]);
        assert_eq!(params, FilterParams::default());
    }

    #[test]
    fn test_from_query_string_decodes() {
        let params = FilterParams::from_query_string(Some(
            "start_date=2025-09-01&category=Street+and+Sidewalk%20Cleaning",
        ));
        assert_eq!(params.start_date, "2025-09-01");
        assert_eq!(params.end_date, DEFAULT_END_DATE);
        assert_eq!(params.category.as_deref(), Some("Street and Sidewalk Cleaning"));
    }

    #[test]
    fn test_from_query_string_sentinel_encoded() {
        let params = FilterParams::from_query_string(Some("category=All%20Categories"));
        assert!(params.category.is_none());
    }

    #[test]
    fn test_from_query_string_none() {
        assert_eq!(FilterParams::from_query_string(None), FilterParams::default());
    }
}
