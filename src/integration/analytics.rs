//! Pure aggregation over collections of integration errors

use super::error::{ErrorCategory, ErrorSeverity, IntegrationError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Errors sharing a message and category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPattern {
    pub message: String,
    pub category: ErrorCategory,
    pub count: usize,
    pub first_occurrence: DateTime<Utc>,
    pub last_occurrence: DateTime<Utc>,
}

/// Input for [`generate_health_report`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub total_requests: u64,
    pub time_window: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorHealthReport {
    pub total_errors: usize,
    /// Percentage of requests that failed; not clamped
    pub error_rate: f64,
    pub severity_breakdown: IndexMap<ErrorSeverity, usize>,
    pub category_breakdown: IndexMap<ErrorCategory, usize>,
    pub time_window: String,
}

/// Group by (message, category), most frequent first. Ties keep first-seen order.
pub fn analyze_error_patterns(errors: &[IntegrationError]) -> Vec<ErrorPattern> {
    let mut groups: IndexMap<(&str, ErrorCategory), ErrorPattern> = IndexMap::new();

    for error in errors {
        let ts = error.timestamp();
        groups
            .entry((error.message(), error.category()))
            .and_modify(|p| {
                p.count += 1;
                p.first_occurrence = p.first_occurrence.min(ts);
                p.last_occurrence = p.last_occurrence.max(ts);
            })
            .or_insert_with(|| ErrorPattern {
                message: error.message().to_string(),
                category: error.category(),
                count: 1,
                first_occurrence: ts,
                last_occurrence: ts,
            });
    }

    let mut patterns: Vec<ErrorPattern> = groups.into_values().collect();
    // sort_by is stable
    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns
}

/// Occurrences per category, every category present
pub fn calculate_error_rates(errors: &[IntegrationError]) -> IndexMap<ErrorCategory, usize> {
    let mut rates: IndexMap<ErrorCategory, usize> =
        ErrorCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for error in errors {
        *rates.entry(error.category()).or_insert(0) += 1;
    }
    rates
}

pub fn generate_health_report(errors: &[IntegrationError], options: &ReportOptions) -> ErrorHealthReport {
    let mut severity_breakdown: IndexMap<ErrorSeverity, usize> =
        ErrorSeverity::ALL.iter().map(|s| (*s, 0)).collect();
    for error in errors {
        *severity_breakdown.entry(error.severity()).or_insert(0) += 1;
    }

    ErrorHealthReport {
        total_errors: errors.len(),
        error_rate: errors.len() as f64 / options.total_requests as f64 * 100.0,
        severity_breakdown,
        category_breakdown: calculate_error_rates(errors),
        time_window: options.time_window.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn err_at(message: &str, category: ErrorCategory, severity: ErrorSeverity, secs: i64) -> IntegrationError {
        let ts = Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap();
        IntegrationError::at(message, severity, category, ts)
    }

    #[test]
    fn test_patterns_grouped_and_sorted() {
        let errors = vec![
            err_at("Invalid credentials", ErrorCategory::Authentication, ErrorSeverity::High, 0),
            err_at("Connection timeout", ErrorCategory::ExternalApi, ErrorSeverity::Medium, 10),
            err_at("Connection timeout", ErrorCategory::ExternalApi, ErrorSeverity::Medium, 5),
            err_at("Connection timeout", ErrorCategory::ExternalApi, ErrorSeverity::Medium, 20),
        ];

        let patterns = analyze_error_patterns(&errors);

        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].message, "Connection timeout");
        assert_eq!(patterns[0].count, 3);
        assert_eq!(patterns[0].first_occurrence, errors[2].timestamp());
        assert_eq!(patterns[0].last_occurrence, errors[3].timestamp());
        assert_eq!(patterns[1].category, ErrorCategory::Authentication);
    }

    #[test]
    fn test_same_message_different_category_are_distinct() {
        let errors = vec![
            err_at("Timeout", ErrorCategory::ExternalApi, ErrorSeverity::Low, 0),
            err_at("Timeout", ErrorCategory::Messaging, ErrorSeverity::Low, 1),
        ];
        assert_eq!(analyze_error_patterns(&errors).len(), 2);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let errors = vec![
            err_at("b", ErrorCategory::System, ErrorSeverity::Low, 0),
            err_at("a", ErrorCategory::System, ErrorSeverity::Low, 1),
            err_at("c", ErrorCategory::System, ErrorSeverity::Low, 2),
            err_at("a", ErrorCategory::System, ErrorSeverity::Low, 3),
            err_at("b", ErrorCategory::System, ErrorSeverity::Low, 4),
        ];
        let order: Vec<_> = analyze_error_patterns(&errors).into_iter().map(|p| p.message).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_error_rates_cover_all_categories() {
        let errors = vec![
            err_at("x", ErrorCategory::Messaging, ErrorSeverity::Low, 0),
            err_at("y", ErrorCategory::Messaging, ErrorSeverity::Low, 0),
            err_at("z", ErrorCategory::System, ErrorSeverity::Low, 0),
        ];

        let rates = calculate_error_rates(&errors);

        assert_eq!(rates.len(), 8);
        assert_eq!(rates.values().sum::<usize>(), errors.len());
        assert_eq!(rates[&ErrorCategory::Messaging], 2);
        assert_eq!(rates[&ErrorCategory::Validation], 0);
    }

    #[test]
    fn test_error_rates_empty() {
        let rates = calculate_error_rates(&[]);
        assert_eq!(rates.len(), 8);
        assert!(rates.values().all(|v| *v == 0));
    }

    #[test]
    fn test_health_report() {
        let errors = vec![
            err_at("a", ErrorCategory::ExternalApi, ErrorSeverity::Critical, 0),
            err_at("b", ErrorCategory::ExternalApi, ErrorSeverity::Low, 0),
            err_at("c", ErrorCategory::Validation, ErrorSeverity::Low, 0),
        ];
        let options = ReportOptions { total_requests: 200, time_window: "1h".to_string() };

        let report = generate_health_report(&errors, &options);

        assert_eq!(report.total_errors, 3);
        assert_eq!(report.error_rate, 3.0 / 200.0 * 100.0);
        assert_eq!(report.severity_breakdown.len(), 4);
        assert_eq!(report.severity_breakdown.values().sum::<usize>(), 3);
        assert_eq!(report.severity_breakdown[&ErrorSeverity::Low], 2);
        assert_eq!(report.severity_breakdown[&ErrorSeverity::High], 0);
        assert_eq!(report.category_breakdown[&ErrorCategory::ExternalApi], 2);
        assert_eq!(report.time_window, "1h");
    }

    #[test]
    fn test_error_rate_not_clamped() {
        let errors: Vec<_> = (0..5)
            .map(|i| err_at("x", ErrorCategory::System, ErrorSeverity::Low, i))
            .collect();
        let options = ReportOptions { total_requests: 2, time_window: "5m".to_string() };
        assert_eq!(generate_health_report(&errors, &options).error_rate, 250.0);
    }

    #[test]
    fn test_first_occurrence_tracks_minimum() {
        let base = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let later = IntegrationError::at("x", ErrorSeverity::Low, ErrorCategory::System, base + Duration::seconds(30));
        let earlier = IntegrationError::at("x", ErrorSeverity::Low, ErrorCategory::System, base);

        let patterns = analyze_error_patterns(&[later, earlier]);
        assert_eq!(patterns[0].first_occurrence, base);
        assert_eq!(patterns[0].last_occurrence, base + Duration::seconds(30));
    }
}
