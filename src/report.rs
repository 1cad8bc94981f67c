use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::analysis::Analysis;

pub fn render_report(
    analysis: &Analysis,
    senior_name: &str,
    session_date: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "Brain Health Training Report");
    let _ = writeln!(output, "===========================");
    let _ = writeln!(output);
    let _ = writeln!(output, "Senior: {senior_name}");
    let _ = writeln!(output, "Date: {session_date}");
    let _ = writeln!(output);
    let _ = writeln!(output, "SUMMARY");
    let _ = writeln!(output, "-------");
    let _ = writeln!(output, "{}", analysis.summary);
    let _ = writeln!(output);
    let _ = writeln!(output, "PERFORMANCE SCORE: {}/100", analysis.performance_score);
    let _ = writeln!(output);
    let _ = writeln!(output, "KEY METRICS");
    let _ = writeln!(output, "-----------");

    if let Some(metrics) = analysis.key_metrics.as_object() {
        for (name, value) in metrics {
            let _ = writeln!(output, "{name}: {}", metric_value(value));
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "RECOMMENDATIONS");
    let _ = writeln!(output, "---------------");
    for (i, recommendation) in analysis.recommendations.iter().enumerate() {
        let _ = writeln!(output, "{}. {recommendation}", i + 1);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Generated on: {}", generated_at.to_rfc3339());

    output
}

fn metric_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Placeholder PDF serializer: the report body as UTF-8 bytes.
pub fn to_pdf_bytes(report: &str) -> Vec<u8> {
    report.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_analysis() -> Analysis {
        Analysis {
            summary: "Automated analysis of motor training session based on sensor data.".to_string(),
            key_metrics: json!({ "duration": 1800, "completion_rate": 95, "effort_level": "moderate" }),
            recommendations: vec![
                "Session completed successfully".to_string(),
                "Continue regular training schedule".to_string(),
            ],
            performance_score: 82,
        }
    }

    #[test]
    fn report_contains_all_sections() {
        let generated = Utc.with_ymd_and_hms(2026, 8, 19, 9, 0, 0).unwrap();
        let report = render_report(&sample_analysis(), "Margaret Olsen", "2026-08-18", generated);

        assert!(report.contains("Brain Health Training Report"));
        assert!(report.contains("Senior: Margaret Olsen"));
        assert!(report.contains("PERFORMANCE SCORE: 82/100"));
        assert!(report.contains("duration: 1800"));
        assert!(report.contains("effort_level: moderate"));
        assert!(report.contains("1. Session completed successfully"));
        assert!(report.contains("2026-08-19"));
    }

    #[test]
    fn pdf_bytes_round_trip_as_utf8() {
        let report = "line one\nline two\n";
        let bytes = to_pdf_bytes(report);
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), report);
    }
}
