//! Report summaries for display.

use dmp_eval_state::{Evaluation, ReportId, Verdict};
use serde::{Deserialize, Serialize};

/// Verdict counts of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub report_id: ReportId,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub indeterminate: usize,
    /// `passed / total`, 0.0 for an empty report.
    pub pass_rate: f32,
}

impl ReportSummary {
    pub fn from_evaluations(report_id: &ReportId, evaluations: &[Evaluation]) -> Self {
        let count = |v: Verdict| evaluations.iter().filter(|e| e.result == v).count();
        let total = evaluations.len();
        let passed = count(Verdict::Pass);
        let pass_rate = if total == 0 {
            0.0
        } else {
            passed as f32 / total as f32
        };
        Self {
            report_id: report_id.clone(),
            total,
            passed,
            failed: count(Verdict::Fail),
            indeterminate: count(Verdict::Indeterminate),
            pass_rate,
        }
    }
}

impl std::fmt::Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "report {}: {} evaluations, {} passed, {} failed, {} indeterminate ({:.0}% pass)",
            self.report_id,
            self.total,
            self.passed,
            self.failed,
            self.indeterminate,
            self.pass_rate * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmp_eval_state::TestRecord;

    fn eval(result: Verdict) -> Evaluation {
        let test = TestRecord::new("t", "P", "f");
        Evaluation::new(result, &test, &ReportId::from("r"), "P::f")
    }

    #[test]
    fn counts_each_verdict() {
        let evals = vec![
            eval(Verdict::Pass),
            eval(Verdict::Pass),
            eval(Verdict::Fail),
            eval(Verdict::Indeterminate),
        ];
        let summary = ReportSummary::from_evaluations(&ReportId::from("r"), &evals);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.indeterminate, 1);
        assert!((summary.pass_rate - 0.5).abs() < f32::EPSILON);
        assert_eq!(
            summary.to_string(),
            "report r: 4 evaluations, 2 passed, 1 failed, 1 indeterminate (50% pass)"
        );
    }

    #[test]
    fn empty_report_has_zero_pass_rate() {
        let summary = ReportSummary::from_evaluations(&ReportId::from("r"), &[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pass_rate, 0.0);
    }
}
