//! Checks delegated to the FAIR Champion assessment service.

use std::sync::Arc;

use async_trait::async_trait;
use dmp_eval_lookup::{FairAssessmentLookup, LookupResponse};
use dmp_eval_state::{Evaluation, Verdict};

use crate::evaluators::dataset_identifiers;
use crate::plugin::{Check, CheckInput, EvaluatorPlugin, FunctionTable};

pub const PLUGIN_ID: &str = "FAIR_Champion";

/// Remote test asking whether a resource's metadata carries a license.
pub const LICENSE_TEST: &str = "fc_metadata_includes_license";

pub struct FairChampionEvaluator {
    functions: FunctionTable,
}

impl FairChampionEvaluator {
    pub fn new(assessor: Arc<dyn FairAssessmentLookup>) -> Self {
        Self {
            functions: FunctionTable::new().with("evaluateLicense", LicenseCheck { assessor }),
        }
    }
}

impl EvaluatorPlugin for FairChampionEvaluator {
    fn identifier(&self) -> &str {
        PLUGIN_ID
    }

    fn description(&self) -> &str {
        "Evaluator to perform External calls for tests"
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

struct LicenseCheck {
    assessor: Arc<dyn FairAssessmentLookup>,
}

/// Verdict carried by an assessment response.
fn assessment_verdict(response: &LookupResponse) -> Verdict {
    if !response.success {
        return Verdict::Indeterminate;
    }
    let outcome = response
        .data_str("value")
        .or_else(|| response.data_str("result"))
        .map(str::to_ascii_lowercase);
    match outcome.as_deref() {
        Some("pass") => Verdict::Pass,
        Some("fail") => Verdict::Fail,
        _ => Verdict::Indeterminate,
    }
}

#[async_trait]
impl Check for LicenseCheck {
    async fn run(&self, input: CheckInput<'_>) -> Evaluation {
        let datasets = dataset_identifiers(input.document).unwrap_or_default();
        if datasets.is_empty() {
            return input
                .evaluation(Verdict::Fail)
                .with_log("There is no dataset identifier in the DMP to assess")
                .with_affected_elements("datasets []");
        }

        let mut verdict = Verdict::Pass;
        let mut log = Vec::with_capacity(datasets.len());
        for resource in &datasets {
            let response = self.assessor.assess(LICENSE_TEST, resource).await;
            let outcome = assessment_verdict(&response);
            if response.success {
                log.push(format!("{LICENSE_TEST} on {resource}: {outcome}"));
            } else {
                log.push(format!(
                    "{LICENSE_TEST} on {resource} could not be assessed: {}",
                    response.error.as_deref().unwrap_or("Unknown error")
                ));
            }
            verdict = verdict.and(outcome);
        }

        input
            .evaluation(verdict)
            .with_log(log.join("\n"))
            .with_affected_elements(format!("datasets [{}]", datasets.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use dmp_eval_lookup::fakes::StaticLookup;
    use dmp_eval_state::{ReportId, TestRecord};
    use serde_json::{json, Value};

    async fn run(lookup: StaticLookup, doc: Value) -> Evaluation {
        let plugin = FairChampionEvaluator::new(Arc::new(lookup));
        let check = plugin.function("evaluateLicense").unwrap();
        let doc = Document::new(doc);
        let test = TestRecord::new("t", PLUGIN_ID, "evaluateLicense");
        let report = ReportId::from("r");
        check
            .run(CheckInput {
                document: &doc,
                report_id: &report,
                test: &test,
                provenance: "FAIR_Champion::evaluateLicense",
            })
            .await
    }

    fn plan() -> Value {
        json!({"dmp": {"dataset": [
            {"dataset_id": {"identifier": "10.1/a", "type": "doi"}},
            {"dataset_id": {"identifier": "10.1/b", "type": "doi"}}
        ]}})
    }

    #[test]
    fn response_outcomes() {
        let ok = LookupResponse::ok;
        assert_eq!(assessment_verdict(&ok(json!({"value": "pass"}))), Verdict::Pass);
        assert_eq!(assessment_verdict(&ok(json!({"result": "FAIL"}))), Verdict::Fail);
        assert_eq!(
            assessment_verdict(&ok(json!({"value": "maybe"}))),
            Verdict::Indeterminate
        );
        assert_eq!(
            assessment_verdict(&LookupResponse::failed("boom", Some(500))),
            Verdict::Indeterminate
        );
    }

    #[tokio::test]
    async fn every_dataset_is_assessed() {
        let lookup = StaticLookup::new()
            .with_assessment(LICENSE_TEST, "10.1/a", LookupResponse::ok(json!({"value": "pass"})))
            .with_assessment(LICENSE_TEST, "10.1/b", LookupResponse::ok(json!({"value": "pass"})));
        let eval = run(lookup, plan()).await;
        assert_eq!(eval.result, Verdict::Pass);
        assert_eq!(eval.affected_elements.as_deref(), Some("datasets [10.1/a, 10.1/b]"));
    }

    #[tokio::test]
    async fn fail_dominates_unreachable() {
        let lookup = StaticLookup::new()
            .with_assessment(LICENSE_TEST, "10.1/a", LookupResponse::ok(json!({"result": "fail"})));
        let eval = run(lookup, plan()).await;
        assert_eq!(eval.result, Verdict::Fail);
        assert!(eval.log.contains("10.1/b could not be assessed"));
    }

    #[tokio::test]
    async fn no_datasets_fails() {
        let eval = run(StaticLookup::new(), json!({"dmp": {}})).await;
        assert_eq!(eval.result, Verdict::Fail);
    }
}
