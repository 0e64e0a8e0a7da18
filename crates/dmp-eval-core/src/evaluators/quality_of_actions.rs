//! Quality-of-actions checks: open access of datasets and DMP identifiers.

use std::sync::Arc;

use async_trait::async_trait;
use dmp_eval_lookup::OpenAccessLookup;
use dmp_eval_state::{Evaluation, Verdict};
use tracing::debug;

use crate::evaluators::dataset_identifiers;
use crate::plugin::{Check, CheckInput, EvaluatorPlugin, FunctionTable};

pub const PLUGIN_ID: &str = "QualityOfActionsEvaluator";

/// Identifier types a `dmp_id` may declare.
pub const DMP_ID_TYPES: [&str; 5] = ["handle", "doi", "ark", "url", "other"];

pub struct QualityOfActionsEvaluator {
    functions: FunctionTable,
}

impl QualityOfActionsEvaluator {
    pub fn new(open_access: Arc<dyn OpenAccessLookup>) -> Self {
        Self {
            functions: FunctionTable::new()
                .with("evaluateOpenAccess", OpenAccessCheck { lookup: open_access })
                .with_fn("dmpIdValid", dmp_id_valid),
        }
    }
}

impl EvaluatorPlugin for QualityOfActionsEvaluator {
    fn identifier(&self) -> &str {
        PLUGIN_ID
    }

    fn description(&self) -> &str {
        "Evaluator to perform FAIR tests"
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

/// Every dataset identifier must resolve to an open-access resource.
struct OpenAccessCheck {
    lookup: Arc<dyn OpenAccessLookup>,
}

#[async_trait]
impl Check for OpenAccessCheck {
    async fn run(&self, input: CheckInput<'_>) -> Evaluation {
        let Some(datasets) = dataset_identifiers(input.document) else {
            return input
                .evaluation(Verdict::Fail)
                .with_log("There is no dataset in the DMP")
                .with_affected_elements("datasets []");
        };

        let mut verdict = Verdict::Pass;
        let mut log = Vec::with_capacity(datasets.len());
        for doi in &datasets {
            let response = self.lookup.check_open_access(doi).await;
            if response.success {
                let is_oa = response.data_bool("is_oa");
                debug!(doi = %doi, ?is_oa, "open access lookup answered");
                if is_oa == Some(true) {
                    log.push(format!(
                        "Successfully fetched unpaywall data doi {doi} - the resource is open access"
                    ));
                } else {
                    log.push(format!(
                        "Successfully fetched unpaywall data doi {doi} - the resource is not open access"
                    ));
                    verdict = verdict.and(Verdict::Fail);
                }
            } else {
                let status = response
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string());
                let error = response.error.as_deref().unwrap_or("Unknown error");
                log.push(format!(
                    "Failed to fetch data with doi {doi} (status={status}): {error}"
                ));
                verdict = verdict.and(Verdict::Indeterminate);
            }
        }
        if datasets.is_empty() {
            log.push("No dataset declares an identifier".to_string());
            verdict = Verdict::Indeterminate;
        }

        input
            .evaluation(verdict)
            .with_log(log.join("\n"))
            .with_affected_elements(format!("datasets [{}]", datasets.join(", ")))
    }
}

fn dmp_id_valid(input: CheckInput<'_>) -> Evaluation {
    let finish = |verdict: Verdict, log: Vec<String>| {
        input
            .evaluation(verdict)
            .with_log(log.join("\n"))
            .with_affected_elements("dmp.dmp_id")
            .with_completion(100)
    };

    if input.document.object_at("dmp").is_none() {
        return finish(Verdict::Fail, vec!["dmp field is missing in maDMP.".to_string()]);
    }
    let Some(dmp_id) = input.document.object_at("dmp.dmp_id") else {
        return finish(
            Verdict::Fail,
            vec!["dmp_id field is missing in 'dmp'.".to_string()],
        );
    };

    let id_type = dmp_id.get("type").and_then(|v| v.as_str());
    let identifier = dmp_id.get("identifier").and_then(|v| v.as_str());
    let mut log = vec![format!(
        "dmp_id found: type={}, identifier={}",
        id_type.unwrap_or("null"),
        identifier.unwrap_or("null")
    )];

    match id_type {
        Some(t) if DMP_ID_TYPES.contains(&t) => {}
        Some(t) => {
            log.push(format!(
                "Invalid 'type' in dmp_id: '{t}'. Expected one of [{}].",
                DMP_ID_TYPES.join(", ")
            ));
            return finish(Verdict::Fail, log);
        }
        None => {
            log.push(format!(
                "Missing 'type' in dmp_id. Expected one of [{}].",
                DMP_ID_TYPES.join(", ")
            ));
            return finish(Verdict::Fail, log);
        }
    }

    if identifier.map_or(true, |s| s.trim().is_empty()) {
        log.push("identifier is missing or blank in dmp_id.".to_string());
        return finish(Verdict::Fail, log);
    }

    log.push("dmp_id is valid.".to_string());
    finish(Verdict::Pass, log)
}
