//! Compliance checks: upload format and license coherence.

use dmp_eval_state::{Evaluation, Verdict};
use serde_json::Value;

use crate::document::is_present;
use crate::plugin::{CheckInput, EvaluatorPlugin, FunctionTable};

pub const PLUGIN_ID: &str = "ComplianceEvaluator";

pub struct ComplianceEvaluator {
    functions: FunctionTable,
}

impl ComplianceEvaluator {
    pub fn new() -> Self {
        Self {
            functions: FunctionTable::new()
                .with_fn("evaluateCoherentLicense", evaluate_coherent_license)
                .with_fn("checkFormatFile", check_format_file),
        }
    }
}

impl Default for ComplianceEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorPlugin for ComplianceEvaluator {
    fn identifier(&self) -> &str {
        PLUGIN_ID
    }

    fn description(&self) -> &str {
        "Evaluator to perform compliance tests"
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

/// Openly accessible distributions must declare a license.
fn evaluate_coherent_license(input: CheckInput<'_>) -> Evaluation {
    let datasets = input.document.values_at("dmp.dataset[*]");
    if datasets.is_empty() {
        return input
            .evaluation(Verdict::Indeterminate)
            .with_log("There is no dataset in the DMP")
            .with_affected_elements("dmp.dataset");
    }

    let mut verdict = Verdict::Pass;
    let mut log = Vec::new();
    let mut open = 0;
    for (i, dataset) in datasets.into_iter().enumerate() {
        let distributions = dataset
            .get("distribution")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for (j, distribution) in distributions.iter().enumerate() {
            if distribution.get("data_access").and_then(Value::as_str) != Some("open") {
                continue;
            }
            open += 1;
            let licensed = distribution
                .get("license")
                .and_then(Value::as_array)
                .is_some_and(|licenses| licenses.iter().any(|l| is_present(l.get("license_ref"))));
            if licensed {
                log.push(format!("Dataset[{i}] distribution[{j}] is open and licensed."));
            } else {
                log.push(format!(
                    "Dataset[{i}] distribution[{j}] is open but declares no license_ref."
                ));
                verdict = Verdict::Fail;
            }
        }
    }
    if open == 0 {
        log.push("No open distribution found; nothing to check.".to_string());
    }

    input
        .evaluation(verdict)
        .with_log(log.join("\n"))
        .with_affected_elements("dmp.dataset[*].distribution")
        .with_completion(100)
}

/// The uploaded file must be a `.json` file.
fn check_format_file(input: CheckInput<'_>) -> Evaluation {
    let Some(source) = input.document.source() else {
        return input
            .evaluation(Verdict::Indeterminate)
            .with_log("The upload carries no file name; the format cannot be checked.");
    };

    if source.extension == "json" {
        input
            .evaluation(Verdict::Pass)
            .with_log("File extension is a valid json.")
    } else {
        input.evaluation(Verdict::Fail).with_log(format!(
            "File extension is '{}'. Expected: 'json'.",
            source.extension
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, SourceMeta};
    use crate::plugin::Check;
    use dmp_eval_state::{ReportId, TestRecord};
    use serde_json::json;

    fn run(function: &str, doc: Document) -> Evaluation {
        let plugin = ComplianceEvaluator::new();
        let check = plugin.function(function).unwrap();
        let test = TestRecord::new("t", PLUGIN_ID, function);
        let report = ReportId::from("r");
        let provenance = format!("{PLUGIN_ID}::{function}");
        futures::executor::block_on(check.run(CheckInput {
            document: &doc,
            report_id: &report,
            test: &test,
            provenance: &provenance,
        }))
    }

    #[test]
    fn format_file_uses_source_extension() {
        let doc = |name: &str| Document::new(json!({})).with_source(SourceMeta::from_file_name(name));

        assert_eq!(run("checkFormatFile", doc("plan.JSON")).result, Verdict::Pass);

        let eval = run("checkFormatFile", doc("plan.xml"));
        assert_eq!(eval.result, Verdict::Fail);
        assert_eq!(eval.log, "File extension is 'xml'. Expected: 'json'.");

        let eval = run("checkFormatFile", Document::new(json!({})));
        assert_eq!(eval.result, Verdict::Indeterminate);
    }

    #[test]
    fn open_distributions_need_a_license() {
        let plan = |license: Value| {
            Document::new(json!({"dmp": {"dataset": [{
                "distribution": [
                    {"title": "closed", "data_access": "closed"},
                    {"title": "open", "data_access": "open", "license": license}
                ]
            }]}}))
        };

        let eval = run(
            "evaluateCoherentLicense",
            plan(json!([{"license_ref": "https://creativecommons.org/licenses/by/4.0/"}])),
        );
        assert_eq!(eval.result, Verdict::Pass);

        let eval = run("evaluateCoherentLicense", plan(json!([])));
        assert_eq!(eval.result, Verdict::Fail);
        assert!(eval.log.contains("Dataset[0] distribution[1] is open but declares no license_ref."));
    }

    #[test]
    fn no_datasets_is_indeterminate() {
        let eval = run("evaluateCoherentLicense", Document::new(json!({"dmp": {}})));
        assert_eq!(eval.result, Verdict::Indeterminate);
    }
}
