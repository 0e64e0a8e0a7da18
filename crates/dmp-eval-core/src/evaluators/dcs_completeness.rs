//! Completeness checks against the maDMP DCS (application profile).

use dmp_eval_state::{Evaluation, Verdict};
use serde_json::{Map, Value};

use crate::document::is_present;
use crate::evaluators::madmp_schema::{self, Violation, ViolationKind};
use crate::plugin::{CheckInput, EvaluatorPlugin, FunctionTable};

pub const PLUGIN_ID: &str = "DCSCompletenessEvaluator";

pub struct DcsCompletenessEvaluator {
    functions: FunctionTable,
}

impl DcsCompletenessEvaluator {
    pub fn new() -> Self {
        Self {
            functions: FunctionTable::new()
                .with_fn("evaluateStructure", evaluate_structure)
                .with_fn("evaluateFormats", evaluate_formats)
                .with_fn("costEntityPresent", cost_entity_present)
                .with_fn("costEntityValuesPresent", cost_entity_values_present)
                .with_fn("contributorValuesPresent", contributor_values_present)
                .with_fn("datasetEntityValuesPresent", dataset_entity_values_present),
        }
    }
}

impl Default for DcsCompletenessEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluatorPlugin for DcsCompletenessEvaluator {
    fn identifier(&self) -> &str {
        PLUGIN_ID
    }

    fn description(&self) -> &str {
        "Completeness of a maDMP against the DCS application profile"
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}

/// Run the schema and keep the violations `keep` selects.
///
/// A schema that cannot be loaded makes the check INDETERMINATE.
fn schema_check(
    input: CheckInput<'_>,
    keep: fn(&Violation) -> bool,
    ok_log: &str,
    failed_header: &str,
) -> Evaluation {
    let violations = match madmp_schema::validate(input.document.root()) {
        Ok(violations) => violations,
        Err(e) => {
            return input
                .evaluation(Verdict::Indeterminate)
                .with_log(format!("maDMP schema unavailable: {e}"))
        }
    };
    let kept: Vec<&Violation> = violations.iter().filter(|v| keep(v)).collect();

    let (verdict, log) = if kept.is_empty() {
        (Verdict::Pass, ok_log.to_string())
    } else {
        let list: Vec<String> = kept
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}. {}", i + 1, v.message))
            .collect();
        (Verdict::Fail, format!("{failed_header}\n{}", list.join("\n")))
    };
    input
        .evaluation(verdict)
        .with_log(log)
        .with_affected_elements("dmp")
        .with_completion(100)
}

fn evaluate_structure(input: CheckInput<'_>) -> Evaluation {
    schema_check(
        input,
        |v| v.kind == ViolationKind::Required,
        "All required fields are present.",
        "Missing required fields detected:",
    )
}

fn evaluate_formats(input: CheckInput<'_>) -> Evaluation {
    schema_check(
        input,
        |v| v.kind != ViolationKind::Required,
        "All fields have valid formats.",
        "Invalid formats detected:",
    )
}

fn cost_entity_present(input: CheckInput<'_>) -> Evaluation {
    let present = !input.document.values_at("dmp.cost[*]").is_empty();
    let (verdict, log) = if present {
        (Verdict::Pass, "Cost fields are present in the maDMP")
    } else {
        (Verdict::Fail, "Cost field are not present in the maDMP")
    };
    input
        .evaluation(verdict)
        .with_log(log)
        .with_affected_elements("dmp.cost")
        .with_completion(100)
}

fn cost_entity_values_present(input: CheckInput<'_>) -> Evaluation {
    let costs = input.document.values_at("dmp.cost[*]");
    if costs.is_empty() {
        return input
            .evaluation(Verdict::Fail)
            .with_log("Cost field are not present in the maDMP")
            .with_affected_elements("dmp.cost")
            .with_completion(100);
    }

    let mut verdict = Verdict::Pass;
    let mut log = Vec::new();
    for cost in costs {
        let Some(entry) = cost.as_object() else {
            log.push("Invalid cost entry: not a JSON object.".to_string());
            verdict = Verdict::Fail;
            continue;
        };
        log.push(format!(
            "Cost entry - title: {}, description: {}, value: {}, currency: {}",
            field_text(entry, "title"),
            field_text(entry, "description"),
            field_text(entry, "value"),
            field_text(entry, "currency_code"),
        ));
        let complete = ["title", "description", "value", "currency_code"]
            .iter()
            .all(|k| is_present(entry.get(*k)));
        if !complete {
            log.push("The full data for the cost is required".to_string());
            verdict = Verdict::Fail;
        }
    }

    input
        .evaluation(verdict)
        .with_log(log.join("\n"))
        .with_affected_elements("dmp.cost")
        .with_completion(100)
}

fn contributor_values_present(input: CheckInput<'_>) -> Evaluation {
    let present = !input.document.values_at("dmp.contributor[*]").is_empty();
    let (verdict, log) = if present {
        (Verdict::Pass, "Contributor fields are present in the maDMP")
    } else {
        (Verdict::Fail, "Contributor field are not present in the maDMP")
    };
    input
        .evaluation(verdict)
        .with_log(log)
        .with_affected_elements("dmp.contributor")
        .with_completion(100)
}

const DATASET_REQUIRED: [&str; 6] = [
    "dataset_id.identifier",
    "dataset_id.type",
    "personal_data",
    "sensitive_data",
    "title",
    "type",
];

fn dataset_entity_values_present(input: CheckInput<'_>) -> Evaluation {
    let datasets = input.document.values_at("dmp.dataset[*]");
    if datasets.is_empty() {
        return input
            .evaluation(Verdict::Fail)
            .with_log("There is no dataset in the DMP")
            .with_affected_elements("dmp.dataset")
            .with_completion(100);
    }

    let mut verdict = Verdict::Pass;
    let mut log = Vec::new();
    for (i, dataset) in datasets.into_iter().enumerate() {
        let Some(entry) = dataset.as_object() else {
            log.push(format!("Invalid dataset entry at index {i}: not a JSON object."));
            verdict = Verdict::Fail;
            continue;
        };

        let missing: Vec<&str> = DATASET_REQUIRED
            .iter()
            .copied()
            .filter(|path| !is_present(lookup(entry, path)))
            .collect();
        if !missing.is_empty() {
            log.push(format!(
                "Dataset[{i}] is missing one or more required fields: {}.",
                missing.join(", ")
            ));
            verdict = Verdict::Fail;
        }

        match entry.get("distribution").and_then(Value::as_array) {
            None => {
                log.push(format!("Dataset[{i}] is missing distribution array."));
                verdict = Verdict::Fail;
            }
            Some(distributions) => {
                let valid = distributions.iter().find(|d| {
                    is_present(d.get("title")) && d.get("license").is_some_and(Value::is_array)
                });
                match valid {
                    Some(d) => log.push(format!(
                        "Dataset[{i}] distribution title: {}",
                        d.get("title").map(scalar_text).unwrap_or_default()
                    )),
                    None => {
                        log.push(format!(
                            "Dataset[{i}] has an invalid distribution: missing title or license."
                        ));
                        verdict = Verdict::Fail;
                    }
                }
            }
        }
    }

    input
        .evaluation(verdict)
        .with_log(log.join("\n"))
        .with_affected_elements("dmp.dataset")
        .with_completion(100)
}

/// Dotted lookup inside one object.
fn lookup<'a>(entry: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = entry.get(parts.next()?)?;
    parts.try_fold(first, |value, key| value.get(key))
}

fn field_text(entry: &Map<String, Value>, key: &str) -> String {
    entry.get(key).map(scalar_text).unwrap_or_else(|| "null".to_string())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
