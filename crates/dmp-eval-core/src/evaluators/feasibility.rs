//! Feasibility checks. No rules are configured yet, so the single check
//! always reports that it could not decide.

use dmp_eval_state::{Evaluation, Verdict};

use crate::plugin::{CheckInput, FunctionTable, StaticPlugin};

pub const PLUGIN_ID: &str = "FeasibilityEvaluator";

pub fn plugin() -> StaticPlugin {
    StaticPlugin::new(
        PLUGIN_ID,
        "Evaluator to perform Feasibility tests",
        FunctionTable::new().with_fn("evaluateCoherentLicense", evaluate_coherent_license),
    )
}

fn evaluate_coherent_license(input: CheckInput<'_>) -> Evaluation {
    input
        .evaluation(Verdict::Indeterminate)
        .with_log("No feasibility rules are configured for license coherence.")
        .with_completion(0)
}
