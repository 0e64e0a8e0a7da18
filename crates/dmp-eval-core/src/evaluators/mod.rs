//! Built-in evaluator plugins.
//!
//! Plugins are registered explicitly through [`builtin_registry`]; nothing is
//! discovered at runtime. Plugins that reach out to remote services receive
//! their lookups as trait objects so tests can substitute fakes.

use std::sync::Arc;

use dmp_eval_lookup::{FairAssessmentLookup, OpenAccessLookup};

use crate::document::Document;
use crate::error::Result;
use crate::registry::PluginRegistry;

pub mod compliance;
pub mod dcs_completeness;
pub mod fair_champion;
pub mod feasibility;
pub mod madmp_schema;
pub mod quality_of_actions;

pub use compliance::ComplianceEvaluator;
pub use dcs_completeness::DcsCompletenessEvaluator;
pub use fair_champion::FairChampionEvaluator;
pub use quality_of_actions::QualityOfActionsEvaluator;

/// Registry holding every built-in plugin, in a fixed order.
pub fn builtin_registry(
    open_access: Arc<dyn OpenAccessLookup>,
    fair: Arc<dyn FairAssessmentLookup>,
) -> Result<PluginRegistry> {
    Ok(PluginRegistry::builder()
        .register(Arc::new(DcsCompletenessEvaluator::new()))?
        .register(Arc::new(QualityOfActionsEvaluator::new(open_access)))?
        .register(Arc::new(ComplianceEvaluator::new()))?
        .register(Arc::new(feasibility::plugin()))?
        .register(Arc::new(FairChampionEvaluator::new(fair)))?
        .build())
}

/// `dmp.dataset[*].dataset_id.identifier` values, in dataset order.
///
/// `None` when the plan has no `dataset` array at all. Datasets without a
/// usable identifier are skipped.
pub(crate) fn dataset_identifiers(document: &Document) -> Option<Vec<String>> {
    let datasets = document.array_at("dmp.dataset")?;
    Some(
        datasets
            .iter()
            .filter_map(|d| d.get("dataset_id")?.get("identifier")?.as_str())
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmp_eval_lookup::fakes::StaticLookup;
    use serde_json::json;

    #[test]
    fn builtin_plugins_are_registered_in_order() {
        let lookup = Arc::new(StaticLookup::new());
        let registry = builtin_registry(lookup.clone(), lookup).unwrap();
        let ids: Vec<String> = registry.list_all().into_iter().map(|p| p.plugin_id).collect();
        assert_eq!(
            ids,
            vec![
                "DCSCompletenessEvaluator",
                "QualityOfActionsEvaluator",
                "ComplianceEvaluator",
                "FeasibilityEvaluator",
                "FAIR_Champion",
            ]
        );
        assert!(registry
            .resolve_function("QualityOfActionsEvaluator", "dmpIdValid")
            .is_ok());
        assert!(registry
            .resolve_function("FeasibilityEvaluator", "evaluateCoherentLicense")
            .is_ok());
    }

    #[test]
    fn dataset_identifiers_skip_blank_ids() {
        let doc = Document::new(json!({"dmp": {"dataset": [
            {"dataset_id": {"identifier": "10.1/a"}},
            {"dataset_id": {"identifier": " "}},
            {"title": "no id"},
            {"dataset_id": {"identifier": "10.1/b"}}
        ]}}));
        assert_eq!(
            dataset_identifiers(&doc),
            Some(vec!["10.1/a".to_string(), "10.1/b".to_string()])
        );
        assert_eq!(dataset_identifiers(&Document::new(json!({"dmp": {}}))), None);
    }
}
