//! Evaluator plugin capability.
//!
//! A plugin is a named table of checks. Every check has the same contract:
//! given a document, the owning report and the test record, produce one
//! [`Evaluation`]. Checks never fail: malformed input is reported as FAIL or
//! INDETERMINATE inside the evaluation itself.
//!
//! ```ignore
//! let table = FunctionTable::new()
//!     .with_fn("dmpIdValid", dmp_id_valid)
//!     .with("evaluateOpenAccess", OpenAccessCheck::new(lookup));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dmp_eval_state::{Evaluation, EvaluationReport, ReportId, TestId, TestRecord, Verdict};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{EvalError, Result};

/// Everything a check sees for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct CheckInput<'a> {
    pub document: &'a Document,
    pub report_id: &'a ReportId,
    pub test: &'a TestRecord,
    /// `<pluginId>::<functionName>`, stamped on every evaluation.
    pub provenance: &'a str,
}

impl<'a> CheckInput<'a> {
    /// An evaluation for this invocation with title/details from the test.
    pub fn evaluation(&self, verdict: Verdict) -> Evaluation {
        Evaluation::new(verdict, self.test, self.report_id, self.provenance)
    }
}

/// One executable check.
#[async_trait]
pub trait Check: Send + Sync {
    async fn run(&self, input: CheckInput<'_>) -> Evaluation;
}

/// Adapter for checks that need no I/O.
pub struct SyncCheck<F>(F);

impl<F> SyncCheck<F>
where
    F: Fn(CheckInput<'_>) -> Evaluation + Send + Sync,
{
    pub fn new(f: F) -> Self {
        SyncCheck(f)
    }
}

#[async_trait]
impl<F> Check for SyncCheck<F>
where
    F: Fn(CheckInput<'_>) -> Evaluation + Send + Sync,
{
    async fn run(&self, input: CheckInput<'_>) -> Evaluation {
        (self.0)(input)
    }
}

/// Function name to check, unique within one plugin.
#[derive(Clone, Default)]
pub struct FunctionTable {
    entries: BTreeMap<&'static str, Arc<dyn Check>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `check` under `name`, replacing any previous entry.
    pub fn with(mut self, name: &'static str, check: impl Check + 'static) -> Self {
        self.entries.insert(name, Arc::new(check));
        self
    }

    /// Register a synchronous check function.
    pub fn with_fn(self, name: &'static str, f: fn(CheckInput<'_>) -> Evaluation) -> Self {
        self.with(name, SyncCheck::new(f))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Function names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}

/// Summary of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub plugin_id: String,
    pub description: String,
    pub functions: Vec<String>,
}

/// A named unit of executable checks.
#[async_trait]
pub trait EvaluatorPlugin: Send + Sync {
    /// Globally unique, stable identifier.
    fn identifier(&self) -> &str;

    fn description(&self) -> &str;

    fn functions(&self) -> &FunctionTable;

    fn describe(&self) -> PluginInfo {
        PluginInfo {
            plugin_id: self.identifier().to_string(),
            description: self.description().to_string(),
            functions: self
                .functions()
                .names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    fn function(&self, name: &str) -> Option<Arc<dyn Check>> {
        self.functions().get(name)
    }

    /// Bulk evaluation of several tests in one call.
    ///
    /// Optional. The default reports [`EvalError::Unsupported`] so callers can
    /// tell "not implemented" apart from "evaluated and passed".
    async fn batch_evaluate(
        &self,
        _document: &Document,
        _config: &Value,
        _test_ids: &[TestId],
        _report: &EvaluationReport,
    ) -> Result<Vec<Evaluation>> {
        Err(EvalError::Unsupported {
            plugin: self.identifier().to_string(),
            operation: "batch_evaluate",
        })
    }
}

/// A plugin assembled from parts, for plugins with no state of their own.
pub struct StaticPlugin {
    id: String,
    description: String,
    functions: FunctionTable,
}

impl StaticPlugin {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        functions: FunctionTable,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            functions,
        }
    }
}

impl EvaluatorPlugin for StaticPlugin {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn functions(&self) -> &FunctionTable {
        &self.functions
    }
}
