use std::collections::BTreeMap;
use std::sync::Arc;

use crate::model::job::Job;
use crate::vo::array_range::ArrayRange;

/// A parameterized family of jobs sharing a parent id, indexed by task id.
#[derive(Debug, Clone)]
pub struct ArrayJob {
    pub array_id: Arc<str>,
    pub range: ArrayRange,
    pub tasks: BTreeMap<u32, Job>,
    pub stdout_path_pattern: String,
    pub stderr_path_pattern: String,
}

impl ArrayJob {
    /// Substitutes `<array_id>` and `<task_id>` tokens in a path pattern.
    pub fn resolve_path(pattern: &str, array_id: &str, task_id: u32) -> String {
        pattern
            .replace("<array_id>", array_id)
            .replace("<task_id>", &task_id.to_string())
    }

    pub fn stdout_path(&self, task_id: u32) -> String {
        Self::resolve_path(&self.stdout_path_pattern, &self.array_id, task_id)
    }

    pub fn stderr_path(&self, task_id: u32) -> String {
        Self::resolve_path(&self.stderr_path_pattern, &self.array_id, task_id)
    }
}
