use std::collections::HashMap;
use std::sync::Arc;

use crate::tool::{Tool, ToolSchema};

/// Declares every tool the dispatcher can route to by name (spec §4.5).
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn schemas(&self) -> Vec<&ToolSchema> {
        let mut v: Vec<&ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        v.sort_by_key(|s| s.name);
        v
    }
}
