use std::collections::HashMap;
use std::sync::Arc;

use super::{Tool, ToolMeta};

/// Name to tool lookup. Built once at startup, then only read.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Sorted tool names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Metadata for every tool, sorted by name so prompts are stable.
    pub fn catalog(&self) -> Vec<ToolMeta> {
        let mut catalog: Vec<ToolMeta> = self.tools.values().map(|t| t.metadata()).collect();
        catalog.sort_by(|a, b| a.name.cmp(&b.name));
        catalog
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}
