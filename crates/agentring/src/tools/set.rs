use std::collections::HashSet;

use super::descriptor::ToolDescriptor;
use super::factory::McpTool;

/// Anything identified by a tool name.
pub trait NamedTool {
    fn tool_name(&self) -> &str;
}

impl NamedTool for McpTool {
    fn tool_name(&self) -> &str {
        self.name()
    }
}

impl NamedTool for ToolDescriptor {
    fn tool_name(&self) -> &str {
        &self.name
    }
}

impl<T: NamedTool + ?Sized> NamedTool for &T {
    fn tool_name(&self) -> &str {
        (**self).tool_name()
    }
}

/// Ordered collection of synthesized tools with lookup by name.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: Vec<McpTool>,
}

impl ToolSet {
    pub fn new(tools: Vec<McpTool>) -> Self {
        Self { tools }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&McpTool> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(McpTool::name).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, McpTool> {
        self.tools.iter()
    }

    /// Remove and return the first tool called `name`.
    pub fn take(&mut self, name: &str) -> Option<McpTool> {
        let index = self.tools.iter().position(|tool| tool.name() == name)?;
        Some(self.tools.remove(index))
    }

    pub fn into_vec(self) -> Vec<McpTool> {
        self.tools
    }

    pub fn filter(&self, filter: &ToolFilter) -> ToolSet {
        filter_tools(self.tools.iter().cloned(), filter).into_iter().collect()
    }
}

impl FromIterator<McpTool> for ToolSet {
    fn from_iter<I: IntoIterator<Item = McpTool>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ToolSet {
    type Item = McpTool;
    type IntoIter = std::vec::IntoIter<McpTool>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.into_iter()
    }
}

impl<'a> IntoIterator for &'a ToolSet {
    type Item = &'a McpTool;
    type IntoIter = std::slice::Iter<'a, McpTool>;

    fn into_iter(self) -> Self::IntoIter {
        self.tools.iter()
    }
}

/// Concatenate tool lists, keeping only the first tool of each name.
pub fn compose_tools<T, L>(lists: impl IntoIterator<Item = L>) -> Vec<T>
where
    T: NamedTool,
    L: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    let mut composed = Vec::new();
    for tool in lists.into_iter().flatten() {
        if seen.insert(tool.tool_name().to_string()) {
            composed.push(tool);
        }
    }
    composed
}

/// Selection criteria for [`filter_tools`].
///
/// When `names` is set only exact matches are kept and the substring
/// patterns are ignored. Otherwise a tool must contain at least one `include`
/// pattern (if any are given) and none of the `exclude` patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolFilter {
    pub names: Option<Vec<String>>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ToolFilter {
    pub fn names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn matches(&self, name: &str) -> bool {
        if let Some(names) = &self.names
            && !names.is_empty()
        {
            return names.iter().any(|n| n == name);
        }
        let included =
            self.include.is_empty() || self.include.iter().any(|p| name.contains(p.as_str()));
        included && !self.exclude.iter().any(|p| name.contains(p.as_str()))
    }
}

pub fn filter_tools<T: NamedTool>(tools: impl IntoIterator<Item = T>, filter: &ToolFilter) -> Vec<T> {
    tools
        .into_iter()
        .filter(|tool| filter.matches(tool.tool_name()))
        .collect()
}
