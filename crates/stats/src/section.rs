//! Snapshot sections

/// One component's snapshot: ordered `key=value` entries plus nested
/// children (a failover chain renders as `failover.`-prefixed keys)
#[derive(Debug, Clone, Default)]
pub struct StatsSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
    pub children: Vec<StatsSection>,
}

impl StatsSection {
    /// Create an empty section
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append one entry
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.entries.push((key.into(), value.to_string()));
    }

    /// Append a nested child section
    pub fn push_child(&mut self, child: StatsSection) {
        self.children.push(child);
    }

    /// Render as text: `name` header, `key=value` lines, children with
    /// their name as key prefix
    pub fn render(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push('\n');
        self.render_entries(out, "");
    }

    fn render_entries(&self, out: &mut String, prefix: &str) {
        for (key, value) in &self.entries {
            out.push_str(prefix);
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        for child in &self.children {
            let child_prefix = format!("{prefix}{}.", child.name);
            child.render_entries(out, &child_prefix);
        }
    }
}
