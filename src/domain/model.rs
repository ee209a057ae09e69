use chrono::{DateTime, Utc};
use std::hash::{Hash, Hasher};

/// Name of the permanent module that is always loaded.
pub const BASELINE_MODULE: &str = "main";

/// A page module known to the registry.
///
/// Identity is the module name: two values with the same name compare equal
/// and hash equally regardless of when they were created.
#[derive(Debug, Clone)]
pub struct RegisteredModule {
    name: String,
    created_at: DateTime<Utc>,
}

impl RegisteredModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_created_at(name, Utc::now())
    }

    pub fn with_created_at(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
        }
    }

    pub fn baseline() -> Self {
        Self::new(BASELINE_MODULE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_baseline(&self) -> bool {
        self.name == BASELINE_MODULE
    }

    /// Path the module's page is served under.
    pub fn route(&self) -> String {
        format!("/{}", self.name)
    }
}

impl PartialEq for RegisteredModule {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for RegisteredModule {}

impl Hash for RegisteredModule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Which origins may embed a page in an iframe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityPolicy {
    pub allowed_iframe_parents: Vec<String>,
}

impl SecurityPolicy {
    pub fn new(allowed_iframe_parents: Vec<String>) -> Self {
        Self {
            allowed_iframe_parents,
        }
    }

    /// `Content-Security-Policy` value restricting who may frame the page.
    pub fn frame_ancestors(&self) -> String {
        let mut directive = String::from("frame-ancestors 'self'");
        for parent in &self.allowed_iframe_parents {
            directive.push(' ');
            directive.push_str(parent);
        }
        directive
    }

    /// Source form accepted inside a `@page(...)` declaration.
    pub fn to_declaration(&self) -> String {
        let parents: Vec<String> = self
            .allowed_iframe_parents
            .iter()
            .map(|p| quote_literal(p))
            .collect();
        format!(
            "SecurityPolicy(allowed_iframe_parents=[{}])",
            parents.join(", ")
        )
    }
}

/// Quote a string the way the page source language reads it back.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading(String),
    Text(String),
    Divider,
}

/// A page registered by executing a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub path: String,
    pub title: Option<String>,
    pub policy: SecurityPolicy,
    /// Module whose execution registered this page.
    pub module: String,
    pub blocks: Vec<Block>,
}
