use serde::{Deserialize, Serialize};

/// Kind of editable metadata surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Table or entity description
    Entity,
    /// Column description
    Column,
    /// Derived view (metric view) definition
    View,
    /// Parameterized query (table-valued function) definition
    Function,
    /// Free-text routing instructions
    Instructions,
}

impl ObjectKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Column => "column",
            Self::View => "view",
            Self::Function => "function",
            Self::Instructions => "instructions",
        }
    }
}

/// A metadata object as held by the live store and mirrored to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataObject {
    pub id: String,
    pub kind: ObjectKind,
    /// Description, definition or instruction text
    pub value: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MetadataObject {
    pub fn new(id: impl Into<String>, kind: ObjectKind, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            value: value.into(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Compliance-tagged objects are never removed automatically.
    pub fn is_compliance_tagged(&self) -> bool {
        self.tags
            .iter()
            .any(|t| t == "compliance" || t.starts_with("compliance:"))
    }

    /// Copy of this object carrying a different value.
    #[must_use]
    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..self.clone()
        }
    }
}
