//! Resource kinds, their static schemas, and alias keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every resource kind the SDK knows how to manage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Organization,
    Workspace,
    Board,
    MenuPath,
    Report,
    DataSet,
    Data,
    Action,
    ActionTemplate,
    Role,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.schema().singular)
    }
}

impl ResourceKind {
    pub fn schema(&self) -> &'static ResourceSchema {
        schema(*self)
    }
}

/// Static description of a resource kind: endpoint naming, the parameter
/// fields that identify an instance to a human, and the child kinds it may
/// hold.
#[derive(Debug)]
pub struct ResourceSchema {
    pub kind: ResourceKind,
    pub singular: &'static str,
    /// Collection segment in API paths (`/api/{plural}`).
    pub plural: &'static str,
    /// Parameter fields forming the human-facing alias, in order. Empty for
    /// kinds addressable only by uuid.
    pub alias_fields: &'static [&'static str],
    pub children: &'static [ResourceKind],
}

static ORGANIZATION: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Organization,
    singular: "organization",
    plural: "organizations",
    alias_fields: &["name"],
    children: &[
        ResourceKind::Workspace,
        ResourceKind::Action,
        ResourceKind::ActionTemplate,
    ],
};

static WORKSPACE: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Workspace,
    singular: "workspace",
    plural: "workspaces",
    alias_fields: &["name"],
    children: &[ResourceKind::Board, ResourceKind::MenuPath, ResourceKind::Role],
};

static BOARD: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Board,
    singular: "board",
    plural: "boards",
    alias_fields: &["name"],
    children: &[ResourceKind::Role],
};

static MENU_PATH: ResourceSchema = ResourceSchema {
    kind: ResourceKind::MenuPath,
    singular: "menu-path",
    plural: "menu-paths",
    alias_fields: &["name"],
    children: &[ResourceKind::Report, ResourceKind::DataSet],
};

static REPORT: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Report,
    singular: "report",
    plural: "reports",
    alias_fields: &["name"],
    children: &[],
};

static DATA_SET: ResourceSchema = ResourceSchema {
    kind: ResourceKind::DataSet,
    singular: "data-set",
    plural: "data-sets",
    alias_fields: &["name"],
    children: &[ResourceKind::Data],
};

static DATA: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Data,
    singular: "data",
    plural: "data",
    alias_fields: &[],
    children: &[],
};

static ACTION: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Action,
    singular: "action",
    plural: "actions",
    alias_fields: &["name"],
    children: &[],
};

static ACTION_TEMPLATE: ResourceSchema = ResourceSchema {
    kind: ResourceKind::ActionTemplate,
    singular: "action-template",
    plural: "action-templates",
    alias_fields: &["name", "version"],
    children: &[],
};

static ROLE: ResourceSchema = ResourceSchema {
    kind: ResourceKind::Role,
    singular: "role",
    plural: "roles",
    alias_fields: &["name"],
    children: &[],
};

/// Look up the static schema for a kind.
pub fn schema(kind: ResourceKind) -> &'static ResourceSchema {
    match kind {
        ResourceKind::Organization => &ORGANIZATION,
        ResourceKind::Workspace => &WORKSPACE,
        ResourceKind::Board => &BOARD,
        ResourceKind::MenuPath => &MENU_PATH,
        ResourceKind::Report => &REPORT,
        ResourceKind::DataSet => &DATA_SET,
        ResourceKind::Data => &DATA,
        ResourceKind::Action => &ACTION,
        ResourceKind::ActionTemplate => &ACTION_TEMPLATE,
        ResourceKind::Role => &ROLE,
    }
}

/// Human-facing identity of a resource: ordered (field, value) components
/// drawn from the schema's alias fields.
///
/// A full alias carries every component and keys get-or-create flights; a
/// lookup alias may carry a prefix subset (for example an `ActionTemplate`
/// name without a version) and matches on the provided components only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Alias {
    components: Vec<(String, String)>,
}

impl Alias {
    pub fn new(components: Vec<(String, String)>) -> Self {
        Self { components }
    }

    /// Single-component alias over the conventional `name` field.
    pub fn name(value: impl Into<String>) -> Self {
        Self {
            components: vec![("name".to_string(), value.into())],
        }
    }

    /// Append a component.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.components.push((field.into(), value.into()));
        self
    }

    pub fn components(&self) -> &[(String, String)] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True when this alias provides every field the schema declares, in
    /// order. Required for get-or-create keying.
    pub fn is_complete_for(&self, schema: &ResourceSchema) -> bool {
        self.components.len() == schema.alias_fields.len()
            && self
                .components
                .iter()
                .zip(schema.alias_fields)
                .all(|((field, _), expected)| field == expected)
    }

    /// True when every component of this alias matches the given parameter
    /// map. Values are compared against the string form of the parameter.
    pub fn matches(&self, params: &Map<String, Value>) -> bool {
        self.components.iter().all(|(field, value)| {
            params
                .get(field)
                .map(|v| match v {
                    Value::String(s) => s == value,
                    other => other.to_string() == *value,
                })
                .unwrap_or(false)
        })
    }

    /// Extract the full alias of a resource from its parameter map, or `None`
    /// if any alias field is absent (or the kind has no alias at all).
    pub fn of(schema: &ResourceSchema, params: &Map<String, Value>) -> Option<Self> {
        if schema.alias_fields.is_empty() {
            return None;
        }
        let mut components = Vec::with_capacity(schema.alias_fields.len());
        for field in schema.alias_fields {
            let value = match params.get(*field)? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            components.push((field.to_string(), value));
        }
        Some(Self { components })
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, value) in &self.components {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{field}={value}")?;
            first = false;
        }
        Ok(())
    }
}
