use std::str::FromStr;

use crate::error::Error;
use crate::ids::{EndpointId, NodeId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ownership tag value for nodes managed through this surface. Any other
/// value marks the node as owned by a different subsystem, which makes it
/// read-only to create-child/rename/delete.
pub const KIND_LOCAL: i32 = 0;

/// A vertex in the service tree, addressed by id and by its materialized
/// dotted path.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    /// `None` for roots.
    pub parent_id: Option<NodeId>,
    /// Final path segment; charset-restricted, unique among siblings.
    pub name: String,
    /// `parent.path + "." + name`, or just `name` for roots. Globally unique.
    pub path: String,
    /// Leaf nodes may hold endpoint bindings and may not have children.
    pub leaf: bool,
    /// Ownership tag; see [`KIND_LOCAL`].
    pub kind: i32,
    /// Free-text annotation with no structural effect.
    pub note: String,
}

impl Node {
    /// Whether this node may be mutated through the tree-management surface.
    pub fn locally_managed(&self) -> bool {
        self.kind == KIND_LOCAL
    }
}

/// Caller-supplied fields for a new child node. The tree-management surface
/// always passes `kind = 0`; other subsystems grafting their own nodes into
/// the shared store pass their ownership tag.
#[derive(Clone, Debug)]
pub struct NodeSpec {
    pub name: String,
    pub leaf: bool,
    pub kind: i32,
    pub note: String,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, leaf: bool) -> Self {
        Self {
            name: name.into(),
            leaf,
            kind: KIND_LOCAL,
            note: String::new(),
        }
    }

    pub fn with_kind(mut self, kind: i32) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }
}

/// An externally-owned monitored entity bound to leaf nodes. This crate
/// stores and queries the binding relation; the fields themselves are
/// maintained by the endpoint owner.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Endpoint {
    pub id: EndpointId,
    pub ident: String,
    pub alias: String,
}

/// Which endpoint column a substring filter applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EndpointField {
    Ident,
    Alias,
}

impl FromStr for EndpointField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "ident" => Ok(EndpointField::Ident),
            "alias" => Ok(EndpointField::Alias),
            other => Err(Error::InvalidArgument(format!(
                "unsupported endpoint field: {other}"
            ))),
        }
    }
}

/// Filter for endpoint listings under a set of leaf nodes.
#[derive(Clone, Debug)]
pub struct EndpointFilter {
    /// Case-sensitive substring matched against `field`. Empty matches all.
    pub query: String,
    /// Optional restriction to a caller-supplied batch of idents.
    pub batch: Vec<String>,
    pub field: EndpointField,
}

impl EndpointFilter {
    pub fn new(field: EndpointField) -> Self {
        Self {
            query: String::new(),
            batch: Vec::new(),
            field,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_batch(mut self, batch: Vec<String>) -> Self {
        self.batch = batch;
        self
    }

    /// Whether an endpoint passes this filter.
    pub fn matches(&self, endpoint: &Endpoint) -> bool {
        let field = match self.field {
            EndpointField::Ident => endpoint.ident.as_str(),
            EndpointField::Alias => endpoint.alias.as_str(),
        };
        if !self.query.is_empty() && !field.contains(self.query.as_str()) {
            return false;
        }
        if !self.batch.is_empty() && !self.batch.iter().any(|b| b == &endpoint.ident) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_field_parses_known_values() {
        assert_eq!("ident".parse::<EndpointField>().unwrap(), EndpointField::Ident);
        assert_eq!("alias".parse::<EndpointField>().unwrap(), EndpointField::Alias);
        assert!(matches!(
            "hostname".parse::<EndpointField>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn filter_applies_query_and_batch() {
        let ep = Endpoint {
            id: EndpointId(1),
            ident: "db-01.bj".into(),
            alias: "primary".into(),
        };

        let f = EndpointFilter::new(EndpointField::Ident).with_query("db-01");
        assert!(f.matches(&ep));

        let f = EndpointFilter::new(EndpointField::Alias).with_query("secondary");
        assert!(!f.matches(&ep));

        let f = EndpointFilter::new(EndpointField::Ident)
            .with_batch(vec!["db-01.bj".into(), "db-02.bj".into()]);
        assert!(f.matches(&ep));

        let f = EndpointFilter::new(EndpointField::Ident).with_batch(vec!["db-02.bj".into()]);
        assert!(!f.matches(&ep));
    }
}
