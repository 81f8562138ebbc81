//! Resource descriptors
//!
//! Static, per-resource declarations. Each descriptor can be built in code
//! through the builder methods or deserialized from a graph file.

use super::inflect::pluralize;
use crate::query::{Op, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Every operation a resource may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Index,
    Show,
    Create,
    Update,
    Destroy,
    /// Nested association routes
    Associated,
    /// Remote (computed) endpoints
    Remoted,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::Index,
        Action::Show,
        Action::Create,
        Action::Update,
        Action::Destroy,
        Action::Associated,
        Action::Remoted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Show => "show",
            Self::Create => "create",
            Self::Update => "update",
            Self::Destroy => "destroy",
            Self::Associated => "associated",
            Self::Remoted => "remoted",
        }
    }

    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Destroy)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finite set of permitted actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    pub fn all() -> Self {
        Self(Action::ALL.into_iter().collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn of(actions: &[Action]) -> Self {
        Self(actions.iter().copied().collect())
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }
}

impl Default for ActionSet {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
    HasOne,
    HasManyThrough,
    HasOneThrough,
}

impl AssociationKind {
    /// Resolves to at most one record
    pub fn is_singular(&self) -> bool {
        matches!(self, Self::BelongsTo | Self::HasOne | Self::HasOneThrough)
    }

    pub fn is_through(&self) -> bool {
        matches!(self, Self::HasManyThrough | Self::HasOneThrough)
    }
}

/// Join hop for through associations: `through` names an association on the
/// owner, `source` an association on the intermediate resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Through {
    pub through: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    pub name: String,
    pub kind: AssociationKind,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    #[serde(default, flatten, skip_serializing_if = "Option::is_none")]
    pub through: Option<Through>,
    /// Independently addressable through a nested route
    #[serde(default)]
    pub associated: bool,
    /// Nested route also accepts creates (direct has_many only)
    #[serde(default)]
    pub creatable: bool,
}

impl AssociationDescriptor {
    fn new(name: &str, kind: AssociationKind, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            foreign_key: None,
            through: None,
            associated: false,
            creatable: false,
        }
    }

    pub fn belongs_to(name: &str, target: &str) -> Self {
        Self::new(name, AssociationKind::BelongsTo, target)
    }

    pub fn has_many(name: &str, target: &str) -> Self {
        Self::new(name, AssociationKind::HasMany, target)
    }

    pub fn has_one(name: &str, target: &str) -> Self {
        Self::new(name, AssociationKind::HasOne, target)
    }

    pub fn has_many_through(name: &str, target: &str, through: &str) -> Self {
        let mut assoc = Self::new(name, AssociationKind::HasManyThrough, target);
        assoc.through = Some(Through {
            through: through.to_string(),
            source: None,
        });
        assoc
    }

    pub fn has_one_through(name: &str, target: &str, through: &str) -> Self {
        let mut assoc = Self::new(name, AssociationKind::HasOneThrough, target);
        assoc.through = Some(Through {
            through: through.to_string(),
            source: None,
        });
        assoc
    }

    pub fn foreign_key(mut self, key: &str) -> Self {
        self.foreign_key = Some(key.to_string());
        self
    }

    /// Name of the association on the intermediate resource
    pub fn source(mut self, source: &str) -> Self {
        if let Some(through) = self.through.as_mut() {
            through.source = Some(source.to_string());
        }
        self
    }

    pub fn associated(mut self) -> Self {
        self.associated = true;
        self
    }

    pub fn creatable(mut self) -> Self {
        self.creatable = true;
        self
    }

    /// Foreign key column, explicit or by convention: `belongs_to author`
    /// reads `author_id` on the owner, `has_many` on `post` reads `post_id`
    /// on the target.
    pub fn foreign_key_for(&self, owner: &ResourceDescriptor) -> String {
        if let Some(key) = &self.foreign_key {
            return key.clone();
        }
        match self.kind {
            AssociationKind::BelongsTo => format!("{}_id", self.name),
            _ => format!("{}_id", owner.name),
        }
    }

    /// Association name on the intermediate resource for through kinds
    pub fn source_name(&self) -> Option<&str> {
        self.through
            .as_ref()
            .map(|t| t.source.as_deref().unwrap_or(&self.name))
    }
}

/// How a scope narrows a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ScopeRule {
    /// Parameterless: always adds the same predicates
    Fixed {
        #[serde(default)]
        predicates: Vec<Predicate>,
    },
    /// Binds the caller's value into `field op value`
    Param {
        field: String,
        #[serde(default)]
        op: Op,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDescriptor {
    pub name: String,
    #[serde(flatten)]
    pub rule: ScopeRule,
}

impl ScopeDescriptor {
    pub fn fixed(name: &str, predicates: Vec<Predicate>) -> Self {
        Self {
            name: name.to_string(),
            rule: ScopeRule::Fixed { predicates },
        }
    }

    /// Parameterless scope `field == value`
    pub fn flag(name: &str, field: &str, value: impl Into<serde_json::Value>) -> Self {
        Self::fixed(name, vec![Predicate::eq(field, value)])
    }

    pub fn param(name: &str, field: &str, op: Op) -> Self {
        Self {
            name: name.to_string(),
            rule: ScopeRule::Param {
                field: field.to_string(),
                op,
            },
        }
    }

    /// Parameterized equality on a field of the same name
    pub fn attribute(field: &str) -> Self {
        Self::param(field, field, Op::Eq)
    }

    pub fn is_parameterized(&self) -> bool {
        matches!(self.rule, ScopeRule::Param { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteOn {
    #[default]
    Member,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    #[default]
    Many,
    One,
}

/// Computed, read-only endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDescriptor {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub on: RemoteOn,
    #[serde(default)]
    pub returns: Cardinality,
}

impl RemoteDescriptor {
    pub fn member(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            on: RemoteOn::Member,
            returns: Cardinality::Many,
        }
    }

    pub fn collection(name: &str, target: &str) -> Self {
        Self {
            on: RemoteOn::Collection,
            ..Self::member(name, target)
        }
    }

    pub fn single(mut self) -> Self {
        self.returns = Cardinality::One;
        self
    }
}

fn default_primary_key() -> String {
    "id".to_string()
}

/// Declaration of one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// Model binding override (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Envelope/collection key override (defaults to the plural of `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    /// Writable fields
    #[serde(default)]
    pub permitted: Vec<String>,
    #[serde(default)]
    pub read_only: Vec<String>,
    /// Fields that must be present and non-blank
    #[serde(default)]
    pub required: Vec<String>,
    /// Server assigns `created_at`/`updated_at`
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub handles: ActionSet,
    #[serde(default)]
    pub scopes: Vec<ScopeDescriptor>,
    #[serde(default)]
    pub associations: Vec<AssociationDescriptor>,
    #[serde(default)]
    pub remotes: Vec<RemoteDescriptor>,
    #[serde(default)]
    pub default_includes: Vec<String>,
}

impl ResourceDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            primary_key: default_primary_key(),
            model: None,
            record_name: None,
            permitted: Vec::new(),
            read_only: Vec::new(),
            required: Vec::new(),
            timestamps: false,
            handles: ActionSet::all(),
            scopes: Vec::new(),
            associations: Vec::new(),
            remotes: Vec::new(),
            default_includes: Vec::new(),
        }
    }

    // =========================================================================
    // Builder
    // =========================================================================

    pub fn primary_key(mut self, key: &str) -> Self {
        self.primary_key = key.to_string();
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn record_name(mut self, name: &str) -> Self {
        self.record_name = Some(name.to_string());
        self
    }

    pub fn permit(mut self, fields: &[&str]) -> Self {
        self.permitted.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn read_only(mut self, fields: &[&str]) -> Self {
        self.read_only.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn require(mut self, fields: &[&str]) -> Self {
        self.required.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    pub fn timestamps(mut self) -> Self {
        self.timestamps = true;
        self
    }

    pub fn handles(mut self, actions: ActionSet) -> Self {
        self.handles = actions;
        self
    }

    pub fn scope(mut self, scope: ScopeDescriptor) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    pub fn belongs_to(self, name: &str, target: &str) -> Self {
        self.association(AssociationDescriptor::belongs_to(name, target))
    }

    pub fn has_many(self, name: &str, target: &str) -> Self {
        self.association(AssociationDescriptor::has_many(name, target))
    }

    pub fn has_one(self, name: &str, target: &str) -> Self {
        self.association(AssociationDescriptor::has_one(name, target))
    }

    pub fn remote(mut self, remote: RemoteDescriptor) -> Self {
        self.remotes.push(remote);
        self
    }

    pub fn default_include(mut self, association: &str) -> Self {
        self.default_includes.push(association.to_string());
        self
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Name of the bound model
    pub fn model_name(&self) -> &str {
        self.model.as_deref().unwrap_or(&self.name)
    }

    /// Envelope key for collections; also the route segment
    pub fn collection_key(&self) -> String {
        self.record_name
            .clone()
            .unwrap_or_else(|| pluralize(&self.name))
    }

    /// First path segment of every route the resource owns
    pub fn path_segment(&self) -> String {
        self.collection_key()
    }

    /// Envelope key for members and mutation bodies
    pub fn member_key(&self) -> &str {
        &self.name
    }

    pub fn permits(&self, action: Action) -> bool {
        self.handles.contains(action)
    }

    pub fn scope_named(&self, name: &str) -> Option<&ScopeDescriptor> {
        self.scopes.iter().find(|s| s.name == name)
    }

    pub fn association_named(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.iter().find(|a| a.name == name)
    }

    pub fn remote_named(&self, name: &str) -> Option<&RemoteDescriptor> {
        self.remotes.iter().find(|r| r.name == name)
    }

    /// Filter vocabulary, in declaration order
    pub fn scope_names(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.name.clone()).collect()
    }

    pub fn is_writable(&self, field: &str) -> bool {
        field != self.primary_key && self.permitted.iter().any(|f| f == field)
    }

    /// Field the resource is known to carry (used to validate ordering)
    pub fn knows_field(&self, field: &str) -> bool {
        field == self.primary_key
            || self.permitted.iter().any(|f| f == field)
            || self.read_only.iter().any(|f| f == field)
            || (self.timestamps && (field == "created_at" || field == "updated_at"))
            || self
                .associations
                .iter()
                .filter(|a| a.kind == AssociationKind::BelongsTo)
                .any(|a| a.foreign_key_for(self) == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_defaults() {
        let post = ResourceDescriptor::new("post");
        assert_eq!(post.model_name(), "post");
        assert_eq!(post.collection_key(), "posts");
        assert_eq!(post.member_key(), "post");
        assert_eq!(post.primary_key, "id");
    }

    #[test]
    fn test_naming_overrides() {
        let tests = ResourceDescriptor::new("case")
            .model("case")
            .record_name("results")
            .primary_key("test_id");
        assert_eq!(tests.collection_key(), "results");
        assert_eq!(tests.primary_key, "test_id");
    }

    #[test]
    fn test_foreign_key_conventions() {
        let post = ResourceDescriptor::new("post");
        let author = AssociationDescriptor::belongs_to("author", "user");
        let comments = AssociationDescriptor::has_many("comments", "comment");
        let custom = AssociationDescriptor::has_many("notes", "comment").foreign_key("parent_id");

        assert_eq!(author.foreign_key_for(&post), "author_id");
        assert_eq!(comments.foreign_key_for(&post), "post_id");
        assert_eq!(custom.foreign_key_for(&post), "parent_id");
    }

    #[test]
    fn test_handles_subset() {
        let tests = ResourceDescriptor::new("case").handles(ActionSet::of(&[
            Action::Create,
            Action::Update,
            Action::Destroy,
        ]));
        assert!(tests.permits(Action::Create));
        assert!(!tests.permits(Action::Index));
        assert!(!tests.permits(Action::Show));
        assert!(ResourceDescriptor::new("suite").permits(Action::Remoted));
    }

    #[test]
    fn test_primary_key_is_never_writable() {
        let suite = ResourceDescriptor::new("suite").permit(&["id", "name"]);
        assert!(!suite.is_writable("id"));
        assert!(suite.is_writable("name"));
        assert!(!suite.is_writable("switch"));
    }

    #[test]
    fn test_source_defaults_to_own_name() {
        let company = AssociationDescriptor::has_one_through("company", "company", "blog");
        assert_eq!(company.source_name(), Some("company"));
        let commenters =
            AssociationDescriptor::has_many_through("commenters", "user", "comments").source("commenter");
        assert_eq!(commenters.source_name(), Some("commenter"));
        assert_eq!(AssociationDescriptor::has_many("comments", "comment").source_name(), None);
    }

    #[test]
    fn test_scope_rules_deserialize() {
        let scopes: Vec<ScopeDescriptor> = serde_json::from_str(
            r#"[
                {"name": "published", "rule": "fixed", "predicates": [{"field": "published", "value": true}]},
                {"name": "blog_id", "rule": "param", "field": "blog_id"}
            ]"#,
        )
        .unwrap();
        assert!(!scopes[0].is_parameterized());
        assert!(scopes[1].is_parameterized());
    }
}
