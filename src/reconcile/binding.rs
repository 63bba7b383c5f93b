//! # Table Bindings
//!
//! A binding is the per-table descriptor resolved once at subscription
//! time: which strategy applies, which cache keys it targets, how records
//! are identified, and how raw rows map to domain records. Reconciliation
//! code then operates on a concretely-described record instead of
//! re-interpreting shapes per event.

use std::sync::Arc;

use serde_json::Value;

use super::cascade::CascadeRule;
use crate::cache::QueryKey;
use crate::event::IdentityFields;

/// Pure row-mapping collaborator supplied by the domain layer.
///
/// Must preserve the identity field(s): dedup/replace/remove matches the
/// raw row's identity against already-mapped cached items.
pub type MapRow = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Reconciliation strategy, chosen explicitly per table
#[derive(Debug, Clone)]
pub enum Strategy {
    /// Patch every list entry in a key family in place
    List {
        /// Key-family prefix; also the seed key for never-fetched lists
        family: QueryKey,
        /// Field holding the records when the entry is object-shaped
        items_field: String,
        /// Paired counter field to increment/decrement, when present
        total_field: Option<String>,
    },
    /// Replace or clear the entry addressed by one record's identity
    Single {
        /// Detail keys are `prefix` + the record identity
        prefix: QueryKey,
    },
    /// Mark target entries stale on any operation
    InvalidateOnly {
        /// Entries (or families) to mark stale
        targets: Vec<QueryKey>,
        /// Match targets exactly instead of by prefix
        exact: bool,
    },
}

/// Per-table reconciliation descriptor
#[derive(Clone)]
pub struct TableBinding {
    /// Table this binding reconciles
    pub table: String,

    /// Identity field(s) of the table's records
    pub identity: IdentityFields,

    /// Optional raw-row to domain-record mapping
    pub map_row: Option<MapRow>,

    /// Strategy to apply
    pub strategy: Strategy,

    /// Dependent keys to invalidate after the primary reconciliation
    pub cascades: Vec<CascadeRule>,
}

impl TableBinding {
    /// List strategy over a key family
    pub fn list(table: impl Into<String>, family: QueryKey) -> Self {
        Self {
            table: table.into(),
            identity: IdentityFields::default(),
            map_row: None,
            strategy: Strategy::List {
                family,
                items_field: "items".to_string(),
                total_field: None,
            },
            cascades: Vec::new(),
        }
    }

    /// Single-record strategy under a detail prefix
    pub fn single(table: impl Into<String>, prefix: QueryKey) -> Self {
        Self {
            table: table.into(),
            identity: IdentityFields::default(),
            map_row: None,
            strategy: Strategy::Single { prefix },
            cascades: Vec::new(),
        }
    }

    /// Invalidate-only strategy over target keys (prefix match)
    pub fn invalidate_only(table: impl Into<String>, targets: Vec<QueryKey>) -> Self {
        Self {
            table: table.into(),
            identity: IdentityFields::default(),
            map_row: None,
            strategy: Strategy::InvalidateOnly {
                targets,
                exact: false,
            },
            cascades: Vec::new(),
        }
    }

    /// Override the identity field(s)
    pub fn with_identity(mut self, identity: impl Into<IdentityFields>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Attach a row-mapping collaborator
    pub fn with_map_row(
        mut self,
        f: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.map_row = Some(Arc::new(f));
        self
    }

    /// Track a paired total counter (list strategy only)
    pub fn with_total_field(mut self, field: impl Into<String>) -> Self {
        if let Strategy::List { total_field, .. } = &mut self.strategy {
            *total_field = Some(field.into());
        }
        self
    }

    /// Override the items field name (list strategy only)
    pub fn with_items_field(mut self, field: impl Into<String>) -> Self {
        if let Strategy::List { items_field, .. } = &mut self.strategy {
            *items_field = field.into();
        }
        self
    }

    /// Match invalidate-only targets exactly instead of by prefix
    pub fn with_exact_targets(mut self) -> Self {
        if let Strategy::InvalidateOnly { exact, .. } = &mut self.strategy {
            *exact = true;
        }
        self
    }

    /// Add a cascade rule
    pub fn with_cascade(mut self, rule: CascadeRule) -> Self {
        self.cascades.push(rule);
        self
    }

    /// Map a raw row to its domain record
    pub(crate) fn map(&self, row: &Value) -> Value {
        match &self.map_row {
            Some(map_row) => map_row(row),
            None => row.clone(),
        }
    }
}

impl std::fmt::Debug for TableBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableBinding")
            .field("table", &self.table)
            .field("identity", &self.identity)
            .field("map_row", &self.map_row.is_some())
            .field("strategy", &self.strategy)
            .field("cascades", &self.cascades.len())
            .finish()
    }
}
