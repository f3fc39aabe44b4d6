//! Entity types and share scopes
//!
//! Every persisted record belongs to one entity type. Each type names the
//! fields that are stored as ciphertext when its owner encrypts records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of persisted domain object
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Bank, credit, or investment account
    Account,
    /// Single transaction
    Transaction,
    /// Recurring bill or income item
    Recurring,
    /// Budget allocation
    Budget,
    /// Savings goal
    Goal,
}

impl EntityType {
    /// All entity types, in display order
    pub const ALL: [EntityType; 5] = [
        Self::Account,
        Self::Transaction,
        Self::Recurring,
        Self::Budget,
        Self::Goal,
    ];

    /// Fields stored as ciphertext for encrypting owners
    pub fn sensitive_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Account => &["name", "institution", "account_number", "balance", "notes"],
            Self::Transaction => &["payee", "amount", "memo", "category"],
            Self::Recurring => &["name", "amount", "payee", "notes"],
            Self::Budget => &["category", "amount"],
            Self::Goal => &["name", "target_amount", "current_amount"],
        }
    }

    /// Check whether a field is sensitive for this type
    pub fn is_sensitive(&self, field: &str) -> bool {
        self.sensitive_fields().contains(&field)
    }

    /// Stable lowercase name, also used in associated data
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Transaction => "transaction",
            Self::Recurring => "recurring",
            Self::Budget => "budget",
            Self::Goal => "goal",
        }
    }

    /// Parse entity type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "account" | "accounts" => Some(Self::Account),
            "transaction" | "transactions" | "txn" => Some(Self::Transaction),
            "recurring" | "recurring_item" => Some(Self::Recurring),
            "budget" | "budgets" => Some(Self::Budget),
            "goal" | "goals" => Some(Self::Goal),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a share or sharing default covers
///
/// Serialized as `"all"` or the entity type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShareScope {
    /// Every entity type the owner has
    All,
    /// A single entity type
    Type(EntityType),
}

impl Serialize for ShareScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ShareScope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown share scope: {}", raw)))
    }
}

impl ShareScope {
    /// Check whether this scope covers an entity type
    pub fn covers(&self, entity_type: EntityType) -> bool {
        match self {
            Self::All => true,
            Self::Type(t) => *t == entity_type,
        }
    }

    /// Parse a scope ("all" or an entity type name)
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        EntityType::parse(s).map(Self::Type)
    }
}

impl From<EntityType> for ShareScope {
    fn from(entity_type: EntityType) -> Self {
        Self::Type(entity_type)
    }
}

impl fmt::Display for ShareScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Type(t) => write!(f, "{}", t),
        }
    }
}
