//! Typed values
//!
//! Wraps application values as integers or text and serializes them into the
//! raw [`Value`] bytes the tree stores.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Value;

/// A typed application value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Int(i32),
    Text(String),
}

impl Entity {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Entity::Int(v) => Some(*v),
            Entity::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Entity::Text(s) => Some(s),
            Entity::Int(_) => None,
        }
    }

    /// Serialize into a stored value (fails if it exceeds the value size limit)
    pub fn to_value(&self) -> Result<Value> {
        Value::new(bincode::serialize(self)?)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        Ok(bincode::deserialize(value.as_bytes())?)
    }
}

impl From<i32> for Entity {
    fn from(v: i32) -> Self {
        Entity::Int(v)
    }
}

impl From<&str> for Entity {
    fn from(s: &str) -> Self {
        Entity::Text(s.to_string())
    }
}

impl From<String> for Entity {
    fn from(s: String) -> Self {
        Entity::Text(s)
    }
}
