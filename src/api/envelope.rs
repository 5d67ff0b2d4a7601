//! List response normalization.
//!
//! List endpoints answer with one of three shapes: a bare array, `{data}`, or
//! `{data, total}`. Everything is folded into [`ListEnvelope`].

use serde::{Deserialize, Deserializer, Serialize};

/// A page of items with an optional total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEnvelope<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawList<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "items", alias = "organizations")]
        data: Vec<T>,
        #[serde(default)]
        total: Option<u64>,
    },
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for ListEnvelope<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawList::deserialize(deserializer)? {
            RawList::Bare(data) => Self { data, total: None },
            RawList::Wrapped { data, total } => Self { data, total },
        })
    }
}

impl<T> ListEnvelope<T> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total reported by the backend, or the page length.
    pub fn total(&self) -> u64 {
        self.total.unwrap_or(self.data.len() as u64)
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T> Default for ListEnvelope<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            total: None,
        }
    }
}
