// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::xmltv::XmltvDocument;

/// Lowercased channel display name to XMLTV channel id.
///
/// Documents are folded in order and a later document overwrites an
/// earlier one on the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameIndex {
    names: HashMap<String, String>,
}

impl NameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a XmltvDocument>,
    {
        let mut index = Self::new();
        for doc in documents {
            index.add_document(doc);
        }
        index
    }

    /// Index every channel that has both an id and a display name.
    /// Returns how many entries were written.
    pub fn add_document(&mut self, doc: &XmltvDocument) -> usize {
        let mut added = 0;
        for channel in &doc.channels {
            let Some(name) = channel.display_name.as_deref() else {
                continue;
            };
            if channel.id.is_empty() || name.is_empty() {
                continue;
            }
            if let Some(previous) = self.names.insert(name.to_lowercase(), channel.id.clone())
                && previous != channel.id
            {
                debug!("Display name '{}' remapped: {} -> {}", name, previous, channel.id);
            }
            added += 1;
        }
        added
    }

    pub fn insert(&mut self, name: &str, id: &str) {
        self.names.insert(name.to_lowercase(), id.to_string());
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Every channel id the index can produce.
    pub fn ids(&self) -> HashSet<&str> {
        self.names.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
