//! Cache category registry
//!
//! Categories give every logical data type its own key namespace and default
//! TTL. The set is fixed at startup: the registry is built once, validated,
//! and never mutated. Asking for a category that was never registered is a
//! programming error, not a runtime condition, and panics immediately rather
//! than silently writing an unnamespaced key.

use crate::config::CategoryConfig;
use crate::{CacheError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// A registered cache category: logical name, key prefix, default TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCategory {
    pub name: String,
    pub key_prefix: String,
    pub default_ttl: Duration,
}

impl CacheCategory {
    /// Build the namespaced backend key for a user key.
    pub fn full_key(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.key_prefix.len() + key.len());
        full.push_str(&self.key_prefix);
        full.push_str(key);
        full
    }

    /// Glob pattern matching every key in this category.
    pub fn key_pattern(&self) -> String {
        format!("{}*", self.key_prefix)
    }
}

/// Immutable registry of all categories known to the process.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: HashMap<String, CacheCategory>,
}

/// Builder collecting category definitions before validation.
#[derive(Debug, Default)]
pub struct CategoryRegistryBuilder {
    entries: Vec<CacheCategory>,
}

impl CategoryRegistryBuilder {
    pub fn category(
        mut self,
        name: impl Into<String>,
        key_prefix: impl Into<String>,
        default_ttl: Duration,
    ) -> Self {
        self.entries.push(CacheCategory {
            name: name.into(),
            key_prefix: key_prefix.into(),
            default_ttl,
        });
        self
    }

    /// Validate and freeze the registry.
    ///
    /// Rejects empty names/prefixes, zero TTLs, duplicate names, and any
    /// prefix that is a prefix of another (two categories must never collide
    /// in the backend key space).
    pub fn build(self) -> Result<CategoryRegistry> {
        let mut categories = HashMap::with_capacity(self.entries.len());

        for entry in &self.entries {
            if entry.name.is_empty() {
                return Err(CacheError::Config("category name must not be empty".into()));
            }
            if entry.key_prefix.is_empty() {
                return Err(CacheError::Config(format!(
                    "category '{}' has an empty key prefix",
                    entry.name
                )));
            }
            if entry.default_ttl.is_zero() {
                return Err(CacheError::Config(format!(
                    "category '{}' has a zero default TTL",
                    entry.name
                )));
            }
        }

        for (i, a) in self.entries.iter().enumerate() {
            for b in self.entries.iter().skip(i + 1) {
                if a.name == b.name {
                    return Err(CacheError::Config(format!(
                        "duplicate category name '{}'",
                        a.name
                    )));
                }
                if a.key_prefix.starts_with(&b.key_prefix)
                    || b.key_prefix.starts_with(&a.key_prefix)
                {
                    return Err(CacheError::Config(format!(
                        "key prefixes of categories '{}' and '{}' overlap",
                        a.name, b.name
                    )));
                }
            }
        }

        for entry in self.entries {
            categories.insert(entry.name.clone(), entry);
        }

        Ok(CategoryRegistry { categories })
    }
}

impl CategoryRegistry {
    pub fn builder() -> CategoryRegistryBuilder {
        CategoryRegistryBuilder::default()
    }

    /// Build a registry from configuration entries.
    pub fn from_config(entries: &[CategoryConfig]) -> Result<Self> {
        let mut builder = Self::builder();
        for entry in entries {
            builder = builder.category(
                &entry.name,
                &entry.key_prefix,
                Duration::from_secs(entry.default_ttl_secs),
            );
        }
        builder.build()
    }

    /// Look up a category by name.
    ///
    /// # Panics
    /// Panics if the category was never registered. The registry is a closed
    /// set fixed at startup; an unknown name is a bug at the call site.
    pub fn resolve(&self, name: &str) -> &CacheCategory {
        self.categories.get(name).unwrap_or_else(|| {
            panic!(
                "cache category '{name}' is not registered (known: {:?})",
                self.names()
            )
        })
    }

    /// Non-panicking lookup, for callers probing the registry.
    pub fn get(&self, name: &str) -> Option<&CacheCategory> {
        self.categories.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.categories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
