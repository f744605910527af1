//! # Granted permissions
//!
//! The permission set an actor holds, used for authorization decisions.
//! Slugs are stored in canonical (dotted) form so that a check in either
//! format matches a grant in either format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use admin_core::PermissionLookup;

use crate::models::Permission;
use crate::slug::canonical;

/// A set of granted permission slugs.
///
/// # Example
///
/// ```
/// use admin_core::PermissionLookup;
/// use admin_rbac::GrantedPermissions;
///
/// let granted = GrantedPermissions::from_slugs(["books.view", "books_create"]);
/// assert!(granted.has_permission("books_view"));
/// assert!(granted.has_permission("books.create"));
/// assert!(!granted.has_permission("books.delete"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantedPermissions {
    slugs: BTreeSet<String>,
}

impl GrantedPermissions {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw slugs in either format.
    pub fn from_slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for slug in slugs {
            set.grant(slug.as_ref());
        }
        set
    }

    /// Build from active permission rows.
    pub fn from_permissions<'a, I>(permissions: I) -> Self
    where
        I: IntoIterator<Item = &'a Permission>,
    {
        Self::from_slugs(
            permissions
                .into_iter()
                .filter(|p| p.is_active)
                .map(|p| p.slug.as_str()),
        )
    }

    /// Add a slug.
    pub fn grant(&mut self, slug: &str) {
        self.slugs.insert(canonical(slug));
    }

    /// Remove a slug.
    ///
    /// Returns `true` if it was present.
    pub fn revoke(&mut self, slug: &str) -> bool {
        self.slugs.remove(&canonical(slug))
    }

    /// Merge another set into this one.
    pub fn extend(&mut self, other: &GrantedPermissions) {
        self.slugs.extend(other.slugs.iter().cloned());
    }

    /// Check for a slug in either format.
    pub fn has(&self, slug: &str) -> bool {
        self.slugs.contains(&canonical(slug))
    }

    /// Canonical slugs, sorted.
    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.slugs.iter().map(String::as_str)
    }

    /// Number of granted slugs.
    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    /// Whether nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

impl PermissionLookup for GrantedPermissions {
    fn has_permission(&self, slug: &str) -> bool {
        self.has(slug)
    }
}
