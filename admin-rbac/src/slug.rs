//! # Permission slugs
//!
//! Two slug conventions coexist and are accepted as aliases of each other:
//!
//! ```text
//! books.view        dotted      split at the first '.'
//! books_view        underscored split at the last '_'
//! user_roles.view   dotted, resource contains '_'
//! user_roles_view   underscored, same permission
//! ```
//!
//! Action names never contain either separator, so both forms parse to the
//! same `(resource, action)` pair.

use serde::{Deserialize, Serialize};

/// Slug convention.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlugFormat {
    /// `<resource>.<action>` (matrix/gate style).
    #[default]
    Dotted,
    /// `<resource>_<action>` (seeder/service style).
    Underscored,
}

impl SlugFormat {
    /// Separator character.
    pub fn separator(&self) -> char {
        match self {
            SlugFormat::Dotted => '.',
            SlugFormat::Underscored => '_',
        }
    }
}

/// A parsed permission slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionSlug {
    /// Resource part (e.g. "books").
    pub resource: String,
    /// Action part (e.g. "view").
    pub action: String,
}

impl PermissionSlug {
    /// Create a slug from its parts.
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }

    /// Parse either slug format.
    ///
    /// # Example
    ///
    /// ```
    /// use admin_rbac::slug::{PermissionSlug, SlugFormat};
    ///
    /// let dotted = PermissionSlug::parse("user_roles.assign").unwrap();
    /// let underscored = PermissionSlug::parse("user_roles_assign").unwrap();
    /// assert_eq!(dotted, underscored);
    /// assert_eq!(dotted.resource, "user_roles");
    /// assert_eq!(underscored.format(SlugFormat::Dotted), "user_roles.assign");
    /// assert!(PermissionSlug::parse("books").is_none());
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        let (resource, action) = if let Some((resource, action)) = s.split_once('.') {
            (resource, action)
        } else {
            s.rsplit_once('_')?
        };

        if resource.is_empty() || action.is_empty() || action.contains(|c: char| c == '.' || c == '_') {
            return None;
        }
        Some(Self::new(resource, action))
    }

    /// Detect which format a raw slug uses.
    pub fn detect_format(s: &str) -> Option<SlugFormat> {
        Self::parse(s)?;
        if s.contains('.') {
            Some(SlugFormat::Dotted)
        } else {
            Some(SlugFormat::Underscored)
        }
    }

    /// Render in the given format.
    pub fn format(&self, format: SlugFormat) -> String {
        format!("{}{}{}", self.resource, format.separator(), self.action)
    }

    /// Canonical (dotted) form.
    pub fn dotted(&self) -> String {
        self.format(SlugFormat::Dotted)
    }

    /// Underscored form.
    pub fn underscored(&self) -> String {
        self.format(SlugFormat::Underscored)
    }

    /// Both accepted spellings.
    pub fn aliases(&self) -> [String; 2] {
        [self.dotted(), self.underscored()]
    }

    /// Whether a raw slug names this permission under either format.
    pub fn matches(&self, raw: &str) -> bool {
        Self::parse(raw).map_or(false, |other| &other == self)
    }
}

impl std::fmt::Display for PermissionSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

/// Normalize a raw slug to its dotted form, leaving unparseable input as-is.
pub fn canonical(raw: &str) -> String {
    PermissionSlug::parse(raw)
        .map(|slug| slug.dotted())
        .unwrap_or_else(|| raw.trim().to_string())
}
