//! Route categories and the prefix table that assigns them.
//!
//! Every inbound path is classified into zero or more [`RouteCategory`]
//! values. Classification is a pure prefix comparison against an ordered
//! [`RouteTable`]: a path collects the categories of *every* rule it matches,
//! not just the first one, so `/api/transaction/create` is both
//! [`RouteCategory::Api`] and [`RouteCategory::ApiTransaction`].
//!
//! An empty result means "unclassified" and is treated as public.
//!
//! # Example
//!
//! ```
//! use tollgate_core::{RouteCategory, RouteTable};
//!
//! let table = RouteTable::default();
//! let categories = table.classify("/api/transaction/create");
//!
//! assert!(categories.contains(RouteCategory::Api));
//! assert!(categories.contains(RouteCategory::ApiTransaction));
//! assert!(table.classify("/no/such/route").is_empty());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Security classification of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u8)]
pub enum RouteCategory {
    /// Explicitly public page.
    Public = 0,
    /// Static asset (stylesheets, scripts, images, fonts).
    StaticAsset = 1,
    /// Any API route.
    Api = 2,
    /// Authentication API (login, token refresh).
    ApiAuth = 3,
    /// File upload API.
    ApiUpload = 4,
    /// Search API.
    ApiSearch = 5,
    /// Money-moving transaction API.
    ApiTransaction = 6,
    /// Page that requires a session.
    Protected = 7,
    /// Page that requires the `ADMIN` role.
    Admin = 8,
    /// Login/registration page; authenticated callers are sent away.
    AuthPage = 9,
    /// Page that requires a verified KYC status.
    KycRequired = 10,
}

impl RouteCategory {
    /// All categories in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Public,
        Self::StaticAsset,
        Self::Api,
        Self::ApiAuth,
        Self::ApiUpload,
        Self::ApiSearch,
        Self::ApiTransaction,
        Self::Protected,
        Self::Admin,
        Self::AuthPage,
        Self::KycRequired,
    ];

    /// Returns the kebab-case name used in configuration and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::StaticAsset => "static-asset",
            Self::Api => "api",
            Self::ApiAuth => "api-auth",
            Self::ApiUpload => "api-upload",
            Self::ApiSearch => "api-search",
            Self::ApiTransaction => "api-transaction",
            Self::Protected => "protected",
            Self::Admin => "admin",
            Self::AuthPage => "auth-page",
            Self::KycRequired => "kyc-required",
        }
    }

    /// Returns true for [`Api`](Self::Api) and its sub-categories.
    #[must_use]
    pub const fn is_api(self) -> bool {
        matches!(
            self,
            Self::Api | Self::ApiAuth | Self::ApiUpload | Self::ApiSearch | Self::ApiTransaction
        )
    }

    const fn bit(self) -> u16 {
        1 << (self as u8)
    }
}

impl fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown route category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for RouteCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// A small set of [`RouteCategory`] values.
///
/// Backed by a bitmask, so it is `Copy` and cheap to pass between stages.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CategorySet(u16);

impl CategorySet {
    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Adds a category to the set.
    pub fn insert(&mut self, category: RouteCategory) {
        self.0 |= category.bit();
    }

    /// Returns a copy of this set with `category` added.
    #[must_use]
    pub const fn with(self, category: RouteCategory) -> Self {
        Self(self.0 | category.bit())
    }

    /// Returns true if the set contains `category`.
    #[must_use]
    pub const fn contains(&self, category: RouteCategory) -> bool {
        self.0 & category.bit() != 0
    }

    /// Returns true if no category matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of categories in the set.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true if the path is unclassified or explicitly public.
    #[must_use]
    pub const fn is_public(&self) -> bool {
        self.is_empty() || self.contains(RouteCategory::Public)
    }

    /// Returns true if any API category is present.
    #[must_use]
    pub fn is_api(&self) -> bool {
        self.iter().any(RouteCategory::is_api)
    }

    /// Iterates the categories in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = RouteCategory> + '_ {
        RouteCategory::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("unclassified");
        }
        let names: Vec<&str> = self.iter().map(RouteCategory::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl FromIterator<RouteCategory> for CategorySet {
    fn from_iter<I: IntoIterator<Item = RouteCategory>>(iter: I) -> Self {
        let mut set = Self::empty();
        for category in iter {
            set.insert(category);
        }
        set
    }
}

/// One `(prefix, categories)` row of the route table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    /// Path prefix, always starting with `/`.
    pub prefix: String,

    /// Categories granted to every path under `prefix`.
    pub categories: Vec<RouteCategory>,
}

impl RouteRule {
    /// Creates a rule.
    pub fn new(prefix: impl Into<String>, categories: impl IntoIterator<Item = RouteCategory>) -> Self {
        Self {
            prefix: prefix.into(),
            categories: categories.into_iter().collect(),
        }
    }

    /// Returns true if `path` falls under this rule's prefix.
    ///
    /// Matching respects segment boundaries: `/api` matches `/api` and
    /// `/api/users` but not `/apix`. The root prefix `/` only matches `/`,
    /// and any other prefix ending in `/` is compared as a plain prefix.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        prefix_matches(&self.prefix, path)
    }
}

/// Segment-aware prefix test shared by route rules, CSRF exemptions and the
/// cache policy.
///
/// ```
/// use tollgate_core::route::prefix_matches;
///
/// assert!(prefix_matches("/api", "/api/users"));
/// assert!(!prefix_matches("/api", "/apix"));
/// assert!(!prefix_matches("/", "/about"));
/// ```
#[must_use]
pub fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// The ordered prefix table used to classify request paths.
///
/// The table is built once from configuration and never mutated; share it
/// behind an `Arc` if several gateways need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
    static_extensions: Vec<String>,
}

impl RouteTable {
    /// Creates a table from rules and static-asset file extensions.
    ///
    /// Extensions are stored lowercase without the leading dot.
    pub fn new(rules: Vec<RouteRule>, static_extensions: impl IntoIterator<Item = String>) -> Self {
        let static_extensions = static_extensions
            .into_iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            rules,
            static_extensions,
        }
    }

    /// The default route rules.
    #[must_use]
    pub fn default_rules() -> Vec<RouteRule> {
        use RouteCategory::{
            Admin, Api, ApiAuth, ApiSearch, ApiTransaction, ApiUpload, AuthPage, KycRequired,
            Protected, Public, StaticAsset,
        };

        let mut rules = vec![
            RouteRule::new("/api/auth", [ApiAuth]),
            RouteRule::new("/api/upload", [ApiUpload]),
            RouteRule::new("/api/search", [ApiSearch]),
            RouteRule::new("/api/transaction", [ApiTransaction]),
            RouteRule::new("/api", [Api]),
            RouteRule::new("/admin", [Admin, Protected]),
            RouteRule::new("/properties/invest", [KycRequired]),
            RouteRule::new("/wallet/withdraw", [KycRequired]),
        ];
        rules.extend(
            [
                "/dashboard",
                "/portfolio",
                "/wallet",
                "/transactions",
                "/settings",
                "/profile",
                "/onboarding",
            ]
            .into_iter()
            .map(|p| RouteRule::new(p, [Protected])),
        );
        rules.extend(
            ["/login", "/register", "/forgot-password", "/reset-password"]
                .into_iter()
                .map(|p| RouteRule::new(p, [AuthPage])),
        );
        rules.extend(
            ["/", "/about", "/properties", "/contact"]
                .into_iter()
                .map(|p| RouteRule::new(p, [Public])),
        );
        rules.extend(
            ["/_next/static", "/static", "/assets"]
                .into_iter()
                .map(|p| RouteRule::new(p, [StaticAsset])),
        );
        rules
    }

    /// The default static-asset file extensions.
    #[must_use]
    pub fn default_static_extensions() -> Vec<String> {
        ["css", "js", "png", "jpg", "jpeg", "gif", "svg", "ico", "woff", "woff2"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Returns the rules in table order.
    #[must_use]
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Classifies a normalized path (no query string).
    ///
    /// Never fails: an unmatched path yields the empty set.
    #[must_use]
    pub fn classify(&self, path: &str) -> CategorySet {
        let mut set: CategorySet = self
            .rules
            .iter()
            .filter(|rule| rule.matches(path))
            .flat_map(|rule| rule.categories.iter().copied())
            .collect();

        if self.is_static_asset(path) {
            set.insert(RouteCategory::StaticAsset);
        }
        set
    }

    /// Returns true if the last path segment has a static-asset extension.
    #[must_use]
    pub fn is_static_asset(&self, path: &str) -> bool {
        let segment = path.rsplit('/').next().unwrap_or(path);
        segment
            .rsplit_once('.')
            .is_some_and(|(stem, ext)| {
                !stem.is_empty()
                    && self
                        .static_extensions
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
            })
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(Self::default_rules(), Self::default_static_extensions())
    }
}
