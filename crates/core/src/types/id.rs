//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. Ad platform IDs are
//! opaque decimal strings, so every wrapper is backed by a `String`.

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Default`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`
/// - `From<&str>`, `From<String>` and `Into<String>` implementations
///
/// # Example
///
/// ```rust
/// # use adledger_core::define_id;
/// define_id!(AdSetId);
/// define_id!(AdId);
///
/// let ad_set = AdSetId::new("120200001");
/// let ad = AdId::new("120200001");
///
/// // These are different types, so this won't compile:
/// // let _: AdSetId = ad;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(AccountId);
define_id!(CampaignId);

/// Prefix the ad platform puts in front of numeric account IDs.
const ACCOUNT_PREFIX: &str = "act_";

impl AccountId {
    /// The numeric part of the account ID, without the `act_` prefix.
    ///
    /// Callers pass IDs both with and without the prefix, so comparisons
    /// between requested and listed accounts go through this form.
    #[must_use]
    pub fn normalized(&self) -> &str {
        self.0.strip_prefix(ACCOUNT_PREFIX).unwrap_or(&self.0)
    }

    /// The ID as used in Graph API paths (`act_<digits>`).
    #[must_use]
    pub fn graph_node(&self) -> String {
        format!("{ACCOUNT_PREFIX}{}", self.normalized())
    }

    /// Whether two IDs name the same account, ignoring the `act_` prefix.
    #[must_use]
    pub fn same_account(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}
