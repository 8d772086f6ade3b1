//! Macro for defining typed ID types.

/// Defines a ULID-backed ID newtype with a fixed string prefix.
///
/// The generated type gets a `PREFIX` constant, `new()` to mint a fresh ID,
/// `Display` in the `{prefix}_{ulid}` form, and `Ord`/`Hash` so IDs can key
/// maps and sort by creation time.
///
/// # Example
///
/// ```ignore
/// define_id!(ConnectionId, "conn");
///
/// let id = ConnectionId::new();
/// tracing::debug!(connection_id = %id, "Opened");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::Ulid);

        impl $name {
            /// The prefix for this ID type.
            pub const PREFIX: &'static str = $prefix;

            /// Creates a new ID with a fresh ULID.
            #[must_use]
            pub fn new() -> Self {
                Self($crate::Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", Self::PREFIX, self.0)
            }
        }
    };
}
