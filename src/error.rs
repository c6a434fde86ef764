//! Error kinds surfaced by the dict and its hashing collaborators.

/// Everything a dict operation can fail with.
///
/// Capacity errors (`RehashInProgress`, `InvalidTarget`) are ordinary
/// runtime conditions the caller handles locally. `UnsupportedKeyType`
/// comes from the injected hasher. `ConcurrentStructuralMutation` is a
/// programming error: an unsafe traversal observed a change of shape.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DictError {
    #[error("[Dict] resize rejected: rehash in progress")]
    RehashInProgress,
    #[error("[Dict] resize target {requested} cannot hold {used} entries")]
    InvalidTarget { requested: u64, used: u64 },
    #[error("[Dict] key type {type_name} is not supported")]
    UnsupportedKeyType { type_name: &'static str },
    #[error(
        "[Dict] structure changed during unsafe iteration \
         (fingerprint {expected:#x} != {actual:#x})"
    )]
    ConcurrentStructuralMutation { expected: i64, actual: i64 },
}

#[cfg(test)]
mod tests {
    use super::DictError;

    #[test]
    fn messages_name_the_condition() {
        let e = DictError::InvalidTarget {
            requested: 2,
            used: 9,
        };
        assert_eq!(
            e.to_string(),
            "[Dict] resize target 2 cannot hold 9 entries"
        );
        let e = DictError::UnsupportedKeyType { type_name: "float" };
        assert!(e.to_string().contains("float"));
    }
}
