use thiserror::Error;

/// Typed error taxonomy for the parts of the system the error-handling policy
/// in the spec actually governs (client-facing validation, retry policy,
/// idempotence classification). Ad-hoc internal glue still uses `anyhow`,
/// matching the rest of this workspace; this enum is only for the boundaries
/// where callers need to branch on the *kind* of failure.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported chain or asset: {0}")]
    Unsupported(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("transient RPC error: {0}")]
    RpcTransient(String),

    #[error("signer on wrong chain: expected {expected}, found {found}")]
    ChainMismatch { expected: String, found: String },

    #[error("secret does not hash to the order's secret_hash")]
    SecretMismatch,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("on-chain execution reverted: {0}")]
    ContractRevert(String),
}

impl CoreError {
    /// `true` if retrying the same operation with backoff is the correct policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::RpcTransient(_) | CoreError::Storage(_))
    }

    /// `true` if this failure should be treated as an idempotent success
    /// because the prior outcome is already recorded on-chain or in the store.
    pub fn is_idempotent_success(&self) -> bool {
        match self {
            CoreError::Duplicate(_) => true,
            CoreError::ContractRevert(reason) => {
                let lower = reason.to_lowercase();
                lower.contains("already initiated")
                    || lower.contains("already fulfilled")
                    || lower.contains("already redeemed")
                    || lower.contains("already deployed")
                    || lower.contains("duplicateorder")
                    || lower.contains("alreadyexists")
            }
            _ => false,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::InvalidRequest(_)
            | CoreError::Unsupported(_)
            | CoreError::SecretMismatch
            | CoreError::Duplicate(_) => 400,
            CoreError::ChainMismatch { .. } => 409,
            CoreError::RpcTransient(_) | CoreError::Storage(_) | CoreError::ContractRevert(_) => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_is_idempotent_success() {
        assert!(CoreError::Duplicate("x".into()).is_idempotent_success());
    }

    #[test]
    fn revert_reason_matching_known_idempotent_phrases() {
        for reason in [
            "already initiated",
            "Already Fulfilled",
            "reverted: DuplicateOrder()",
            "AlreadyExists",
        ] {
            assert!(
                CoreError::ContractRevert(reason.into()).is_idempotent_success(),
                "expected {reason} to be treated as idempotent success"
            );
        }
    }

    #[test]
    fn revert_reason_not_matching_is_a_real_failure() {
        assert!(!CoreError::ContractRevert("insufficient balance".into()).is_idempotent_success());
    }

    #[test]
    fn rpc_and_storage_errors_are_retryable() {
        assert!(CoreError::RpcTransient("timeout".into()).is_retryable());
        assert!(CoreError::Storage("connection reset".into()).is_retryable());
        assert!(!CoreError::SecretMismatch.is_retryable());
    }

    #[test]
    fn http_status_codes_match_taxonomy() {
        assert_eq!(CoreError::InvalidRequest("x".into()).http_status(), 400);
        assert_eq!(CoreError::SecretMismatch.http_status(), 400);
        assert_eq!(
            CoreError::ChainMismatch { expected: "a".into(), found: "b".into() }.http_status(),
            409
        );
        assert_eq!(CoreError::Storage("x".into()).http_status(), 502);
    }
}
