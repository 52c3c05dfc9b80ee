//! Request key validation.

/// Longest key the memcache protocol accepts.
pub const MAX_KEY_LEN: usize = 250;

/// Why a key was rejected. The display text is sent back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key: key is empty")]
    Empty,
    #[error("invalid key: key too long")]
    TooLong,
    #[error("invalid key: space or control character")]
    SpaceOrControl,
}

/// Check that `key` can be sent to a memcache destination.
pub fn validate_key(key: &[u8]) -> Result<(), KeyError> {
    if key.is_empty() {
        return Err(KeyError::Empty);
    }
    if key.len() > MAX_KEY_LEN {
        return Err(KeyError::TooLong);
    }
    if key.iter().any(|&b| b <= b' ' || b == 0x7f) {
        return Err(KeyError::SpaceOrControl);
    }
    Ok(())
}
