use crate::ProtoError;

/// Maximum key length in bytes.
pub const MAX_KEY_LEN: usize = 250;

/// Keys are printable ASCII with no whitespace, at most 250 bytes. Empty
/// keys are rejected here even though the store itself accepts an empty
/// key: the wire protocol's header grammar requires a key token to be
/// present.
pub fn validate(key: &[u8]) -> Result<(), ProtoError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(ProtoError::InvalidKey);
    }
    if key
        .iter()
        .any(|&b| !(0x21..=0x7e).contains(&b))
    {
        return Err(ProtoError::InvalidKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_whitespace_and_oversize() {
        assert!(validate(b"foo bar").is_err());
        assert!(validate(&vec![b'a'; 251]).is_err());
        assert!(validate(b"").is_err());
    }

    #[test]
    fn accepts_printable_ascii() {
        assert!(validate(b"foo:bar-123").is_ok());
        assert!(validate(&vec![b'a'; 250]).is_ok());
    }
}
