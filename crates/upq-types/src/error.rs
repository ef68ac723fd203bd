//! Error types for identifier and flag parsing

/// Errors while parsing a serialized [`UpdateFlagSet`](crate::UpdateFlagSet)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagParseError {
    /// Token is not part of the flag vocabulary
    #[error("unknown update flag token: '{0}'")]
    UnknownToken(String),
}

/// Errors while parsing chunk/plot identifiers from their textual forms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    /// Not a valid lowercase/uppercase hex number in `u32` range
    #[error("invalid hex id: '{0}'")]
    InvalidHex(String),

    /// Not a valid decimal number in `u32` range
    #[error("invalid decimal id: '{0}'")]
    InvalidDecimal(String),

    /// Canonical chunk key without the `<level>_` prefix
    #[error("chunk key missing level tag: '{0}'")]
    MissingLevelTag(String),

    /// Level tag is empty or contains a separator/whitespace
    #[error("invalid level tag: '{0}'")]
    InvalidLevelTag(String),
}

impl IdParseError {
    /// Create invalid hex error
    pub fn invalid_hex(text: impl Into<String>) -> Self {
        Self::InvalidHex(text.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parse_error_display() {
        let err = FlagParseError::UnknownToken("zzz".to_string());
        assert_eq!(err.to_string(), "unknown update flag token: 'zzz'");
    }

    #[test]
    fn id_parse_error_display() {
        let err = IdParseError::invalid_hex("xyz");
        assert_eq!(err.to_string(), "invalid hex id: 'xyz'");
    }
}
