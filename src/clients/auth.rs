use std::fmt;

/// Caller credential forwarded to the record source and the execution engine.
///
/// The token is opaque to the core; `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken([MASKED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_masked_in_debug_output() {
        let token = BearerToken::new("secret-value");
        assert_eq!(format!("{token:?}"), "BearerToken([MASKED])");
        assert_eq!(token.header_value(), "Bearer secret-value");
    }
}
