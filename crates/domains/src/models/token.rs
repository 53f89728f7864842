use std::fmt;

use chrono::{DateTime, Utc};

use crate::validation::ValidationErrors;

/// Length of a base64url-encoded 128-bit token.
pub const TOKEN_PLAINTEXT_LEN: usize = 22;

/// What a token may be used for. A token never crosses scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Activation,
    Authentication,
}

impl TokenScope {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
        }
    }
}

/// The server-side record of a token. Only the digest is ever stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub hash: Vec<u8>,
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    pub scope: TokenScope,
}

impl Token {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// A freshly minted token: the stored record plus the one-time plaintext.
pub struct IssuedToken {
    pub plaintext: String,
    pub token: Token,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("plaintext", &"[redacted]")
            .field("token", &self.token)
            .finish()
    }
}

pub fn validate_token_plaintext(v: &mut ValidationErrors, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 22 bytes long",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_plaintext() {
        let issued = IssuedToken {
            plaintext: "Y3Jvc3Nfc2NvcGVfdG9rZW4".into(),
            token: Token {
                hash: vec![1, 2, 3],
                user_id: 7,
                expiry: Utc::now(),
                scope: TokenScope::Authentication,
            },
        };
        let printed = format!("{issued:?}");
        assert!(!printed.contains("Y3Jvc3Nfc2NvcGVfdG9rZW4"));
        assert!(printed.contains("[redacted]"));
    }

    #[test]
    fn token_length_is_checked() {
        let mut v = ValidationErrors::new();
        validate_token_plaintext(&mut v, "short");
        assert_eq!(v.get("token"), Some("must be 22 bytes long"));
    }
}
