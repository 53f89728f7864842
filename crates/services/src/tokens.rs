use chrono::{Duration, Utc};
use domains::{IssuedToken, Token, TokenCodec, TokenScope};

/// Mints a token for `user_id`. The plaintext lives only in the returned value.
pub(crate) fn issue(
    codec: &dyn TokenCodec,
    user_id: i64,
    ttl: Duration,
    scope: TokenScope,
) -> IssuedToken {
    let plaintext = codec.generate();
    let hash = codec.digest(&plaintext);
    IssuedToken {
        plaintext,
        token: Token {
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        },
    }
}
