/// Messages the core asks the mailer to deliver.
///
/// The mailer owns rendering and transport; the core never waits on delivery.
#[derive(Clone, PartialEq)]
pub enum Mail {
    /// Sent after registration, carrying the one-time activation token.
    Welcome {
        user_id: i64,
        username: String,
        activation_token: String,
    },
}

impl Mail {
    pub fn kind(&self) -> &'static str {
        match self {
            Mail::Welcome { .. } => "welcome",
        }
    }
}

impl std::fmt::Debug for Mail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mail::Welcome {
                user_id, username, ..
            } => f
                .debug_struct("Welcome")
                .field("user_id", user_id)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}
