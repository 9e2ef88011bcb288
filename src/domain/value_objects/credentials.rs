use std::fmt;

/// How requests authenticate against the server.
///
/// Exactly one mode is resolved from configuration and handed to the transport; call sites
/// never look at raw username/token fields.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>` (personal or project access token)
    BearerToken(String),
    /// HTTP basic authentication
    BasicAuth { username: String, password: String },
}

impl Credentials {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::BearerToken(token.into())
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::BasicAuth {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value of the `Authorization` header for bearer mode; basic auth is applied by the
    /// HTTP client itself.
    pub fn bearer_header(&self) -> Option<String> {
        match self {
            Self::BearerToken(token) => Some(format!("Bearer {token}")),
            Self::BasicAuth { .. } => None,
        }
    }

    /// Username/secret pair for git over HTTPS.
    ///
    /// Bitbucket accepts an access token as the password for any user name, so the name
    /// offered by the remote URL is used when there is no configured one.
    pub fn git_user_pass<'a>(&'a self, username_from_url: Option<&'a str>) -> (&'a str, &'a str) {
        match self {
            Self::BearerToken(token) => (username_from_url.unwrap_or("x-token-auth"), token),
            Self::BasicAuth { username, password } => (username, password),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BearerToken(_) => f.debug_tuple("BearerToken").field(&"***").finish(),
            Self::BasicAuth { username, .. } => f
                .debug_struct("BasicAuth")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}
