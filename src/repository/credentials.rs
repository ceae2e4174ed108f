//! Credential strategies attached to outgoing Sheets API requests.
//!
//! Token acquisition (OAuth consent, service account key exchange) belongs to the
//! external auth layer; these types only carry the resulting bearer tokens.

use crate::model::AuthType;
use reqwest::RequestBuilder;
use std::fmt;

pub trait CredentialProvider: Send + Sync {
    fn auth_type(&self) -> AuthType;
    fn attach(&self, request: RequestBuilder) -> RequestBuilder;
}

/// Access token delegated by the signed-in user.
pub struct DelegatedToken {
    token: String,
}

impl DelegatedToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for DelegatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegatedToken")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CredentialProvider for DelegatedToken {
    fn auth_type(&self) -> AuthType {
        AuthType::User
    }

    fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.token)
    }
}

/// Application-owned identity. Documents must be shared with `email` out of band.
#[derive(Clone, Default)]
pub struct ServiceIdentity {
    email: Option<String>,
    token: Option<String>,
}

impl ServiceIdentity {
    pub fn new(email: Option<String>, token: Option<String>) -> Self {
        Self { email, token }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for ServiceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceIdentity")
            .field("email", &self.email)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CredentialProvider for ServiceIdentity {
    fn auth_type(&self) -> AuthType {
        AuthType::ServiceAccount
    }

    fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        // Without a token the API answers 401/403, which surfaces as PermissionDenied.
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}
