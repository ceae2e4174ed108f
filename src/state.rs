use crate::config::ServerConfig;
use crate::errors::{ErrorKind, RepositoryError, ServiceError};
use crate::fixes::FixError;
use crate::model::AuthType;
use crate::repository::fallback::{never, on_permission_denied};
use crate::repository::{
    AccessPlan, DelegatedToken, GoogleSheetsConnector, Loaded, RateLimiter, RepositoryConnector,
    RetryPolicy, ServiceIdentity, Throttle,
};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct AppState {
    config: Arc<ServerConfig>,
    connector: Arc<dyn RepositoryConnector>,
    service_identity: Arc<ServiceIdentity>,
}

impl AppState {
    /// Wire the Google Sheets backend: one HTTP client and one throttle shared by every
    /// request.
    pub fn new(config: Arc<ServerConfig>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;

        let limiter = config
            .rate_limit
            .map(|(max_calls, window)| RateLimiter::new(max_calls, window));
        let retry = RetryPolicy {
            max_attempts: config.retry_max_attempts,
            base_delay: config.retry_base_delay,
            max_delay: config.retry_max_delay,
        };
        let throttle = Arc::new(Throttle::new(limiter, retry));
        let connector = GoogleSheetsConnector::new(client, &config.api_base_url, throttle)?;

        Ok(Self::new_with_connector(config, Arc::new(connector)))
    }

    pub fn new_with_connector(
        config: Arc<ServerConfig>,
        connector: Arc<dyn RepositoryConnector>,
    ) -> Self {
        let service_identity = Arc::new(ServiceIdentity::new(
            config.service_account_email.clone(),
            config.service_account_token.clone(),
        ));
        Self {
            config,
            connector,
            service_identity,
        }
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    /// Per-request view: the user's delegated token first when present, the service
    /// identity as fallback on permission errors.
    pub fn session(&self, user_token: Option<String>) -> Session {
        let user_token = user_token.filter(|token| !token.trim().is_empty());
        let has_user_credential = user_token.is_some();
        let service = self.connector.connect(self.service_identity.clone());

        let plan = match user_token {
            Some(token) => {
                let user = self.connector.connect(Arc::new(DelegatedToken::new(token)));
                AccessPlan::new(user, on_permission_denied).then(service, never)
            }
            None => AccessPlan::new(service, never),
        };

        Session {
            plan,
            has_user_credential,
            service_account_email: self.service_identity.email().map(str::to_string),
        }
    }
}

/// Credentials and repositories for one request. Nothing here outlives the request.
pub struct Session {
    plan: AccessPlan,
    has_user_credential: bool,
    service_account_email: Option<String>,
}

impl Session {
    pub fn has_user_credential(&self) -> bool {
        self.has_user_credential
    }

    pub fn credential_order(&self) -> Vec<AuthType> {
        self.plan.order()
    }

    pub async fn load(&self, document_id: &str) -> Result<Loaded, ServiceError> {
        self.plan
            .load(document_id)
            .await
            .map_err(|err| self.map_error(err))
    }

    pub fn map_error(&self, error: RepositoryError) -> ServiceError {
        ServiceError::from_repository(
            error,
            self.has_user_credential,
            self.service_account_email.as_deref(),
        )
    }

    pub fn map_fix_error(&self, error: FixError) -> ServiceError {
        match error {
            FixError::Repository(err) => self.map_error(err),
            err @ FixError::NotApplicable { .. } => {
                ServiceError::new(ErrorKind::InvalidInput, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CliArgs;
    use crate::repository::{MemoryConnector, MemoryStore};

    fn state() -> AppState {
        let config = Arc::new(ServerConfig::from_args(CliArgs::default()).unwrap());
        AppState::new_with_connector(
            config,
            Arc::new(MemoryConnector::new(Arc::new(MemoryStore::new()))),
        )
    }

    #[test]
    fn user_token_is_tried_before_service_identity() {
        let session = state().session(Some("ya29.user".to_string()));
        assert!(session.has_user_credential());
        assert_eq!(
            session.credential_order(),
            vec![AuthType::User, AuthType::ServiceAccount]
        );
    }

    #[test]
    fn blank_token_means_service_identity_only() {
        let session = state().session(Some("  ".to_string()));
        assert!(!session.has_user_credential());
        assert_eq!(session.credential_order(), vec![AuthType::ServiceAccount]);
    }
}
