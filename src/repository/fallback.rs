use super::SpreadsheetRepository;
use crate::errors::RepositoryError;
use crate::model::{AuthType, RawDocument};
use std::sync::Arc;

/// Decides whether a failed attempt lets the next one run.
pub type FallThrough = fn(&RepositoryError) -> bool;

struct Attempt {
    repository: Arc<dyn SpreadsheetRepository>,
    fall_through: FallThrough,
}

/// Ordered credential attempts for reads. The first success wins; when every attempt
/// fails, the primary attempt's error is returned because it describes the credential
/// the user actually chose.
pub struct AccessPlan {
    primary: Attempt,
    fallbacks: Vec<Attempt>,
}

/// A loaded document together with the repository that could read it. Follow-up writes
/// go through the same repository.
pub struct Loaded {
    pub document: RawDocument,
    pub repository: Arc<dyn SpreadsheetRepository>,
}

impl AccessPlan {
    pub fn new(primary: Arc<dyn SpreadsheetRepository>, fall_through: FallThrough) -> Self {
        Self {
            primary: Attempt {
                repository: primary,
                fall_through,
            },
            fallbacks: Vec::new(),
        }
    }

    pub fn then(mut self, repository: Arc<dyn SpreadsheetRepository>, fall_through: FallThrough) -> Self {
        self.fallbacks.push(Attempt {
            repository,
            fall_through,
        });
        self
    }

    /// Credential order, primary first.
    pub fn order(&self) -> Vec<AuthType> {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .map(|attempt| attempt.repository.auth_type())
            .collect()
    }

    pub fn primary(&self) -> &Arc<dyn SpreadsheetRepository> {
        &self.primary.repository
    }

    pub async fn load(&self, document_id: &str) -> Result<Loaded, RepositoryError> {
        let primary_error = match self.primary.repository.load(document_id).await {
            Ok(document) => {
                return Ok(Loaded {
                    document,
                    repository: self.primary.repository.clone(),
                });
            }
            Err(err) => err,
        };

        let mut carry_on = (self.primary.fall_through)(&primary_error);
        for attempt in &self.fallbacks {
            if !carry_on {
                break;
            }
            tracing::warn!(
                document_id,
                from = %self.primary.repository.auth_type(),
                to = %attempt.repository.auth_type(),
                error = %primary_error,
                "retrying spreadsheet read with fallback credential"
            );
            match attempt.repository.load(document_id).await {
                Ok(document) => {
                    return Ok(Loaded {
                        document,
                        repository: attempt.repository.clone(),
                    });
                }
                Err(err) => {
                    tracing::debug!(document_id, error = %err, "fallback credential failed");
                    carry_on = (attempt.fall_through)(&err);
                }
            }
        }

        Err(primary_error)
    }
}

pub fn on_permission_denied(error: &RepositoryError) -> bool {
    error.is_permission_denied()
}

pub fn never(_: &RepositoryError) -> bool {
    false
}
