use std::sync::Arc;

use tracing::{info, instrument, warn};

use super::{
    dto::{CreateUserRequest, Page, UpdateUserRequest},
    repo::UserRepository,
    repo_types::{User, UserFilter},
};
use crate::error::{RepoError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Request-level operations composed from [`UserRepository`] calls.
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &dyn UserRepository {
        self.repo.as_ref()
    }

    #[instrument(skip(self, req, password_hash), fields(email = %req.email))]
    pub async fn create(
        &self,
        req: CreateUserRequest,
        password_hash: String,
    ) -> Result<User, UserServiceError> {
        req.validate()?;
        let mut user = req.into_user(password_hash);
        self.repo.create(&mut user).await?;
        Ok(user)
    }

    /// Merges the present fields of `req` onto the live record, then writes it back.
    #[instrument(skip(self, req))]
    pub async fn update(&self, id: i64, req: UpdateUserRequest) -> Result<User, UserServiceError> {
        req.validate()?;
        let mut user = self.repo.get_by_id(id).await?;
        if req.is_empty() {
            info!(user_id = id, "empty update, nothing to write");
            return Ok(user);
        }
        req.apply_to(&mut user);
        if let Err(e) = self.repo.update(&mut user).await {
            warn!(error = %e, user_id = id, "update after fetch failed");
            return Err(e.into());
        }
        Ok(user)
    }

    /// One page plus the total, from the same filter. The two statements are
    /// not run in a shared snapshot.
    #[instrument(skip(self))]
    pub async fn list_page(&self, filter: UserFilter) -> Result<Page<User>, UserServiceError> {
        let items = self.repo.list(&filter).await?;
        let total = self.repo.count(&filter.unpaged()).await?;
        Ok(Page {
            items,
            total,
            limit: filter.limit.max(0),
            offset: filter.offset.max(0),
        })
    }
}
