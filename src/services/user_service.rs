use crate::models::user::User;
use crate::repositories::{user_repository::UserRepository, RepositoryError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

/// Directory of registered users.
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Creates a user for an address that has not been seen before.
    pub async fn create_user(
        &self,
        email: &str,
        email_verified: bool,
    ) -> Result<User, UserServiceError> {
        let email = normalize_email(email)?;

        match self.repository.create_user(&email, email_verified).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    /// Returns the user owning `email`, creating a verified one if none exists.
    ///
    /// A concurrent signup for the same address surfaces as a unique
    /// violation; the row that won is returned instead.
    pub async fn signup_by_email(&self, email: &str) -> Result<User, UserServiceError> {
        if let Some(user) = self.repository.find_by_email(email).await? {
            return Ok(user);
        }

        match self.repository.create_user(email, true).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, "Signed up new user by email");
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists) => self
                .repository
                .find_by_email(email)
                .await?
                .ok_or(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.verify_email(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }
}

/// Trims surrounding whitespace and applies a minimal syntax check.
pub fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(UserServiceError::InvalidEmail);
    };

    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || email.len() > 255
        || email.chars().any(char::is_whitespace)
    {
        return Err(UserServiceError::InvalidEmail);
    }

    Ok(email.to_string())
}
