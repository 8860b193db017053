use crate::clock::Clock;
use crate::config::MagicLinkConfig;
use crate::crypto::{generate_token, get_token_hash};
use crate::models::{MagicLink, NewMagicLink, User};
use crate::repositories::{magic_link_repository::MagicLinkRepository, RepositoryError};
use crate::services::email_service::{render_magic_link_email, EmailError, EmailService};
use crate::services::user_service::{UserService, UserServiceError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum MagicLinkError {
    /// Unknown, expired and already-used tokens are indistinguishable.
    #[error("This magic link is invalid or has expired.")]
    InvalidOrExpiredToken,
    #[error("Magic link expiry is out of range")]
    ExpiryOutOfRange,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    UserService(#[from] UserServiceError),
    #[error(transparent)]
    Email(#[from] EmailError),
}

/// Issues and redeems single-use sign-in links.
///
/// Issuing (`request`) and delivery (`send`) are separate calls so callers
/// pick the channel and timing. Redemption (`authenticate`) consumes the
/// record; the store decides the winner when the same token is presented
/// twice at once.
pub struct MagicLinkService {
    config: MagicLinkConfig,
    repository: Arc<dyn MagicLinkRepository>,
    user_service: Arc<UserService>,
    email_service: Arc<dyn EmailService>,
    clock: Arc<dyn Clock>,
}

impl MagicLinkService {
    pub fn new(
        config: MagicLinkConfig,
        repository: Arc<dyn MagicLinkRepository>,
        user_service: Arc<UserService>,
        email_service: Arc<dyn EmailService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            repository,
            user_service,
            email_service,
            clock,
        }
    }

    pub fn config(&self) -> &MagicLinkConfig {
        &self.config
    }

    /// Stores a new link for `email` and returns it with the raw token.
    pub async fn request(&self, email: &str) -> Result<(MagicLink, String), MagicLinkError> {
        let user = self.user_service.find_user_by_email(email).await?;

        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.config.ttl)
            .filter(|expires_at| *expires_at > now)
            .ok_or(MagicLinkError::ExpiryOutOfRange)?;

        let (token, token_hash) = generate_token(&self.config.secret);
        let new_link = NewMagicLink {
            token_hash,
            user_email: email.to_string(),
            user_id: user.map(|u| u.id),
            expires_at,
            created_at: now,
        };

        let magic_link = self.repository.create(&new_link).await?;
        tracing::info!(
            magic_link_id = %magic_link.id,
            user_email = %magic_link.user_email,
            known_user = magic_link.user_id.is_some(),
            "Issued magic link"
        );

        Ok((magic_link, token))
    }

    /// Emails the sign-in URL for `magic_link` to its address.
    pub async fn send(&self, magic_link: &MagicLink, token: &str) -> Result<(), MagicLinkError> {
        let url = self.authenticate_url(token);
        let (subject, body) =
            render_magic_link_email(&url, self.config.token_lifetime_minutes())?;

        self.email_service
            .send_to_user(&magic_link.user_email, &subject, &body)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    magic_link_id = %magic_link.id,
                    "Failed to send magic link email: {}",
                    e
                )
            })?;

        Ok(())
    }

    /// Exchanges a raw token for the user it signs in.
    pub async fn authenticate(&self, token: &str) -> Result<User, MagicLinkError> {
        let token_hash = get_token_hash(token, &self.config.secret);
        let magic_link = self
            .repository
            .find_valid_by_token_hash(&token_hash, self.clock.now())
            .await?
            .ok_or(MagicLinkError::InvalidOrExpiredToken)?;

        let linked_user = match magic_link.user_id {
            Some(user_id) => self.user_service.find_user_by_id(user_id).await?,
            None => None,
        };
        let mut user = match linked_user {
            Some(user) => user,
            None => {
                self.user_service
                    .signup_by_email(&magic_link.user_email)
                    .await?
            }
        };

        // Before the delete, so a failed update leaves the link usable.
        if !user.email_verified {
            self.user_service.verify_user_email(user.id).await?;
            user.email_verified = true;
        }

        if !self.repository.delete(&magic_link.id).await? {
            tracing::warn!(
                magic_link_id = %magic_link.id,
                "Magic link consumed by a concurrent request"
            );
            return Err(MagicLinkError::InvalidOrExpiredToken);
        }

        tracing::info!(
            magic_link_id = %magic_link.id,
            user_id = user.id,
            "Authenticated user with magic link"
        );

        Ok(user)
    }

    /// Removes links whose expiry has passed. Returns how many were deleted.
    pub async fn purge_expired(&self) -> Result<u64, MagicLinkError> {
        let removed = self.repository.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!(removed, "Purged expired magic links");
        }
        Ok(removed)
    }

    pub fn authenticate_url(&self, token: &str) -> String {
        format!(
            "{}/magic-link/authenticate?token={}",
            self.config.base_url,
            urlencoding::encode(token)
        )
    }
}
