//! Account service: registration, login and profile updates

use std::sync::Arc;

use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{NewUser, Role, UserChanges, UserProfile};
use validator::Validate;

use crate::auth::{SessionManager, TokenPair, hash_password, verify_password};
use crate::db::{Store, StoreError};
use crate::error::{ServiceError, ServiceResult, validation_error};
use crate::uploads::{UploadKind, UploadStorage};

const PASSWORD_MISMATCH: &str = "Password and confirm password do not match";

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long"))]
    pub name: String,
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 6, max = 100, message = "Password must be 6 to 100 characters long"))]
    pub password: String,
    #[validate(length(
        min = 6,
        max = 100,
        message = "Confirm Password must be 6 to 100 characters long"
    ))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 6, max = 100, message = "Password must be 6 to 100 characters long"))]
    pub password: String,
}

/// What to do with the profile photo
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PhotoUpdate {
    /// Leave the photo as it is
    #[default]
    Unspecified,
    /// Remove the photo
    Cleared,
    /// Use a newly stored file
    Replaced(String),
}

#[derive(Debug, Clone, Default, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 2, max = 100, message = "Name must be 2 to 100 characters long"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email"))]
    pub email: Option<String>,
    #[validate(length(min = 6, max = 100, message = "Password must be 6 to 100 characters long"))]
    pub password: Option<String>,
    #[validate(length(
        min = 6,
        max = 100,
        message = "Confirm Password must be 6 to 100 characters long"
    ))]
    pub confirm_password: Option<String>,
    pub photo: PhotoUpdate,
}

pub struct AccountService {
    store: Arc<dyn Store>,
    sessions: Arc<SessionManager>,
    uploads: Arc<UploadStorage>,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        uploads: Arc<UploadStorage>,
    ) -> Self {
        Self {
            store,
            sessions,
            uploads,
        }
    }

    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<UserProfile> {
        let mut req = req;
        req.email = normalize_email(&req.email);
        req.name = req.name.trim().to_string();
        check(&req, req.password != req.confirm_password)?;

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_email(&req.email).await?.is_some() {
            return Err(email_taken().into());
        }

        let password_hash = hash(&req.password)?;
        let user = tx
            .insert_user(NewUser {
                name: req.name,
                email: req.email,
                password_hash,
                photo: None,
                role: Role::Customer,
            })
            .await
            .map_err(unique_email)?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user.profile())
    }

    /// Check credentials and open a session
    pub async fn login(&self, req: LoginRequest) -> ServiceResult<(UserProfile, TokenPair)> {
        let mut req = req;
        req.email = normalize_email(&req.email);
        check(&req, false)?;

        let mut tx = self.store.begin().await?;
        let Some(user) = tx.find_user_by_email(&req.email).await? else {
            return Err(AppError::invalid_credentials().into());
        };
        if !verify_password(&req.password, &user.password_hash) {
            return Err(AppError::invalid_credentials().into());
        }

        let profile = user.profile();
        let pair = self.sessions.issue_in(tx.as_mut(), &profile).await?;
        tx.commit().await?;

        tracing::info!(user_id = profile.id, "User logged in");
        Ok((profile, pair))
    }

    /// Apply a partial profile update
    ///
    /// The previous photo file is deleted after commit when the photo is
    /// cleared or replaced.
    pub async fn update_profile(
        &self,
        user_id: i64,
        update: ProfileUpdate,
    ) -> ServiceResult<UserProfile> {
        let mut update = update;
        update.email = update.email.as_deref().map(normalize_email);
        update.name = update.name.map(|n| n.trim().to_string());
        check(&update, update.password != update.confirm_password)?;

        let mut tx = self.store.begin().await?;
        let Some(existing) = tx.find_user_by_id(user_id).await? else {
            return Err(AppError::new(ErrorCode::UserNotFound).into());
        };

        if let Some(email) = update.email.as_deref()
            && email != existing.email
            && let Some(other) = tx.find_user_by_email(email).await?
            && other.id != user_id
        {
            return Err(email_taken().into());
        }

        let password_hash = update.password.as_deref().map(hash).transpose()?;
        let (photo, stale_photo) = match update.photo {
            PhotoUpdate::Unspecified => (None, None),
            PhotoUpdate::Cleared => (Some(None), existing.photo.clone()),
            PhotoUpdate::Replaced(name) => {
                let stale = existing.photo.clone().filter(|old| *old != name);
                (Some(Some(name)), stale)
            }
        };

        let user = tx
            .update_user(
                user_id,
                UserChanges {
                    name: update.name,
                    email: update.email,
                    password_hash,
                    photo,
                },
            )
            .await
            .map_err(unique_email)?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;
        tx.commit().await?;

        if let Some(old) = stale_photo {
            self.uploads.remove(UploadKind::Profile, &old).await;
        }

        tracing::info!(user_id, "Profile updated");
        Ok(user.profile())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Run derive validation and report a password mismatch on `confirmPassword`
fn check<T: Validate>(input: &T, passwords_differ: bool) -> Result<(), AppError> {
    let mut err = input.validate().err().map(|e| validation_error(&e));
    if passwords_differ {
        let base = err.unwrap_or_else(|| AppError::validation(PASSWORD_MISMATCH));
        err = Some(base.with_field_error("confirmPassword", PASSWORD_MISMATCH));
    }
    err.map_or(Ok(()), Err)
}

fn hash(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        AppError::internal("Failed to hash password")
    })
}

fn email_taken() -> AppError {
    AppError::conflict(ErrorCode::EmailAlreadyExists, "Email already exists")
        .with_field_error("email", "Email already exists")
}

/// A concurrent insert can still hit the unique index
fn unique_email(e: StoreError) -> ServiceError {
    match e {
        StoreError::UniqueViolation(_) => email_taken().into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, email: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    #[test]
    fn mismatched_passwords_reported_on_confirm_field() {
        let req = register("Jane", "jane@example.com", "secret1", "secret2");
        let err = check(&req, req.password != req.confirm_password).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert_eq!(err.message, PASSWORD_MISMATCH);
        assert!(err.errors.unwrap().contains_key("confirmPassword"));
    }

    #[test]
    fn field_rules_apply() {
        let req = register("J", "not-an-email", "123", "123");
        let err = check(&req, false).unwrap_err();
        let fields = err.errors.unwrap();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("confirmPassword"));
    }

    #[test]
    fn empty_profile_update_is_valid() {
        let update = ProfileUpdate::default();
        assert!(check(&update, update.password != update.confirm_password).is_ok());
    }

    #[test]
    fn profile_password_requires_confirmation() {
        let update = ProfileUpdate {
            password: Some("newpass".into()),
            ..Default::default()
        };
        let err = check(&update, update.password != update.confirm_password).unwrap_err();
        assert!(err.errors.unwrap().contains_key("confirmPassword"));
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Jane@Example.COM "), "jane@example.com");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let err: AppError = unique_email(StoreError::UniqueViolation("users_email_key".into())).into();
        assert_eq!(err.code, ErrorCode::EmailAlreadyExists);
        assert_eq!(err.http_status(), http::StatusCode::CONFLICT);
    }
}
