use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::repo_types::User;
use crate::error::ValidationError;

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Request body for creating a user.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub phone: String,
    pub full_name: String,
    pub password: String,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError { field: "email", message: "is required" });
        }
        if !is_valid_email(self.email.trim()) {
            return Err(ValidationError { field: "email", message: "must be a valid email" });
        }
        if self.phone.trim().is_empty() {
            return Err(ValidationError { field: "phone", message: "is required" });
        }
        if self.full_name.trim().is_empty() {
            return Err(ValidationError { field: "full_name", message: "is required" });
        }
        if self.password.chars().count() < 8 {
            return Err(ValidationError {
                field: "password",
                message: "must be at least 8 characters",
            });
        }
        Ok(())
    }

    /// Maps onto a new, unsaved [`User`]. Hashing `password` is the caller's job.
    pub fn into_user(self, password_hash: impl Into<String>) -> User {
        User::new(
            self.email.trim().to_lowercase(),
            self.phone.trim(),
            self.full_name.trim(),
            password_hash,
        )
    }
}

/// Partial update: `None` leaves the stored value unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
    pub is_verified: Option<bool>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(email) = &self.email {
            if !is_valid_email(email.trim()) {
                return Err(ValidationError { field: "email", message: "must be a valid email" });
            }
        }
        if self.phone.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(ValidationError { field: "phone", message: "must not be empty" });
        }
        if self.full_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ValidationError { field: "full_name", message: "must not be empty" });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.phone.is_none()
            && self.full_name.is_none()
            && self.is_active.is_none()
            && self.is_verified.is_none()
    }

    pub fn apply_to(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email.trim().to_lowercase();
        }
        if let Some(phone) = self.phone {
            user.phone = phone.trim().to_string();
        }
        if let Some(name) = self.full_name {
            user.full_name = name.trim().to_string();
        }
        if let Some(active) = self.is_active {
            user.is_active = active;
        }
        if let Some(verified) = self.is_verified {
            user.is_verified = verified;
        }
    }
}

/// One page of a listing together with the total match count.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
