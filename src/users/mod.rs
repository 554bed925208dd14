pub mod dto;
pub(crate) mod query;
pub mod repo;
pub mod repo_types;
pub mod services;

pub use dto::{CreateUserRequest, Page, UpdateUserRequest};
pub use repo::{PgUserRepository, UserRepository};
pub use repo_types::{User, UserFilter};
pub use services::{UserService, UserServiceError};
