//! [`Command`] definition.

pub mod create_user;
pub mod create_user_session;
pub mod destroy_user_session;
pub mod update_user_role;
pub mod update_user_status;
pub mod validate_user_session;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    create_user::CreateUser, create_user_session::CreateUserSession,
    destroy_user_session::DestroyUserSession, update_user_role::UpdateUserRole,
    update_user_status::UpdateUserStatus,
    validate_user_session::ValidateUserSession,
};
