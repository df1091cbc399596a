//! [`Command`] for activating or deactivating a [`User`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::Session;
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for activating or deactivating a [`User`].
///
/// Deactivated [`User`]s cannot sign in, and their [`Session`]s stop passing
/// validation.
#[derive(Clone, Copy, Debug)]
pub struct UpdateUserStatus {
    /// ID of the [`User`] which status should be updated.
    pub user_id: user::Id,

    /// Indicator whether the [`User`] should be active.
    pub is_active: bool,
}

impl<Db, Clk> Command<UpdateUserStatus> for Service<Db, Clk>
where
    Db: Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Update<User>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: UpdateUserStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUserStatus { user_id, is_active } = cmd;

        let mut user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;
        if user.is_active == is_active {
            return Ok(user);
        }

        user.is_active = is_active;
        self.database()
            .execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if is_active {
            log::info!("`User(id: {user_id})` activated");
        } else {
            log::info!("`User(id: {user_id})` deactivated");
        }

        Ok(user)
    }
}

/// Error of [`UpdateUserStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`User`] doesn't exist.
    #[display("`User(id: {_0})` does not exist")]
    #[from(ignore)]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{self, validate_user_session, Command as _},
        domain::user::Role,
        testing,
    };

    #[tokio::test]
    async fn deactivation_invalidates_sessions_and_keeps_rows() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        let updated = svc
            .execute(command::UpdateUserStatus {
                user_id: user.id,
                is_active: false,
            })
            .await
            .unwrap();
        assert!(!updated.is_active);

        let err = svc
            .execute(command::ValidateUserSession {
                token: token.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            validate_user_session::ExecutionError::Unauthenticated,
        ));
        assert!(testing::session(&db, &token).await.is_some());

        drop(
            svc.execute(command::UpdateUserStatus {
                user_id: user.id,
                is_active: true,
            })
            .await
            .unwrap(),
        );
        assert!(svc
            .execute(command::ValidateUserSession { token })
            .await
            .is_ok());
    }
}
