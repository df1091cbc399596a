//! [`Command`] for updating a [`user::Role`].

use common::operations::{By, Select, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::{Role, Session};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for updating a [`user::Role`].
///
/// Already existing [`Session`]s keep the [`Role`] they were created with.
#[derive(Clone, Copy, Debug)]
pub struct UpdateUserRole {
    /// ID of the [`User`] which [`Role`] should be updated.
    pub user_id: user::Id,

    /// New [`Role`] of the [`User`].
    pub role: user::Role,
}

impl<Db, Clk> Command<UpdateUserRole> for Service<Db, Clk>
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
        cmd: UpdateUserRole,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let UpdateUserRole { user_id, role } = cmd;

        let mut user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(user_id))
            .map_err(tracerr::wrap!())?;
        if user.role == role {
            return Ok(user);
        }

        let previous = user.role;
        user.role = role;
        self.database()
            .execute(Update(user.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::info!(
            "`User(id: {user_id})` role changed from `{previous}` to `{role}`",
        );

        Ok(user)
    }
}

/// Error of [`UpdateUserRole`] [`Command`] execution.
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
        command::{self, Command as _},
        domain::user::{self, AllowedRoles, Role},
        testing,
    };

    use super::ExecutionError;

    #[tokio::test]
    async fn keeps_role_snapshot_of_existing_sessions() {
        let (svc, _, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        let updated = svc
            .execute(command::UpdateUserRole {
                user_id: user.id,
                role: Role::Admin,
            })
            .await
            .unwrap();
        assert_eq!(updated.role, Role::Admin);

        let validated = svc
            .execute(command::ValidateUserSession { token })
            .await
            .unwrap();
        assert_eq!(validated.role, Role::User);
        assert!(validated.authorize(AllowedRoles::ADMIN).is_err());

        let fresh = testing::login(&svc, &updated).await;
        let validated = svc
            .execute(command::ValidateUserSession { token: fresh })
            .await
            .unwrap();
        assert!(validated.authorize(AllowedRoles::ADMIN).is_ok());
    }

    #[tokio::test]
    async fn fails_for_unknown_user() {
        let (svc, _, _) = testing::service();
        let id = user::Id::new();

        let err = svc
            .execute(command::UpdateUserRole {
                user_id: id,
                role: Role::Manager,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::UserNotExists(u) if *u == id,
        ));
    }
}
