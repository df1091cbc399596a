//! [`Command`] for creating a new [`User`].

use common::{
    operations::{By, Insert, Select},
    Clock,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret, SecretBox};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::{Email, Name, Password, Role, Username};
use crate::{
    domain::{user, User},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`User`].
#[derive(Debug)]
pub struct CreateUser {
    /// [`Username`] of a new [`User`].
    pub username: user::Username,

    /// [`Password`] of a new [`User`].
    pub password: SecretBox<user::Password>,

    /// [`Role`] of a new [`User`].
    pub role: user::Role,

    /// Full [`Name`] of a new [`User`].
    pub full_name: Option<user::Name>,

    /// [`Email`] of a new [`User`].
    pub email: Option<user::Email>,
}

impl CreateUser {
    /// Name of the unique constraint over [`Username`]s.
    const USERNAME_CONSTRAINT: &'static str = "users_username_key";
}

impl<Db, Clk> Command<CreateUser> for Service<Db, Clk>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Username>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Insert<User>, Ok = (), Err = Traced<database::Error>>,
    Clk: Clock,
{
    type Ok = User;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: CreateUser) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateUser {
            username,
            password,
            role,
            full_name,
            email,
        } = cmd;

        let u = self
            .database()
            .execute(Select(By::new(&username)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if u.is_some() {
            return Err(tracerr::new!(E::UsernameOccupied(username)));
        }

        let user = User {
            id: user::Id::new(),
            username,
            full_name,
            email,
            password_hash: user::PasswordHash::new(password.expose_secret()),
            role,
            is_active: true,
            created_at: self.now().coerce(),
        };

        // Concurrent creation may still take the `Username` first.
        let res = self.database().execute(Insert(user.clone())).await;
        if res.as_ref().is_err_and(|e| {
            e.as_ref()
                .is_unique_violation(Some(CreateUser::USERNAME_CONSTRAINT))
        }) {
            return Err(tracerr::new!(E::UsernameOccupied(user.username)));
        }
        res.map_err(tracerr::map_from_and_wrap!(=> E))?;

        log::info!(
            "`User(id: {}, username: {})` created with `{}` role",
            user.id,
            user.username,
            user.role,
        );

        Ok(user)
    }
}

/// Error of [`CreateUser`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Username`] is already occupied.
    #[display("`{_0}` username is occupied")]
    #[from(ignore)]
    UsernameOccupied(#[error(not(source))] user::Username),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{self, Command as _},
        domain::user::Role,
        testing,
    };

    use super::ExecutionError;

    #[tokio::test]
    async fn creates_active_user_with_hashed_password() {
        let (svc, _, _) = testing::service();

        let user = testing::user(&svc, "hr.manager", Role::Manager).await;

        assert!(user.is_active);
        assert_eq!(user.role, Role::Manager);
        assert_eq!(AsRef::<str>::as_ref(&user.username), "hr.manager");
        assert!(user
            .password_hash
            .verify(&testing::PASSWORD.parse().unwrap()));
    }

    #[tokio::test]
    async fn rejects_occupied_username() {
        let (svc, _, _) = testing::service();
        drop(testing::user(&svc, "admin", Role::Admin).await);

        let err = svc
            .execute(command::CreateUser {
                username: "admin".parse().unwrap(),
                password: testing::password("other"),
                role: Role::User,
                full_name: None,
                email: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            ExecutionError::UsernameOccupied(u)
                if AsRef::<str>::as_ref(u) == "admin",
        ));
    }
}
