//! [`Command`] for creating a [`Session`].

use common::{
    operations::{By, Insert, Select},
    Clock,
};
use derive_more::{Display, Error, From};
use secrecy::{ExposeSecret as _, SecretBox};
use tracerr::Traced;
use tracing as log;

#[cfg(doc)]
use crate::domain::user::{session::Token, Password, Username};
use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for creating a [`Session`].
#[derive(Debug)]
pub enum CreateUserSession {
    /// Create a new [`Session`] for the already authenticated [`User`].
    ByUser {
        /// [`User`] to create a [`Session`] for.
        user: User,

        /// [`session::Client`] the [`Session`] is requested from.
        client: session::Client,
    },

    /// Create a new [`Session`] by [`User`] credentials.
    ByCredentials {
        /// [`Username`] of a [`User`].
        username: user::Username,

        /// [`Password`] of a [`User`].
        password: SecretBox<user::Password>,

        /// [`session::Client`] the [`Session`] is requested from.
        client: session::Client,
    },
}

impl CreateUserSession {
    /// Maximum number of [`Token`]s generated before giving up.
    const MAX_ATTEMPTS: usize = 3;

    /// Name of the unique constraint over [`Token`]s.
    const TOKEN_CONSTRAINT: &'static str = "sessions_pkey";
}

/// Output of [`CreateUserSession`] [`Command`].
#[derive(Clone, Debug)]
pub struct Output {
    /// [`Token`] of the created [`Session`].
    pub token: session::Token,

    /// [`User`] whose [`Session`] has been created.
    pub user: User,

    /// [`DateTime`] when the [`Session`] expires, unless it's used before.
    ///
    /// [`DateTime`]: common::DateTime
    pub expires_at: session::ExpirationDateTime,
}

impl<Db, Clk> Command<CreateUserSession> for Service<Db, Clk>
where
    Db: for<'l> Database<
            Select<By<Option<User>, &'l user::Username>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<Insert<Session>, Ok = (), Err = Traced<database::Error>>,
    Clk: Clock,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use CreateUserSession as Cmd;
        use ExecutionError as E;

        let (user, client) = match cmd {
            Cmd::ByUser { user, client } => {
                if !user.is_active {
                    return Err(tracerr::new!(E::UserInactive(user.id)));
                }
                (user, client)
            }
            Cmd::ByCredentials {
                username,
                password,
                client,
            } => {
                let user = self
                    .database()
                    .execute(Select(By::new(&username)))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))?;
                let matches = user
                    .as_ref()
                    .map_or_else(
                        || user::PasswordHash::dummy(),
                        |u| &u.password_hash,
                    )
                    .verify(password.expose_secret());
                let user = user.filter(|u| matches && u.is_active);
                let Some(user) = user else {
                    log::info!(
                        "rejected sign in of `{username}` from {}",
                        display_address(&client),
                    );
                    return Err(tracerr::new!(E::WrongCredentials));
                };
                (user, client)
            }
        };

        let now = self.now();
        let mut attempt = 1;
        let session = loop {
            let session = Session {
                token: session::Token::generate(),
                user_id: user.id,
                role: user.role,
                client: client.clone(),
                created_at: now.coerce(),
                last_activity: now.coerce(),
            };
            match self.database().execute(Insert(session.clone())).await {
                Ok(()) => break session,
                Err(e)
                    if e.as_ref()
                        .is_unique_violation(Some(Cmd::TOKEN_CONSTRAINT)) =>
                {
                    if attempt >= Cmd::MAX_ATTEMPTS {
                        return Err(tracerr::new!(E::TokenCollision));
                    }
                    log::warn!("`Token` collision on attempt {attempt}");
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).map_err(tracerr::map_from_and_wrap!(=> E));
                }
            }
        };

        log::info!(
            "`Session` created for `User(id: {}, role: {})` from {}",
            user.id,
            session.role,
            display_address(&session.client),
        );

        Ok(Output {
            expires_at: session.expires_at(self.config().session_timeout),
            token: session.token,
            user,
        })
    }
}

/// Formats the address of the provided [`session::Client`] for logging.
fn display_address(client: &session::Client) -> String {
    client
        .address
        .map_or_else(|| String::from("unknown address"), |a| a.to_string())
}

/// Error of [`CreateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// Every generated [`Token`] collided with an existing one.
    #[display("Failed to generate a unique `Token`")]
    TokenCollision,

    /// [`User`] is deactivated.
    #[display("`User(id: {_0})` is inactive")]
    #[from(ignore)]
    UserInactive(#[error(not(source))] user::Id),

    /// [`CreateUserSession::ByCredentials`] contains wrong credentials.
    #[display("Wrong `User` credentials")]
    WrongCredentials,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::Clock as _;

    use crate::{
        command::{self, Command as _},
        domain::user::{session, Role},
        testing,
    };

    use super::{CreateUserSession, ExecutionError};

    fn by_credentials(username: &str, password: &str) -> CreateUserSession {
        CreateUserSession::ByCredentials {
            username: username.parse().unwrap(),
            password: testing::password(password),
            client: session::Client {
                address: Some("10.0.0.7".parse().unwrap()),
                user_agent: session::UserAgent::new("Mozilla/5.0"),
            },
        }
    }

    #[tokio::test]
    async fn creates_session_by_credentials() {
        let (svc, db, clock) = testing::service();
        let user = testing::user(&svc, "manager", Role::Manager).await;
        let now = clock.now();

        let out = svc
            .execute(by_credentials("manager", testing::PASSWORD))
            .await
            .unwrap();

        assert_eq!(out.user.id, user.id);
        assert_eq!(
            out.expires_at.unix_timestamp(),
            (now + Duration::from_secs(3600)).unix_timestamp(),
        );

        let stored = testing::session(&db, &out.token).await.unwrap();
        assert_eq!(stored.user_id, user.id);
        assert_eq!(stored.role, Role::Manager);
        assert_eq!(stored.created_at.unix_timestamp(), now.unix_timestamp());
        assert_eq!(
            stored.last_activity.unix_timestamp(),
            now.unix_timestamp(),
        );
        assert_eq!(stored.client.address, Some("10.0.0.7".parse().unwrap()));
        assert_eq!(
            stored.client.user_agent.as_ref().map(AsRef::<str>::as_ref),
            Some("Mozilla/5.0"),
        );
    }

    #[tokio::test]
    async fn allows_concurrent_sessions() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "admin", Role::Admin).await;

        let first = testing::login(&svc, &user).await;
        let second = testing::login(&svc, &user).await;

        assert_ne!(first, second);
        assert_eq!(db.sessions_count(), 2);
    }

    #[tokio::test]
    async fn wrong_credentials_are_indistinguishable() {
        let (svc, db, _) = testing::service();
        drop(testing::user(&svc, "clerk", Role::User).await);
        drop(
            svc.execute(command::UpdateUserStatus {
                user_id: testing::user(&svc, "gone", Role::User).await.id,
                is_active: false,
            })
            .await
            .unwrap(),
        );

        for cmd in [
            by_credentials("clerk", "wrong password"),
            by_credentials("nobody", testing::PASSWORD),
            by_credentials("gone", testing::PASSWORD),
            by_credentials("Clerk", testing::PASSWORD),
        ] {
            let err = svc.execute(cmd).await.unwrap_err();
            assert!(matches!(err.as_ref(), ExecutionError::WrongCredentials));
        }
        assert_eq!(db.sessions_count(), 0);
    }

    #[tokio::test]
    async fn rejects_inactive_user() {
        let (svc, db, _) = testing::service();
        let mut user = testing::user(&svc, "clerk", Role::User).await;
        user.is_active = false;

        let err = svc
            .execute(CreateUserSession::ByUser {
                user,
                client: session::Client::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::UserInactive(_)));
        assert_eq!(db.sessions_count(), 0);
    }

    #[tokio::test]
    async fn fails_on_store_outage() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        db.set_available(false);

        let err = svc
            .execute(CreateUserSession::ByUser {
                user,
                client: session::Client::default(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::Db(_)));
    }
}
