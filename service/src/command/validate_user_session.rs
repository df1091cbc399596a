//! [`Command`] for validating a [`Session`].

use common::{
    operations::{By, Delete, Select, Update},
    Clock,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for validating a [`Session`] by its [`session::Token`].
///
/// Every successful validation slides the [`Session`] expiration, while an
/// expired [`Session`] is deleted once it's looked up.
#[derive(Clone, Debug, From)]
pub struct ValidateUserSession {
    /// [`session::Token`] of the [`Session`] to validate.
    pub token: session::Token,
}

impl<Db, Clk> Command<ValidateUserSession> for Service<Db, Clk>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::Token>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Update<session::Touch>,
            Ok = (),
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Delete<By<Session, &'l session::Token>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    Clk: Clock,
{
    type Ok = session::Validated;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ValidateUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ValidateUserSession { token } = cmd;
        let timeout = self.config().session_timeout;

        self.validate_session(&token, timeout).await.map_err(|e| {
            if let E::Db(err) = e.as_ref() {
                log::error!("failed to validate `Session`: {err}");
            }
            e
        })
    }
}

impl<Db, Clk> Service<Db, Clk>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::Token>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Update<session::Touch>,
            Ok = (),
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Delete<By<Session, &'l session::Token>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
    Clk: Clock,
{
    /// Performs the [`ValidateUserSession`] steps.
    async fn validate_session(
        &self,
        token: &session::Token,
        timeout: std::time::Duration,
    ) -> Result<session::Validated, Traced<ExecutionError>> {
        use ExecutionError as E;

        let session = self
            .database()
            .execute(Select(By::<Option<Session>, _>::new(token)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::Unauthenticated)
            .map_err(tracerr::wrap!())?;

        let user = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(session.user_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !user.is_some_and(|u| u.is_active) {
            log::debug!(
                "`Session` of inactive `User(id: {})` is rejected",
                session.user_id,
            );
            return Err(tracerr::new!(E::Unauthenticated));
        }

        let now = self.now();
        if session.is_expired(now, timeout) {
            self.database()
                .execute(Delete(By::<Session, _>::new(token)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            log::info!(
                "expired `Session` of `User(id: {})` is removed",
                session.user_id,
            );
            return Err(tracerr::new!(E::Unauthenticated));
        }

        let last_activity = now.coerce();
        self.database()
            .execute(Update(session::Touch {
                token: token.clone(),
                at: last_activity,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let Session {
            token,
            user_id,
            role,
            created_at,
            ..
        } = session;
        Ok(session::Validated {
            token,
            user_id,
            role,
            created_at,
            last_activity,
            expires_at: (last_activity + timeout).coerce(),
        })
    }
}

/// Error of [`ValidateUserSession`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    Db(database::Error),

    /// [`Session`] is unknown, expired or belongs to an inactive [`User`].
    #[display("`Session` is not valid")]
    Unauthenticated,
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::Clock as _;

    use crate::{
        command::{self, Command as _},
        domain::user::{session, AllowedRoles, Role},
        testing,
    };

    use super::{ExecutionError, ValidateUserSession};

    fn is_unauthenticated<T>(
        res: &Result<T, tracerr::Traced<ExecutionError>>,
    ) -> bool {
        matches!(
            res.as_ref().map_err(|e| -> &ExecutionError { e.as_ref() }),
            Err(ExecutionError::Unauthenticated),
        )
    }

    #[tokio::test]
    async fn slides_expiration_on_each_validation() {
        let (svc, db, clock) = testing::service();
        let user = testing::user(&svc, "manager", Role::Manager).await;
        let token = testing::login(&svc, &user).await;

        clock.advance(Duration::from_secs(3000));
        let validated = svc
            .execute(ValidateUserSession {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(
            validated.last_activity.unix_timestamp(),
            clock.now().unix_timestamp(),
        );
        assert_eq!(
            validated.expires_at.unix_timestamp(),
            (clock.now() + Duration::from_secs(3600)).unix_timestamp(),
        );

        clock.advance(Duration::from_secs(3000));
        assert!(svc
            .execute(ValidateUserSession {
                token: token.clone(),
            })
            .await
            .is_ok());

        let stored = testing::session(&db, &token).await.unwrap();
        assert_eq!(
            stored.last_activity.unix_timestamp(),
            clock.now().unix_timestamp(),
        );
    }

    #[tokio::test]
    async fn manager_is_gated_by_allowed_roles() {
        let (svc, _, _) = testing::service();
        let user = testing::user(&svc, "manager", Role::Manager).await;
        let token = testing::login(&svc, &user).await;

        let validated = svc
            .execute(ValidateUserSession { token })
            .await
            .unwrap();

        assert_eq!(validated.user_id, user.id);
        assert_eq!(validated.role, Role::Manager);
        assert!(validated
            .authorize(AllowedRoles::new([Role::Admin, Role::Manager]).unwrap())
            .is_ok());
        let denied = validated
            .authorize(AllowedRoles::new([Role::Admin]).unwrap())
            .unwrap_err();
        assert_eq!(denied.role, Role::Manager);
    }

    #[tokio::test]
    async fn idle_session_expires_and_is_removed() {
        let (svc, db, clock) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        clock.advance(Duration::from_secs(3601));
        let res = svc
            .execute(ValidateUserSession {
                token: token.clone(),
            })
            .await;

        assert!(is_unauthenticated(&res));
        assert!(testing::session(&db, &token).await.is_none());

        let res = svc.execute(ValidateUserSession { token }).await;
        assert!(is_unauthenticated(&res));
    }

    #[tokio::test]
    async fn session_is_valid_at_exact_timeout() {
        let (svc, _, clock) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        clock.advance(Duration::from_secs(3600));

        assert!(svc.execute(ValidateUserSession { token }).await.is_ok());
    }

    #[tokio::test]
    async fn logout_invalidates_token() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "admin", Role::Admin).await;
        let token = testing::login(&svc, &user).await;
        let other = testing::login(&svc, &user).await;

        svc.execute(command::DestroyUserSession {
            token: token.clone(),
        })
        .await
        .unwrap();

        let res = svc.execute(ValidateUserSession { token }).await;
        assert!(is_unauthenticated(&res));
        assert!(testing::session(&db, &other).await.is_some());
        assert!(svc
            .execute(ValidateUserSession { token: other })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let (svc, _, _) = testing::service();

        let res = svc
            .execute(ValidateUserSession {
                token: session::Token::generate(),
            })
            .await;

        assert!(is_unauthenticated(&res));
    }

    #[tokio::test]
    async fn store_outage_is_not_unauthenticated() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;
        db.set_available(false);

        let err = svc
            .execute(ValidateUserSession {
                token: token.clone(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::Db(_)));

        db.set_available(true);
        assert!(svc.execute(ValidateUserSession { token }).await.is_ok());
    }

    #[tokio::test]
    async fn huge_timeout_saturates_expiration() {
        let (svc, _, clock) = testing::service_with_timeout(
            Duration::from_secs(300_000 * 365 * 24 * 60 * 60),
        );
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        clock.advance(Duration::from_secs(60));
        let validated = svc
            .execute(ValidateUserSession { token })
            .await
            .unwrap();

        assert_eq!(validated.expires_at, session::ExpirationDateTime::MAX);
    }
}
