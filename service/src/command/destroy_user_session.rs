//! [`Command`] for destroying a [`Session`].

use std::convert::Infallible;

use common::operations::{By, Delete, Select};
use derive_more::From;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::user::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for destroying a [`Session`] (signing out).
///
/// Never fails: unknown [`session::Token`]s and [`Database`] failures are
/// only logged.
#[derive(Clone, Debug, From)]
pub struct DestroyUserSession {
    /// [`session::Token`] of the [`Session`] to destroy.
    pub token: session::Token,
}

impl<Db, Clk> Command<DestroyUserSession> for Service<Db, Clk>
where
    Db: for<'l> Database<
            Select<By<Option<Session>, &'l session::Token>>,
            Ok = Option<Session>,
            Err = Traced<database::Error>,
        > + for<'l> Database<
            Delete<By<Session, &'l session::Token>>,
            Ok = (),
            Err = Traced<database::Error>,
        >,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        cmd: DestroyUserSession,
    ) -> Result<Self::Ok, Self::Err> {
        let DestroyUserSession { token } = cmd;

        let session = self
            .database()
            .execute(Select(By::<Option<Session>, _>::new(&token)))
            .await
            .map_err(|e| {
                log::error!("failed to find `Session` to destroy: {e}");
            })
            .ok()
            .flatten();

        match self
            .database()
            .execute(Delete(By::<Session, _>::new(&token)))
            .await
        {
            Ok(()) => {
                if let Some(s) = session {
                    log::info!(
                        "`Session` of `User(id: {})` is destroyed",
                        s.user_id,
                    );
                }
            }
            Err(e) => log::error!("failed to destroy `Session`: {e}"),
        }

        Ok(())
    }
}

#[cfg(test)]
mod spec {
    use crate::{
        command::{self, Command as _},
        domain::user::{session, Role},
        testing,
    };

    use super::DestroyUserSession;

    #[tokio::test]
    async fn deletes_only_provided_session() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;
        let other = testing::login(&svc, &user).await;

        svc.execute(DestroyUserSession {
            token: token.clone(),
        })
        .await
        .unwrap();

        assert!(testing::session(&db, &token).await.is_none());
        assert!(testing::session(&db, &other).await.is_some());
    }

    #[tokio::test]
    async fn succeeds_for_unknown_token() {
        let (svc, _, _) = testing::service();

        assert!(svc
            .execute(DestroyUserSession {
                token: session::Token::generate(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn succeeds_on_store_outage() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;
        db.set_available(false);

        assert!(svc
            .execute(DestroyUserSession {
                token: token.clone(),
            })
            .await
            .is_ok());

        db.set_available(true);
        assert!(testing::session(&db, &token).await.is_some());
    }

    #[tokio::test]
    async fn repeated_logout_keeps_token_rejected() {
        let (svc, db, _) = testing::service();
        let user = testing::user(&svc, "clerk", Role::User).await;
        let token = testing::login(&svc, &user).await;

        for _ in 0..2 {
            assert!(svc
                .execute(DestroyUserSession {
                    token: token.clone(),
                })
                .await
                .is_ok());
        }
        assert_eq!(db.sessions_count(), 0);

        let err = svc
            .execute(command::ValidateUserSession { token })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            command::validate_user_session::ExecutionError::Unauthenticated,
        ));
    }
}
