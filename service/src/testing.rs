//! Helpers for testing the [`Service`].

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use common::{
    operations::{By, Select},
    Clock, DateTime,
};
use secrecy::SecretBox;

use crate::{
    command::{self, Command as _},
    domain::{
        user::{self, session, Role, Session},
        User,
    },
    infra::{Database as _, Memory},
    task, Config, Service,
};

/// [`Service`] backed by the [`Memory`] database and the [`ManualClock`].
pub(crate) type TestService = Service<Memory, ManualClock>;

/// [`Clock`] advanced manually.
#[derive(Clone, Debug)]
pub(crate) struct ManualClock(Arc<Mutex<DateTime>>);

impl ManualClock {
    /// Moves this [`ManualClock`] forward by the provided [`Duration`].
    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a new [`TestService`] with a one hour [`Session`] timeout.
pub(crate) fn service() -> (TestService, Memory, ManualClock) {
    service_with_timeout(Duration::from_secs(3600))
}

/// Creates a new [`TestService`] with the provided [`Session`] timeout.
pub(crate) fn service_with_timeout(
    session_timeout: Duration,
) -> (TestService, Memory, ManualClock) {
    let db = Memory::new();
    let clock = ManualClock(Arc::new(Mutex::new(
        DateTime::from_unix_timestamp(1_700_000_000).unwrap(),
    )));
    let svc = Service {
        config: Config {
            session_timeout,
            purge_expired_sessions: task::purge_expired_sessions::Config {
                interval: Duration::ZERO,
            },
        },
        database: db.clone(),
        clock: clock.clone(),
    };
    (svc, db, clock)
}

/// Password every [`user()`] is created with.
pub(crate) const PASSWORD: &str = "correct horse battery staple";

/// Creates a new active [`User`] with the provided `username` and [`Role`].
pub(crate) async fn user(svc: &TestService, username: &str, role: Role) -> User {
    svc.execute(command::CreateUser {
        username: username.parse().unwrap(),
        password: password(PASSWORD),
        role,
        full_name: None,
        email: None,
    })
    .await
    .unwrap()
}

/// Wraps the provided `password` into a [`SecretBox`].
pub(crate) fn password(password: &str) -> SecretBox<user::Password> {
    SecretBox::new(Box::new(password.parse().unwrap()))
}

/// Creates a new [`Session`] for the provided [`User`].
pub(crate) async fn login(svc: &TestService, user: &User) -> session::Token {
    svc.execute(command::CreateUserSession::ByUser {
        user: user.clone(),
        client: session::Client::default(),
    })
    .await
    .unwrap()
    .token
}

/// Reads the stored [`Session`] with the provided [`session::Token`].
pub(crate) async fn session(
    db: &Memory,
    token: &session::Token,
) -> Option<Session> {
    db.execute(Select(By::<Option<Session>, _>::new(token)))
        .await
        .unwrap()
}
