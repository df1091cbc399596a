//! In-memory [`Database`] implementation.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use common::operations::{By, Delete, Insert, Select, Update};
use derive_more::{Display, Error as StdError};
use tracerr::Traced;

use crate::{
    domain::{
        user::{self, session, Session},
        User,
    },
    infra::{database, Database},
};

/// In-memory [`Database`] client.
///
/// Mirrors the constraints of the persistent schema, so may be used instead
/// of it in tests and local runs.
#[derive(Clone, Debug, Default)]
pub struct Memory(Arc<Mutex<State>>);

/// Contents of a [`Memory`] database.
#[derive(Debug, Default)]
struct State {
    /// Stored [`User`]s.
    users: HashMap<user::Id, User>,

    /// Stored [`Session`]s.
    sessions: HashMap<session::Token, Session>,

    /// Indicator whether every operation fails with [`Error::Unavailable`].
    unavailable: bool,
}

impl Memory {
    /// Name of the unique constraint over [`User::id`]s.
    const USERS_PKEY: &'static str = "users_pkey";

    /// Name of the unique constraint over [`User::username`]s.
    const USERS_USERNAME_KEY: &'static str = "users_username_key";

    /// Name of the unique constraint over [`Session::token`]s.
    const SESSIONS_PKEY: &'static str = "sessions_pkey";

    /// Creates a new empty [`Memory`] database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes this [`Memory`] database (un)available, emulating an outage.
    pub fn set_available(&self, available: bool) {
        self.lock().unavailable = !available;
    }

    /// Returns the number of stored [`Session`]s.
    #[must_use]
    pub fn sessions_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Locks the [`State`] regardless of its availability.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the [`State`] for performing an operation.
    ///
    /// # Errors
    ///
    /// With [`Error::Unavailable`] if this [`Memory`] database is unavailable.
    fn state(&self) -> Result<MutexGuard<'_, State>, Traced<database::Error>> {
        let state = self.lock();
        if state.unavailable {
            return Err(tracerr::map_from(tracerr::new!(Error::Unavailable)));
        }
        Ok(state)
    }
}

/// [`Memory`] database error.
#[derive(Clone, Copy, Debug, Display, StdError)]
pub enum Error {
    /// [`Memory`] database is unavailable.
    #[display("`Memory` database is unavailable")]
    Unavailable,

    /// Unique constraint is violated.
    #[display("Unique constraint `{_0}` is violated")]
    UniqueViolation(#[error(not(source))] &'static str),
}

impl Error {
    /// Checks if the error is a unique violation of the specified constraint.
    #[must_use]
    pub fn is_unique_violation(&self, constraint: Option<&str>) -> bool {
        match self {
            Self::UniqueViolation(c) => constraint.map_or(true, |x| x == *c),
            Self::Unavailable => false,
        }
    }
}

/// Returns a [`Traced`] [`Error::UniqueViolation`] of the provided
/// `constraint`.
fn unique_violation(constraint: &'static str) -> Traced<database::Error> {
    tracerr::map_from(tracerr::new!(Error::UniqueViolation(constraint)))
}

impl Database<Select<By<Option<User>, user::Id>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state()?.users.get(by.inner()).cloned())
    }
}

impl Database<Select<By<Option<User>, &user::Username>>> for Memory {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &user::Username>>,
    ) -> Result<Self::Ok, Self::Err> {
        let username = by.into_inner();
        Ok(self
            .state()?
            .users
            .values()
            .find(|u| &u.username == username)
            .cloned())
    }
}

impl Database<Insert<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state()?;
        if state.users.contains_key(&user.id) {
            return Err(unique_violation(Self::USERS_PKEY));
        }
        if state.users.values().any(|u| u.username == user.username) {
            return Err(unique_violation(Self::USERS_USERNAME_KEY));
        }
        drop(state.users.insert(user.id, user));
        Ok(())
    }
}

impl Database<Update<User>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state()?;
        if state
            .users
            .values()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(unique_violation(Self::USERS_USERNAME_KEY));
        }
        if let Some(stored) = state.users.get_mut(&user.id) {
            *stored = user;
        }
        Ok(())
    }
}

impl Database<Insert<Session>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut state = self.state()?;
        if state.sessions.contains_key(&session.token) {
            return Err(unique_violation(Self::SESSIONS_PKEY));
        }
        drop(state.sessions.insert(session.token.clone(), session));
        Ok(())
    }
}

impl Database<Select<By<Option<Session>, &session::Token>>> for Memory {
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(self.state()?.sessions.get(by.into_inner()).cloned())
    }
}

impl Database<Update<session::Touch>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(touch): Update<session::Touch>,
    ) -> Result<Self::Ok, Self::Err> {
        if let Some(s) = self.state()?.sessions.get_mut(&touch.token) {
            s.last_activity = touch.at;
        }
        Ok(())
    }
}

impl Database<Delete<By<Session, &session::Token>>> for Memory {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, &session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        drop(self.state()?.sessions.remove(by.into_inner()));
        Ok(())
    }
}

impl Database<Delete<By<Session, session::ActivityDateTime>>> for Memory {
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ActivityDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline = by.into_inner();
        let mut state = self.state()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.last_activity >= deadline);
        Ok(u64::try_from(before - state.sessions.len()).unwrap_or(u64::MAX))
    }
}
