//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod task;
#[cfg(test)]
mod testing;

use std::{error::Error, time::Duration};

use common::{
    clock,
    operations::{By, Start},
    Clock, DateTime,
};

#[cfg(doc)]
use crate::domain::user::Session;
#[cfg(doc)]
use infra::Database;

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Idle time after which a [`Session`] expires.
    pub session_timeout: Duration,

    /// [`task::PurgeExpiredSessions`] configuration.
    pub purge_expired_sessions: task::purge_expired_sessions::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Clk = clock::System> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// [`Clock`] of this [`Service`].
    clock: Clk,
}

impl<Db> Service<Db> {
    /// Creates a new [`Service`] with the provided parameters, reading the
    /// system wall-clock time.
    pub fn new(config: Config, database: Db) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::PurgeExpiredSessions<Self>,
                        task::purge_expired_sessions::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        Self::with_clock(config, database, clock::System)
    }
}

impl<Db, Clk> Service<Db, Clk> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn with_clock(
        config: Config,
        database: Db,
        clock: Clk,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::PurgeExpiredSessions<Self>,
                        task::purge_expired_sessions::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            clock,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn("PurgeExpiredSessions", async move {
            svc.execute(Start(By::new(svc.config().purge_expired_sessions)))
                .await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the current [`DateTime`] according to the [`Clock`] of this
    /// [`Service`].
    #[must_use]
    pub fn now(&self) -> DateTime
    where
        Clk: Clock,
    {
        self.clock.now()
    }
}

#[cfg(test)]
mod spec {
    use crate::{infra::Memory, testing, Service};

    #[tokio::test]
    async fn spawns_purge_task_in_background() {
        let (svc, _, clock) = testing::service();

        let (_, background) =
            Service::with_clock(*svc.config(), Memory::new(), clock);

        assert_eq!(background.len(), 1);
    }
}
