//! [`PurgeExpiredSessions`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::{
    operations::{By, Delete, Perform, Start},
    Clock,
};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::user::{session, Session},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`PurgeExpiredSessions`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between expired [`Session`]s purges.
    ///
    /// Zero disables the purging.
    pub interval: time::Duration,
}

/// [`Task`] for deleting the expired [`Session`]s.
#[derive(Clone, Copy, Debug)]
pub struct PurgeExpiredSessions<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Clk> Task<Start<By<PurgeExpiredSessions<Self>, Config>>>
    for Service<Db, Clk>
where
    PurgeExpiredSessions<Service<Db, Clk>>:
        Task<Perform<()>, Ok = u64, Err: Error> + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<PurgeExpiredSessions<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        if config.interval.is_zero() {
            log::info!("`task::PurgeExpiredSessions` is disabled");
            return Ok(());
        }
        let task = PurgeExpiredSessions {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            match task.execute(Perform(())).await {
                Ok(0) => {}
                Ok(n) => {
                    log::info!("`task::PurgeExpiredSessions` removed {n} \
                                expired sessions");
                }
                Err(e) => {
                    log::error!("`task::PurgeExpiredSessions` failed: {e}");
                }
            }
        }
    }
}

impl<Db, Clk> Task<Perform<()>> for PurgeExpiredSessions<Service<Db, Clk>>
where
    Db: Database<
        Delete<By<Session, session::ActivityDateTime>>,
        Ok = u64,
        Err = Traced<database::Error>,
    >,
    Clk: Clock,
{
    type Ok = u64;
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let svc = &self.service;
        let deadline: session::ActivityDateTime =
            (svc.now() - svc.config().session_timeout).coerce();
        svc.database()
            .execute(Delete(By::new(deadline)))
            .await
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`PurgeExpiredSessions`] execution.
pub type ExecutionError = Traced<database::Error>;
