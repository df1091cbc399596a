//! [`Session`]-related [`Database`] implementations.

use common::operations::{By, Delete, Insert, Select, Update};
use tracerr::Traced;

use crate::{
    domain::user::{session, Session},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Insert<Session>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(session): Insert<Session>,
    ) -> Result<Self::Ok, Self::Err> {
        let Session {
            token,
            user_id,
            role,
            client: session::Client {
                address,
                user_agent,
            },
            created_at,
            last_activity,
        } = session;

        const SQL: &str = "\
            INSERT INTO sessions (\
                token, user_id, role, \
                ip_address, user_agent, \
                created_at, last_activity\
            ) \
            VALUES (\
                $1::VARCHAR, $2::UUID, $3::INT2, \
                $4::INET, $5::VARCHAR, \
                $6::TIMESTAMPTZ, $7::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &token,
                &user_id,
                &role,
                &address,
                &user_agent,
                &created_at,
                &last_activity,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<Session>, &session::Token>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Session>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Session>, &session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token: &session::Token = by.into_inner();

        const SQL: &str = "\
            SELECT token, user_id, role, \
                   ip_address, user_agent, \
                   created_at, last_activity \
            FROM sessions \
            WHERE token = $1::VARCHAR";
        Ok(self
            .query_opt(SQL, &[token])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Session {
                token: row.get("token"),
                user_id: row.get("user_id"),
                role: row.get("role"),
                client: session::Client {
                    address: row.get("ip_address"),
                    user_agent: row.get("user_agent"),
                },
                created_at: row.get("created_at"),
                last_activity: row.get("last_activity"),
            }))
    }
}

impl<C> Database<Update<session::Touch>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(touch): Update<session::Touch>,
    ) -> Result<Self::Ok, Self::Err> {
        let session::Touch { token, at } = touch;

        const SQL: &str = "\
            UPDATE sessions \
            SET last_activity = $2::TIMESTAMPTZ \
            WHERE token = $1::VARCHAR";
        self.exec(SQL, &[&token, &at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Session, &session::Token>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, &session::Token>>,
    ) -> Result<Self::Ok, Self::Err> {
        let token: &session::Token = by.into_inner();

        const SQL: &str = "\
            DELETE FROM sessions \
            WHERE token = $1::VARCHAR";
        self.exec(SQL, &[token])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Delete<By<Session, session::ActivityDateTime>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Delete(by): Delete<By<Session, session::ActivityDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline: session::ActivityDateTime = by.into_inner();

        const SQL: &str = "\
            DELETE FROM sessions \
            WHERE last_activity < $1::TIMESTAMPTZ";
        self.exec(SQL, &[&deadline])
            .await
            .map_err(tracerr::wrap!())
    }
}
