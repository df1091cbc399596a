//! [`User`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{user, User},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Constructs a [`User`] out of the provided [`Row`].
fn from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: row.get("role"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<User>, user::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: user::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, username, \
                   full_name, email, \
                   password_hash, role, \
                   is_active, created_at \
            FROM users \
            WHERE id = $1::UUID";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Select<By<Option<User>, &user::Username>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, &user::Username>>,
    ) -> Result<Self::Ok, Self::Err> {
        let username: &user::Username = by.into_inner();

        const SQL: &str = "\
            SELECT id, username, \
                   full_name, email, \
                   password_hash, role, \
                   is_active, created_at \
            FROM users \
            WHERE username = $1::VARCHAR";
        Ok(self
            .query_opt(SQL, &[username])
            .await
            .map_err(tracerr::wrap!())?
            .as_ref()
            .map(from_row))
    }
}

impl<C> Database<Insert<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(user): Insert<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            username,
            full_name,
            email,
            password_hash,
            role,
            is_active,
            created_at,
        } = user;

        const SQL: &str = "\
            INSERT INTO users (\
                id, username, \
                full_name, email, \
                password_hash, role, \
                is_active, created_at\
            ) \
            VALUES (\
                $1::UUID, $2::VARCHAR, \
                $3::VARCHAR, $4::VARCHAR, \
                $5::VARCHAR, $6::INT2, \
                $7::BOOL, $8::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &id,
                &username,
                &full_name,
                &email,
                &password_hash,
                &role,
                &is_active,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<User>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(user): Update<User>,
    ) -> Result<Self::Ok, Self::Err> {
        let User {
            id,
            username,
            full_name,
            email,
            password_hash,
            role,
            is_active,
            created_at: _,
        } = user;

        const SQL: &str = "\
            UPDATE users \
            SET username = $2::VARCHAR, \
                full_name = $3::VARCHAR, \
                email = $4::VARCHAR, \
                password_hash = $5::VARCHAR, \
                role = $6::INT2, \
                is_active = $7::BOOL \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &id,
                &username,
                &full_name,
                &email,
                &password_hash,
                &role,
                &is_active,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
