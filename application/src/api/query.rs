//! GraphQL [`Query`]s definitions.

use juniper::graphql_object;
use service::{domain::user::AllowedRoles, query, Query as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL queries.
#[derive(Clone, Copy, Debug)]
pub struct Query;

impl Query {
    /// Name of the [`tracing::Span`] for the queries.
    pub(crate) const SPAN_NAME: &'static str = "GraphQL query";
}

#[graphql_object(context = Context)]
impl Query {
    /// Returns the currently authenticated `User`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "me",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn me(ctx: &Context) -> Result<api::User, Error> {
        let session = ctx.authorize(AllowedRoles::ANY).await?;

        #[expect(
            unsafe_code,
            reason = "validated `Session` guarantees `User` existence"
        )]
        let me = unsafe { api::User::new_unchecked(session.user_id) };
        Ok(me)
    }

    /// Returns the current `UserSession`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "session",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn session(
        ctx: &Context,
    ) -> Result<api::user::session::Info, Error> {
        let session = ctx.authorize(AllowedRoles::ANY).await?;
        Ok(api::user::session::Info {
            session,
            now: ctx.service().now(),
        })
    }

    /// Returns the `User` with the specified ID.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `FORBIDDEN` - the current `User` is neither an admin nor a manager;
    /// - `USER_NOT_EXISTS` - the `User` with the specified ID does not exist;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            id = %id,
            gql.name = "user",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn user(
        id: api::user::Id,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        _ = ctx.authorize(AllowedRoles::STAFF).await?;

        ctx.service()
            .execute(query::user::ById::by(id.into()))
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())?
            .ok_or_else(|| UserError::NotExists.into())
            .map_err(ctx.error())
            .map(Into::into)
    }
}

define_error! {
    enum UserError {
        #[code = "USER_NOT_EXISTS"]
        #[status = NOT_FOUND]
        #[message = "`User` with the specified ID does not exist"]
        NotExists,
    }
}
