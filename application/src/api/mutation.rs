//! GraphQL [`Mutation`]s definitions.

use juniper::graphql_object;
use service::{command, domain::user::AllowedRoles, Command as _};

use crate::{api, define_error, AsError, Context, Error};

/// Root of all GraphQL mutations.
#[derive(Clone, Copy, Debug)]
pub struct Mutation;

impl Mutation {
    /// Name of the [`tracing::Span`] for the mutations.
    const SPAN_NAME: &'static str = "GraphQL mutation";
}

#[graphql_object(context = Context)]
impl Mutation {
    /// Creates a new `UserSession` with the provided credentials.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `WRONG_CREDENTIALS` - provided credentials does not match any active
    ///                         `User`;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "createUserSession",
            otel.name = Self::SPAN_NAME,
            username = %username,
        ),
    )]
    pub async fn create_user_session(
        username: api::user::Username,
        password: api::user::Password,
        ctx: &Context,
    ) -> Result<api::user::session::CreateResult, Error> {
        ctx.service()
            .execute(command::CreateUserSession::ByCredentials {
                username: username.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
                client: ctx.client(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Destroys the `UserSession` denoted by the provided `UserAuthToken`.
    ///
    /// Always succeeds, even if there is no such `UserSession`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "deleteUserSession",
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn delete_user_session(ctx: &Context) -> bool {
        if let Some(token) = ctx.token().await {
            match ctx
                .service()
                .execute(command::DestroyUserSession { token })
                .await
            {
                Ok(()) => {}
                Err(e) => match e {},
            }
        }
        true
    }

    /// Creates a new active `User` with the provided credentials and role.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `FORBIDDEN` - the current `User` is not an admin;
    /// - `USERNAME_OCCUPIED` - provided `Username` is occupied by another
    ///                         `User`;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            email = ?email,
            full_name = ?full_name,
            gql.name = "createUser",
            otel.name = Self::SPAN_NAME,
            role = ?role,
            username = %username,
        ),
    )]
    pub async fn create_user(
        username: api::user::Username,
        password: api::user::Password,
        role: api::user::Role,
        full_name: Option<api::user::Name>,
        email: Option<api::user::Email>,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        _ = ctx.authorize(AllowedRoles::ADMIN).await?;

        ctx.service()
            .execute(command::CreateUser {
                username: username.into(),
                password: secrecy::SecretBox::init_with(move || {
                    password.into()
                }),
                role: role.into(),
                full_name: full_name.map(Into::into),
                email: email.map(Into::into),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Updates the `UserRole` of the specified `User`.
    ///
    /// Already open sessions of the `User` keep their previous `UserRole`.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `FORBIDDEN` - the current `User` is not an admin;
    /// - `USER_NOT_EXISTS` - the `User` with the specified ID does not exist;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "updateUserRole",
            id = %id,
            otel.name = Self::SPAN_NAME,
            role = ?role,
        ),
    )]
    pub async fn update_user_role(
        id: api::user::Id,
        role: api::user::Role,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        _ = ctx.authorize(AllowedRoles::ADMIN).await?;

        ctx.service()
            .execute(command::UpdateUserRole {
                user_id: id.into(),
                role: role.into(),
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }

    /// Activates or deactivates the specified `User`.
    ///
    /// Sessions of a deactivated `User` stop being accepted immediately.
    ///
    /// # Errors
    ///
    /// Possible error codes:
    /// - `AUTHORIZATION_REQUIRED` - no valid `UserAuthToken` is provided;
    /// - `FORBIDDEN` - the current `User` is not an admin;
    /// - `USER_NOT_EXISTS` - the `User` with the specified ID does not exist;
    /// - `STORE_UNAVAILABLE` - the storage is temporarily unavailable.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "updateUserStatus",
            id = %id,
            is_active = is_active,
            otel.name = Self::SPAN_NAME,
        ),
    )]
    pub async fn update_user_status(
        id: api::user::Id,
        is_active: bool,
        ctx: &Context,
    ) -> Result<api::User, Error> {
        _ = ctx.authorize(AllowedRoles::ADMIN).await?;

        ctx.service()
            .execute(command::UpdateUserStatus {
                user_id: id.into(),
                is_active,
            })
            .await
            .map_err(AsError::into_error)
            .map_err(ctx.error())
            .map(Into::into)
    }
}

impl AsError for command::create_user::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "USERNAME_OCCUPIED"]
                #[status = CONFLICT]
                #[message = "`Username` is occupied by another `User`"]
                UsernameOccupied,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UsernameOccupied(_) => Some(Error::UsernameOccupied.into()),
        }
    }
}

impl AsError for command::create_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        define_error! {
            enum Error {
                #[code = "WRONG_CREDENTIALS"]
                #[status = UNAUTHORIZED]
                #[message = "Provided credentials does not match any active \
                             `User`"]
                WrongCredentials,
            }
        }

        match self {
            Self::Db(e) => e.try_as_error(),
            Self::TokenCollision => None,
            Self::UserInactive(_) | Self::WrongCredentials => {
                Some(Error::WrongCredentials.into())
            }
        }
    }
}

impl AsError for command::update_user_role::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => {
                Some(api::query::UserError::NotExists.into())
            }
        }
    }
}

impl AsError for command::update_user_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::UserNotExists(_) => {
                Some(api::query::UserError::NotExists.into())
            }
        }
    }
}

#[cfg(test)]
mod spec {
    use service::{
        command,
        domain::user,
        infra::{database, memory},
    };

    use crate::AsError as _;

    #[test]
    fn login_failures_are_indistinguishable() {
        use command::create_user_session::ExecutionError as E;

        let wrong = E::WrongCredentials.as_error();
        let inactive = E::UserInactive(user::Id::new()).as_error();

        assert_eq!(wrong.code, "WRONG_CREDENTIALS");
        assert_eq!(wrong.status_code, http::StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.code, inactive.code);
        assert_eq!(wrong.message, inactive.message);
    }

    #[test]
    fn token_collision_is_internal() {
        use command::create_user_session::ExecutionError as E;

        let err = E::TokenCollision.as_error();

        assert_eq!(err.code, "INTERNAL_SERVER_ERROR");
        assert_eq!(err.status_code, http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn maps_user_errors() {
        let occupied = command::create_user::ExecutionError::UsernameOccupied(
            "admin".parse().unwrap(),
        )
        .as_error();
        assert_eq!(occupied.code, "USERNAME_OCCUPIED");
        assert_eq!(occupied.status_code, http::StatusCode::CONFLICT);

        let missing =
            command::update_user_role::ExecutionError::UserNotExists(
                user::Id::new(),
            )
            .as_error();
        assert_eq!(missing.code, "USER_NOT_EXISTS");
        assert_eq!(missing.status_code, http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn distinguishes_outage_from_unauthenticated() {
        use command::validate_user_session::ExecutionError as E;

        let outage =
            E::Db(database::Error::Memory(memory::Error::Unavailable))
                .as_error();
        let rejected = E::Unauthenticated.as_error();

        assert_eq!(outage.code, "STORE_UNAVAILABLE");
        assert_eq!(outage.status_code, http::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rejected.code, "AUTHORIZATION_REQUIRED");
        assert_eq!(rejected.status_code, http::StatusCode::UNAUTHORIZED);
    }
}
