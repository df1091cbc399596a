//! [`User`]-related definitions.

use common::DateTime;
use derive_more::{AsRef, Display, From, Into};
use futures::{future, TryFutureExt as _};
use juniper::{graphql_object, GraphQLEnum, GraphQLScalar};
use service::{domain, query, Query as _};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    api::{self, scalar},
    AsError, Context, Error,
};

/// A [`User`] of the system.
#[derive(Clone, Debug, From)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`domain::User`] representing this [`User`].
    user: OnceCell<domain::User>,
}

impl From<domain::User> for User {
    fn from(user: domain::User) -> Self {
        Self {
            id: user.id.into(),
            user: OnceCell::new_with(Some(user)),
        }
    }
}

impl User {
    /// Creates a new [`User`] with the provided ID.
    ///
    /// # Safety
    ///
    /// Caller must ensure that [`User`] with the provided ID exists,
    /// otherwise accessing this [`User`] will result with an error.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            user: OnceCell::new(),
        }
    }

    /// Returns the [`domain::User`] representing this [`User`].
    ///
    /// # Errors
    ///
    /// Error if the [`domain::User`] doesn't exist.
    async fn user(&self, ctx: &Context) -> Result<&domain::User, Error> {
        let id = self.id.into();
        self.user
            .get_or_try_init(|| {
                ctx.service()
                    .execute(query::user::ById::by(id))
                    .map_err(AsError::into_error)
                    .map_err(ctx.error())
                    .and_then(|u| {
                        future::ready(
                            u.ok_or_else(|| {
                                api::query::UserError::NotExists.into()
                            })
                            .map_err(ctx.error()),
                        )
                    })
            })
            .await
    }
}

/// A `User` of the system.
#[graphql_object(context = Context)]
impl User {
    /// Unique identifier of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.id",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Sign-in name of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.username",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn username(&self, ctx: &Context) -> Result<Username, Error> {
        Ok(self.user(ctx).await?.username.clone().into())
    }

    /// Full name of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.fullName",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn full_name(&self, ctx: &Context) -> Result<Option<Name>, Error> {
        Ok(self.user(ctx).await?.full_name.clone().map(Into::into))
    }

    /// Email of this `User`.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.email",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn email(&self, ctx: &Context) -> Result<Option<Email>, Error> {
        Ok(self.user(ctx).await?.email.clone().map(Into::into))
    }

    /// Current `UserRole` of this `User`.
    ///
    /// Already open sessions keep the role this `User` had at sign-in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.role",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn role(&self, ctx: &Context) -> Result<Role, Error> {
        Ok(self.user(ctx).await?.role.into())
    }

    /// Indicator whether this `User` is allowed to sign in.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.isActive",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn is_active(&self, ctx: &Context) -> Result<bool, Error> {
        Ok(self.user(ctx).await?.is_active)
    }

    /// `DateTime` when this `User` was created.
    #[tracing::instrument(
        skip_all,
        fields(
            gql.name = "User.createdAt",
            otel.name = api::Query::SPAN_NAME,
        ),
    )]
    pub async fn created_at(&self, ctx: &Context) -> Result<DateTime, Error> {
        Ok(self.user(ctx).await?.created_at.coerce())
    }
}

/// Unique identifier of a `User`.
#[derive(
    Clone, Copy, Debug, Display, Eq, From, GraphQLScalar, Into, PartialEq,
)]
#[from(domain::user::Id)]
#[into(domain::user::Id)]
#[graphql(name = "UserId", transparent)]
pub struct Id(Uuid);

/// Sign-in name of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "Username",
    with = scalar::Via::<domain::user::Username>,
)]
pub struct Username(domain::user::Username);

/// Full name of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserName",
    with = scalar::Via::<domain::user::Name>,
)]
pub struct Name(domain::user::Name);

/// Password of a `User`.
#[derive(AsRef, Clone, Debug, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserPassword",
    with = scalar::Via::<domain::user::Password>,
)]
pub struct Password(domain::user::Password);

/// Email of a `User`.
#[derive(AsRef, Clone, Debug, Display, From, GraphQLScalar, Into)]
#[graphql(
    name = "UserEmail",
    with = scalar::Via::<domain::user::Email>,
)]
pub struct Email(domain::user::Email);

/// Role of a `User` granting access to the system operations.
#[derive(Clone, Copy, Debug, Eq, GraphQLEnum, PartialEq)]
#[graphql(name = "UserRole")]
pub enum Role {
    /// Full access, including `User` management.
    Admin,

    /// Access to staff records.
    Manager,

    /// Access to own records only.
    User,
}

impl From<domain::user::Role> for Role {
    fn from(role: domain::user::Role) -> Self {
        use domain::user::Role as R;

        match role {
            R::Admin => Self::Admin,
            R::Manager => Self::Manager,
            R::User => Self::User,
        }
    }
}

impl From<Role> for domain::user::Role {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => Self::Admin,
            Role::Manager => Self::Manager,
            Role::User => Self::User,
        }
    }
}

pub mod session {
    //! `Session`-related definitions.

    use common::DateTime;
    use derive_more::{AsRef, From, Into};
    use juniper::{graphql_object, GraphQLObject, GraphQLScalar};
    use service::{command, domain};

    use crate::{
        api::{self, scalar},
        Context,
    };

    use super::Role;

    /// `Session` access token.
    #[derive(AsRef, Clone, Debug, From, GraphQLScalar, Into)]
    #[graphql(
        name = "UserAuthToken",
        with = scalar::Via::<domain::user::session::Token>,
    )]
    pub struct Token(domain::user::session::Token);

    /// Result of a `Session` creation.
    #[derive(Clone, Debug, From, GraphQLObject)]
    #[graphql(context = Context, name = "CreateSessionResult")]
    pub struct CreateResult {
        /// Access token of the created `Session`.
        pub token: Token,

        /// `User` associated with the created `Session`.
        pub user: api::User,

        /// `DateTime` when the created `Session` expires, unless it's used
        /// before.
        pub expires_at: DateTime,
    }

    impl From<command::create_user_session::Output> for CreateResult {
        fn from(output: command::create_user_session::Output) -> Self {
            let command::create_user_session::Output {
                token,
                user,
                expires_at,
            } = output;
            Self {
                token: token.into(),
                user: user.into(),
                expires_at: expires_at.coerce(),
            }
        }
    }

    /// Current `Session` of a `User`.
    #[derive(Clone, Debug)]
    pub struct Info {
        /// Validated `Session`.
        pub session: domain::user::session::Validated,

        /// `DateTime` the `Session` was looked at.
        pub now: DateTime,
    }

    /// Current `Session` of a `User`.
    #[graphql_object(name = "UserSession", context = Context)]
    impl Info {
        /// `UserRole` the `Session` was created with.
        #[must_use]
        pub fn role(&self) -> Role {
            self.session.role.into()
        }

        /// `DateTime` when the `Session` was created.
        #[must_use]
        pub fn created_at(&self) -> DateTime {
            self.session.created_at.coerce()
        }

        /// `DateTime` of the last `Session` activity.
        #[must_use]
        pub fn last_activity_at(&self) -> DateTime {
            self.session.last_activity.coerce()
        }

        /// `DateTime` when the `Session` expires, unless it's used before.
        #[must_use]
        pub fn expires_at(&self) -> DateTime {
            self.session.expires_at.coerce()
        }

        /// Number of whole seconds the `Session` stays alive without any
        /// activity.
        #[must_use]
        pub fn remaining_seconds(&self) -> i32 {
            i32::try_from(self.session.remaining(self.now).as_secs())
                .unwrap_or(i32::MAX)
        }
    }
}
