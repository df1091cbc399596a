//! [`Context`]-related definitions.

use std::sync::atomic::{self, AtomicU16};

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    RequestPartsExt as _,
};
use axum_client_ip::InsecureClientIp;
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use juniper::{
    http::{GraphQLBatchResponse, GraphQLResponse},
    IntoFieldError as _,
};
use serde::Deserialize;
use service::{
    command::{self, Command as _},
    domain::user::{session, AllowedRoles},
};
use tokio::sync::OnceCell;
use tracing as log;

use crate::{define_error, AsError, Error, JuniperResponse, Service};

/// Application context.
#[derive(Debug)]
pub struct Context {
    /// [`Service`] instance.
    service: Service,

    /// Error status code.
    error_status_code: AtomicU16,

    /// Parts of the HTTP request.
    parts: http::request::Parts,

    /// Current [`session::Validated`].
    current_session: OnceCell<session::Validated>,

    /// Last authentication [`Error`].
    auth_error: OnceCell<Error>,
}

impl Context {
    /// Returns [`Service`] instance of this [`Context`].
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Returns the error status code of this [`Context`].
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn error_status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(
            self.error_status_code.load(atomic::Ordering::Relaxed),
        )
        .expect("invalid status code")
    }

    /// Sets the error status code for this [`Context`].
    ///
    /// Provided [`http::StatusCode`] will be applied to the response.
    pub fn set_error_status_code(&self, status_code: http::StatusCode) {
        self.error_status_code
            .store(status_code.as_u16(), atomic::Ordering::Relaxed);
    }

    /// Helper method calling [`Context::set_error_status_code()`] inside
    /// [`Result::map_err()`] closure.
    pub fn error(&self) -> impl FnOnce(Error) -> Error + '_ {
        move |err| {
            self.set_error_status_code(err.status_code);
            err
        }
    }

    /// Returns the current [`session::Validated`] for this [`Context`].
    ///
    /// The session is validated at most once per request, so its activity is
    /// refreshed once no matter how many resolvers ask for it.
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - the current HTTP request carries no well-formed token;
    /// - the provided token doesn't denote a live session;
    /// - the session storage is unavailable.
    pub async fn current_session(&self) -> Result<session::Validated, Error> {
        self.current_session
            .get_or_try_init(|| async {
                match self
                    .auth_error
                    .get_or_try_init(|| async {
                        match self.do_authentication().await {
                            Ok(s) => Err(s),
                            Err(e) => Ok(e),
                        }
                    })
                    .await
                {
                    Ok(e) => Err(e),
                    Err(s) => Ok(s),
                }
            })
            .await
            .cloned()
            .map_err(|e| {
                self.set_error_status_code(e.status_code);
                e.clone()
            })
    }

    /// Returns the current [`session::Validated`] if its role is among the
    /// provided [`AllowedRoles`].
    ///
    /// # Errors
    ///
    /// Errors if:
    /// - [`Context::current_session()`] errors;
    /// - the role of the current session is not allowed.
    pub async fn authorize(
        &self,
        allowed: AllowedRoles,
    ) -> Result<session::Validated, Error> {
        let session = self.current_session().await?;
        session
            .authorize(allowed)
            .map_err(AsError::into_error)
            .map_err(self.error())?;
        Ok(session)
    }

    /// Returns the well-formed [`session::Token`] provided with the current
    /// HTTP request, if any.
    pub async fn token(&self) -> Option<session::Token> {
        extract_token(&self.parts).await.ok()
    }

    /// Returns the [`session::Client`] the current HTTP request came from.
    #[must_use]
    pub fn client(&self) -> session::Client {
        session::Client {
            address: InsecureClientIp::from(
                &self.parts.headers,
                &self.parts.extensions,
            )
            .ok()
            .map(|ip| ip.0),
            user_agent: self
                .parts
                .headers
                .get(http::header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .and_then(session::UserAgent::new),
        }
    }

    /// Performs the [`session::Validated`] authentication.
    ///
    /// # Errors
    ///
    /// Errors if the provided authentication token is invalid.
    async fn do_authentication(&self) -> Result<session::Validated, Error> {
        let token = extract_token(&self.parts).await.map_err(Error::from)?;
        self.service
            .execute(command::ValidateUserSession { token })
            .await
            .map_err(AsError::into_error)
    }
}

impl juniper::Context for Context {}

#[async_trait]
impl<S> FromRequestParts<S> for Context
where
    S: Send + Sync,
{
    type Rejection = JuniperResponse;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _: &S,
    ) -> Result<Self, Self::Rejection> {
        let service =
            parts.extensions.get::<Service>().cloned().ok_or_else(|| {
                JuniperResponse {
                    status_code: http::StatusCode::INTERNAL_SERVER_ERROR,
                    response: GraphQLBatchResponse::Single(
                        GraphQLResponse::error(
                            Error::internal(&"missing `Service` extension")
                                .into_field_error(),
                        ),
                    ),
                }
            })?;

        Ok(Self {
            service,
            error_status_code: AtomicU16::new(
                http::StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            ),
            parts: parts.clone(),
            current_session: OnceCell::new(),
            auth_error: OnceCell::new(),
        })
    }
}

/// Query string of an HTTP request possibly carrying a [`session::Token`].
#[derive(Debug, Deserialize)]
struct TokenParam {
    /// Raw token value.
    token: Option<String>,
}

/// Extracts the [`session::Token`] from the provided HTTP request parts.
///
/// `Authorization: Bearer <token>` header is looked up first, falling back to
/// the `?token=<token>` query parameter.
///
/// # Errors
///
/// With [`AuthError::AuthorizationRequired`] if no token is provided, or the
/// provided one is malformed.
async fn extract_token(
    parts: &http::request::Parts,
) -> Result<session::Token, AuthError> {
    let mut parts = parts.clone();

    let raw = match parts.extract::<TypedHeader<Authorization<Bearer>>>().await
    {
        Ok(TypedHeader(Authorization(bearer))) => bearer.token().to_owned(),
        Err(e) => {
            if !e.is_missing() {
                log::debug!("ignoring `Authorization` header: {e}");
            }
            parts
                .extract::<Query<TokenParam>>()
                .await
                .ok()
                .and_then(|Query(p)| p.token)
                .ok_or(AuthError::AuthorizationRequired)?
        }
    };

    raw.parse().map_err(|_| AuthError::AuthorizationRequired)
}

impl AsError for command::validate_user_session::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Unauthenticated => {
                Some(AuthError::AuthorizationRequired.into())
            }
        }
    }
}

define_error! {
    enum AuthError {
        #[code = "AUTHORIZATION_REQUIRED"]
        #[status = UNAUTHORIZED]
        #[message = "Authorization required"]
        AuthorizationRequired,
    }
}

#[cfg(test)]
mod spec {
    use service::domain::user::session;

    use super::{extract_token, AuthError};

    const TOKEN: &str =
        "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn parts(uri: &str, authorization: Option<&str>) -> http::request::Parts {
        let mut req = http::Request::builder().uri(uri);
        if let Some(value) = authorization {
            req = req.header(http::header::AUTHORIZATION, value);
        }
        req.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn takes_bearer_header() {
        let token = extract_token(&parts(
            "/graphql",
            Some(&format!("Bearer {TOKEN}")),
        ))
        .await
        .unwrap();

        assert_eq!(AsRef::<str>::as_ref(&token), TOKEN);
    }

    #[tokio::test]
    async fn falls_back_to_query_parameter() {
        let token = extract_token(&parts(&format!("/graphql?token={TOKEN}"), None))
            .await
            .unwrap();

        assert_eq!(token, TOKEN.parse::<session::Token>().unwrap());
    }

    #[tokio::test]
    async fn prefers_header_over_query_parameter() {
        let other = "f".repeat(64);
        let token = extract_token(&parts(
            &format!("/graphql?token={TOKEN}"),
            Some(&format!("Bearer {other}")),
        ))
        .await
        .unwrap();

        assert_eq!(AsRef::<str>::as_ref(&token), other);
    }

    #[tokio::test]
    async fn requires_well_formed_token() {
        for (uri, header) in [
            ("/graphql", None),
            ("/graphql", Some("Bearer not-a-token")),
            ("/graphql", Some(&*format!("Basic {TOKEN}"))),
            ("/graphql?token=XYZ", None),
            ("/graphql?token=", None),
        ] {
            assert!(
                matches!(
                    extract_token(&parts(uri, header)).await,
                    Err(AuthError::AuthorizationRequired),
                ),
                "uri: {uri}, header: {header:?}",
            );
        }
    }
}
