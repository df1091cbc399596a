//! [`Session`] definitions.

use std::{net::IpAddr, str::FromStr, time::Duration};

use common::{unit, DateTime, DateTimeOf};
use derive_more::{AsRef, Display, Error};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::{rngs::OsRng, RngCore as _};

#[cfg(doc)]
use crate::domain::User;
use crate::domain::user::{self, role, AllowedRoles, Role};

/// Server-side session of an authenticated [`User`].
#[derive(Clone, Debug)]
pub struct Session {
    /// [`Token`] identifying this [`Session`].
    pub token: Token,

    /// ID of the [`User`] this [`Session`] belongs to.
    pub user_id: user::Id,

    /// [`Role`] of the [`User`] at the moment this [`Session`] was created.
    pub role: Role,

    /// [`Client`] this [`Session`] was created from.
    pub client: Client,

    /// [`DateTime`] when this [`Session`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] of the last successful validation of this [`Session`].
    pub last_activity: ActivityDateTime,
}

impl Session {
    /// Checks whether this [`Session`] has been idle for longer than the
    /// provided `timeout` at the provided moment.
    #[must_use]
    pub fn is_expired(&self, now: DateTime, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Returns the [`DateTime`] when this [`Session`] expires, unless it's
    /// used before.
    #[must_use]
    pub fn expires_at(&self, timeout: Duration) -> ExpirationDateTime {
        (self.last_activity + timeout).coerce()
    }
}

/// Opaque bearer token of a [`Session`].
///
/// 32 random bytes from the OS CSPRNG, encoded as 64 lowercase hex digits.
#[derive(AsRef, Clone, Display, Eq, Hash, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Token(String);

impl Token {
    /// Number of random bytes in a [`Token`].
    const BYTES: usize = 32;

    /// Generates a new random [`Token`].
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

impl FromStr for Token {
    type Err = MalformedToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let is_valid = s.len() == Self::BYTES * 2
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        is_valid.then(|| Self(s.to_owned())).ok_or(MalformedToken)
    }
}

/// Error of parsing a malformed [`Token`].
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("malformed `Token`")]
pub struct MalformedToken;

/// `User-Agent` reported by a [`Client`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct UserAgent(String);

impl UserAgent {
    /// Maximum length of a [`UserAgent`] in bytes.
    pub const MAX_LEN: usize = 512;

    /// Creates a new [`UserAgent`], truncating it to [`UserAgent::MAX_LEN`].
    ///
    /// [`None`] is returned if the provided `agent` is blank.
    #[must_use]
    pub fn new(agent: impl Into<String>) -> Option<Self> {
        let mut agent = agent.into();
        if agent.trim().is_empty() {
            return None;
        }
        if agent.len() > Self::MAX_LEN {
            let mut end = Self::MAX_LEN;
            while !agent.is_char_boundary(end) {
                end -= 1;
            }
            agent.truncate(end);
        }
        Some(Self(agent))
    }
}

/// Client metadata recorded along a [`Session`] for audit purposes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Client {
    /// IP address of the client, if known.
    pub address: Option<IpAddr>,

    /// [`UserAgent`] of the client, if reported.
    pub user_agent: Option<UserAgent>,
}

/// Refreshing of the [`Session::last_activity`].
#[derive(Clone, Debug)]
pub struct Touch {
    /// [`Token`] of the [`Session`] to refresh.
    pub token: Token,

    /// New [`Session::last_activity`].
    pub at: ActivityDateTime,
}

/// [`Session`] which has just passed validation.
#[derive(Clone, Debug)]
pub struct Validated {
    /// [`Token`] of the validated [`Session`].
    pub token: Token,

    /// ID of the [`User`] owning the validated [`Session`].
    pub user_id: user::Id,

    /// [`Role`] snapshot of the validated [`Session`].
    pub role: Role,

    /// [`DateTime`] when the validated [`Session`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] of the validation, which became the new
    /// [`Session::last_activity`].
    pub last_activity: ActivityDateTime,

    /// [`DateTime`] when the validated [`Session`] expires, unless it's used
    /// before.
    pub expires_at: ExpirationDateTime,
}

impl Validated {
    /// Checks whether this [`Validated`] session may perform an operation
    /// accepting the provided [`AllowedRoles`].
    ///
    /// # Errors
    ///
    /// With [`role::Forbidden`] if the [`Role`] snapshot is not allowed.
    pub fn authorize(&self, allowed: AllowedRoles) -> Result<(), role::Forbidden> {
        user::authorize(self.role, allowed)
    }

    /// Returns how long this [`Validated`] session stays alive from the
    /// provided moment, saturating at zero.
    #[must_use]
    pub fn remaining(&self, now: DateTime) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// [`DateTime`] when a [`Session`] was created.
pub type CreationDateTime = DateTimeOf<(Session, unit::Creation)>;

/// [`DateTime`] of a [`Session`] activity.
pub type ActivityDateTime = DateTimeOf<(Session, unit::Activity)>;

/// [`DateTime`] when a [`Session`] expires.
pub type ExpirationDateTime = DateTimeOf<(Session, unit::Expiration)>;

#[cfg(test)]
mod spec {
    use std::{collections::HashSet, time::Duration};

    use common::DateTime;

    use crate::domain::user::{self, AllowedRoles, Role};

    use super::{Client, Session, Token, UserAgent, Validated};

    fn session(last_activity: i64) -> Session {
        let at = DateTime::from_unix_timestamp(last_activity).unwrap();
        Session {
            token: Token::generate(),
            user_id: user::Id::new(),
            role: Role::Manager,
            client: Client::default(),
            created_at: at.coerce(),
            last_activity: at.coerce(),
        }
    }

    #[test]
    fn token_format() {
        let token = Token::generate();

        assert_eq!(token.as_ref().len(), 64);
        assert!(token
            .as_ref()
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
        assert_eq!(token.as_ref().parse::<Token>().unwrap(), token);
    }

    #[test]
    fn tokens_are_distinct() {
        let tokens = (0..1000)
            .map(|_| Token::generate())
            .collect::<HashSet<_>>();

        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!("".parse::<Token>().is_err());
        assert!("abc".parse::<Token>().is_err());
        assert!("A".repeat(64).parse::<Token>().is_err());
        assert!("g".repeat(64).parse::<Token>().is_err());
        assert!("a".repeat(65).parse::<Token>().is_err());
        assert!("a".repeat(64).parse::<Token>().is_ok());
    }

    #[test]
    fn does_not_leak_token_in_debug() {
        let token = Token::generate();

        assert!(!format!("{token:?}").contains(token.as_ref()));
    }

    #[test]
    fn expires_strictly_after_timeout() {
        let timeout = Duration::from_secs(3600);
        let s = session(1_000);
        let at = |t| DateTime::from_unix_timestamp(t).unwrap();

        assert!(!s.is_expired(at(1_000), timeout));
        assert!(!s.is_expired(at(4_600), timeout));
        assert!(s.is_expired(at(4_601), timeout));
        assert!(!s.is_expired(at(500), timeout));
        assert_eq!(s.expires_at(timeout).unix_timestamp(), 4_600);
    }

    #[test]
    fn validated_remaining_time_saturates() {
        let s = session(1_000);
        let validated = Validated {
            token: s.token,
            user_id: s.user_id,
            role: s.role,
            created_at: s.created_at,
            last_activity: s.last_activity,
            expires_at: DateTime::from_unix_timestamp(1_060).unwrap().coerce(),
        };
        let at = |t| DateTime::from_unix_timestamp(t).unwrap();

        assert_eq!(validated.remaining(at(1_000)), Duration::from_secs(60));
        assert_eq!(validated.remaining(at(2_000)), Duration::ZERO);
        assert!(validated.authorize(AllowedRoles::STAFF).is_ok());
        assert!(validated.authorize(AllowedRoles::ADMIN).is_err());
    }

    #[test]
    fn user_agent_is_bounded() {
        assert_eq!(UserAgent::new("   "), None);
        assert_eq!(
            UserAgent::new("ж".repeat(UserAgent::MAX_LEN))
                .unwrap()
                .as_ref()
                .len(),
            UserAgent::MAX_LEN,
        );
        assert_eq!(
            UserAgent::new("curl/8.0").unwrap().as_ref(),
            "curl/8.0",
        );
    }
}
