//! [`User`] definitions.

pub mod role;
pub mod session;

use std::{str::FromStr, sync::LazyLock};

use argon2::{
    password_hash::{self, PasswordHasher as _, SaltString},
    Argon2, PasswordVerifier as _,
};
#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf};
use derive_more::{AsRef, Display, From, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rand::rngs::OsRng;
use regex::Regex;
use secrecy::{zeroize::Zeroize, CloneableSecret};
use uuid::Uuid;

pub use self::{
    role::{authorize, AllowedRoles, Role},
    session::Session,
};

/// Staff member able to sign in.
#[derive(Clone, Debug)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`Username`] of this [`User`].
    pub username: Username,

    /// Full [`Name`] of this [`User`], if any.
    pub full_name: Option<Name>,

    /// [`Email`] of this [`User`], if any.
    pub email: Option<Email>,

    /// [`PasswordHash`] of this [`User`].
    pub password_hash: PasswordHash,

    /// [`Role`] of this [`User`].
    pub role: Role,

    /// Indicator whether this [`User`] may sign in and keep its
    /// [`Session`]s alive.
    pub is_active: bool,

    /// [`DateTime`] when this [`User`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`User`].
#[derive(
    Clone, Copy, Debug, Default, Display, Eq, From, Hash, Into, PartialEq,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Unique, case-sensitive sign-in name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Username(String);

impl Username {
    /// Maximum length of a [`Username`] in characters.
    pub const MAX_LEN: usize = 64;

    /// Creates a new [`Username`] if the given `username` is valid.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Option<Self> {
        let username = username.into();
        Self::check(&username).then_some(Self(username))
    }

    /// Checks whether the given `username` is a valid [`Username`].
    fn check(username: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Username`] invariants:
        /// - Must not be empty;
        /// - Must not start or end with whitespace;
        /// - Must not contain control characters.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s\p{Cc}](?:[^\p{Cc}]*[^\s\p{Cc}])?$")
                .expect("valid regex")
        });

        let username = username.as_ref();
        username.chars().count() <= Self::MAX_LEN && REGEX.is_match(username)
    }
}

impl FromStr for Username {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Username`")
    }
}

/// Full name of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 256
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Email address of a [`User`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Email(String);

impl Email {
    /// Creates a new [`Email`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Email`].
    fn check(address: impl AsRef<str>) -> bool {
        /// Regular expression loosely checking [`Email`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex")
        });

        let address = address.as_ref();
        address.len() <= 256 && REGEX.is_match(address)
    }
}

impl FromStr for Email {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Email`")
    }
}

/// Password of a [`User`].
#[derive(Clone, Debug, Display, Eq, PartialEq)]
pub struct Password(String);

impl Password {
    /// Creates a new [`Password`] if the given `password` is valid.
    #[must_use]
    pub fn new(password: impl Into<String>) -> Option<Self> {
        let password = password.into();
        Self::check(&password).then_some(Self(password))
    }

    /// Checks whether the given `password` is a valid [`Password`].
    fn check(password: impl AsRef<str>) -> bool {
        let password = password.as_ref();
        !password.is_empty() && password.len() <= 128
    }
}

impl FromStr for Password {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Password`")
    }
}

impl CloneableSecret for Password {}
impl Zeroize for Password {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// [Argon2id] hash of a [`User`]'s [`Password`] in the [PHC string format].
///
/// [Argon2id]: https://en.wikipedia.org/wiki/Argon2
/// [PHC string format]: https://github.com/P-H-C/phc-string-format
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes the given [`Password`] with a random salt.
    #[expect(clippy::missing_panics_doc, reason = "infallible")]
    #[must_use]
    pub fn new(password: &Password) -> Self {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.0.as_bytes(), &salt)
            .expect("`Password` length is within `Argon2` limits");
        Self(hash.to_string())
    }

    /// Returns a well-formed [`PasswordHash`] of a random [`Password`] nobody
    /// knows.
    ///
    /// Verifying against it takes as long as against a real [`User`]'s one,
    /// so a missing [`User`] is not observable by timing.
    #[must_use]
    pub fn dummy() -> &'static Self {
        static DUMMY: LazyLock<PasswordHash> = LazyLock::new(|| {
            let random = SaltString::generate(&mut OsRng);
            PasswordHash::new(&Password(random.as_str().to_owned()))
        });

        &DUMMY
    }

    /// Checks whether the given [`Password`] matches this [`PasswordHash`].
    ///
    /// A malformed stored hash never matches.
    #[must_use]
    pub fn verify(&self, password: &Password) -> bool {
        password_hash::PasswordHash::new(&self.0).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(password.0.as_bytes(), &hash)
                .is_ok()
        })
    }
}

/// [`DateTime`] when a [`User`] was created.
pub type CreationDateTime = DateTimeOf<(User, unit::Creation)>;

#[cfg(test)]
mod spec {
    use super::{Password, PasswordHash, Username};

    #[test]
    fn username_format() {
        assert!(Username::new("admin").is_some());
        assert!(Username::new("manager01").is_some());
        assert!(Username::new("山田").is_some());
        assert!(Username::new("a").is_some());
        assert!(Username::new("hr manager").is_some());

        assert!(Username::new("").is_none());
        assert!(Username::new(" admin").is_none());
        assert!(Username::new("admin ").is_none());
        assert!(Username::new("admin\n").is_none());
        assert!(Username::new("ad\tmin").is_none());
        assert!(Username::new("admin\u{7}").is_none());
        assert!(Username::new("a".repeat(Username::MAX_LEN + 1)).is_none());
    }

    #[test]
    fn username_is_case_sensitive() {
        assert_ne!(Username::new("Admin"), Username::new("admin"));
    }

    #[test]
    fn password_hash_verifies_only_its_password() {
        let password = Password::new("hunter2").unwrap();
        let hash = PasswordHash::new(&password);

        assert!(hash.verify(&password));
        assert!(!hash.verify(&Password::new("hunter3").unwrap()));
    }

    #[test]
    fn password_hash_is_salted() {
        let password = Password::new("hunter2").unwrap();

        assert_ne!(PasswordHash::new(&password), PasswordHash::new(&password));
    }

    #[test]
    fn dummy_password_hash_is_well_formed() {
        let dummy = PasswordHash::dummy();

        assert!(argon2::password_hash::PasswordHash::new(&dummy.0).is_ok());
        assert!(!dummy.verify(&Password::new("hunter2").unwrap()));
        assert_eq!(dummy, PasswordHash::dummy());
    }

    #[test]
    fn malformed_password_hash_never_verifies() {
        let hash = PasswordHash(String::from("plain-text"));

        assert!(!hash.verify(&Password::new("plain-text").unwrap()));
    }
}
