//! [`Role`] definitions and the authorization gate.

use std::fmt;

use common::define_kind;
use derive_more::{Display, Error};

#[cfg(doc)]
use crate::domain::User;

define_kind! {
    #[doc = "Role of a [`User`] deciding which operations it may perform."]
    enum Role {
        #[doc = "Full access, including `User` provisioning."]
        Admin = 1,

        #[doc = "Access to the staff records of the organization."]
        Manager = 2,

        #[doc = "Access to the own records only."]
        User = 3,
    }
}

/// Non-empty set of [`Role`]s an operation accepts.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct AllowedRoles(u8);

impl AllowedRoles {
    /// Only [`Role::Admin`].
    pub const ADMIN: Self = Self::only(Role::Admin);

    /// [`Role::Admin`] and [`Role::Manager`].
    pub const STAFF: Self = Self::only(Role::Admin).with(Role::Manager);

    /// Every [`Role`].
    pub const ANY: Self = Self::STAFF.with(Role::User);

    /// Creates [`AllowedRoles`] containing the single provided [`Role`].
    #[must_use]
    pub const fn only(role: Role) -> Self {
        Self(1 << role.u8())
    }

    /// Returns these [`AllowedRoles`] extended with the provided [`Role`].
    #[must_use]
    pub const fn with(self, role: Role) -> Self {
        Self(self.0 | Self::only(role).0)
    }

    /// Creates [`AllowedRoles`] out of the provided [`Role`]s.
    ///
    /// [`None`] is returned if no [`Role`] is provided.
    #[must_use]
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Option<Self> {
        let set = roles
            .into_iter()
            .fold(0, |set, role| set | Self::only(role).0);
        (set != 0).then_some(Self(set))
    }

    /// Checks whether the provided [`Role`] is allowed.
    #[must_use]
    pub const fn contains(self, role: Role) -> bool {
        self.0 & Self::only(role).0 != 0
    }

    /// Iterates over the allowed [`Role`]s in their declaration order.
    pub fn iter(self) -> impl Iterator<Item = Role> {
        Role::ALL.iter().copied().filter(move |r| self.contains(*r))
    }
}

impl fmt::Debug for AllowedRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for AllowedRoles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, role) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{role}")?;
        }
        Ok(())
    }
}

/// Decides whether the provided [`Role`] may perform an operation accepting
/// the provided [`AllowedRoles`].
///
/// # Errors
///
/// With [`Forbidden`] if the `role` is not in the `allowed` set.
pub fn authorize(role: Role, allowed: AllowedRoles) -> Result<(), Forbidden> {
    if allowed.contains(role) {
        Ok(())
    } else {
        Err(Forbidden { role, allowed })
    }
}

/// Error of a [`Role`] not being among the [`AllowedRoles`].
#[derive(Clone, Copy, Debug, Display, Error)]
#[display("`{role}` role is not allowed, expected one of: {allowed}")]
pub struct Forbidden {
    /// [`Role`] which was denied.
    #[error(not(source))]
    pub role: Role,

    /// [`AllowedRoles`] the [`Role`] was checked against.
    #[error(not(source))]
    pub allowed: AllowedRoles,
}

#[cfg(test)]
mod spec {
    use super::{authorize, AllowedRoles, Role};

    #[test]
    fn staff_endpoint_allows_manager_and_admin_only_endpoint_denies() {
        let endpoint_x = AllowedRoles::new([Role::Admin, Role::Manager]);
        let endpoint_y = AllowedRoles::new([Role::Admin]);

        assert!(authorize(Role::Manager, endpoint_x.unwrap()).is_ok());

        let denied = authorize(Role::Manager, endpoint_y.unwrap()).unwrap_err();
        assert_eq!(denied.role, Role::Manager);
        assert_eq!(denied.allowed, AllowedRoles::ADMIN);
        assert_eq!(
            denied.to_string(),
            "`manager` role is not allowed, expected one of: admin",
        );
    }

    #[test]
    fn is_deterministic() {
        for &role in Role::ALL {
            for allowed in [
                AllowedRoles::ADMIN,
                AllowedRoles::STAFF,
                AllowedRoles::ANY,
            ] {
                assert_eq!(
                    authorize(role, allowed).is_ok(),
                    authorize(role, allowed).is_ok(),
                );
                assert_eq!(
                    authorize(role, allowed).is_ok(),
                    allowed.contains(role),
                );
            }
        }
    }

    #[test]
    fn rejects_empty_set() {
        assert_eq!(AllowedRoles::new([]), None);
    }

    #[test]
    fn constants() {
        assert_eq!(
            AllowedRoles::STAFF.iter().collect::<Vec<_>>(),
            [Role::Admin, Role::Manager],
        );
        assert_eq!(AllowedRoles::ANY.iter().count(), Role::ALL.len());
        assert_eq!(AllowedRoles::ANY.to_string(), "admin, manager, user");
        assert_eq!(
            AllowedRoles::new(Role::ALL.iter().copied()),
            Some(AllowedRoles::ANY),
        );
    }

    #[test]
    fn role_text_form() {
        assert_eq!(Role::Manager.to_string(), "manager");
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("Admin".parse::<Role>().is_err());
        assert_eq!(Role::from_u8(3), Some(Role::User));
        assert_eq!(Role::from_u8(0), None);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn decodes_int2_column() {
        use postgres_types::{FromSql as _, Type};

        let raw = 2_i16.to_be_bytes();
        assert_eq!(Role::from_sql(&Type::INT2, &raw).unwrap(), Role::Manager);

        let raw = 7_i16.to_be_bytes();
        assert!(Role::from_sql(&Type::INT2, &raw).is_err());
    }
}
