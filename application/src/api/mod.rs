//! GraphQL API definitions.

mod mutation;
mod query;
pub mod scalar;
pub mod user;

use crate::Context;

pub use self::{mutation::Mutation, query::Query, user::User};

/// GraphQL schema.
pub type Schema = juniper::RootNode<
    'static,
    Query,
    Mutation,
    juniper::EmptySubscription<Context>,
>;

/// Creates a new [`Schema`].
#[must_use]
pub fn schema() -> Schema {
    Schema::new(Query, Mutation, juniper::EmptySubscription::new())
}

#[cfg(test)]
mod spec {
    #[test]
    fn exposes_session_operations() {
        let sdl = super::schema().as_sdl();

        for field in [
            "createUserSession(",
            "deleteUserSession:",
            "createUser(",
            "updateUserRole(",
            "updateUserStatus(",
            "me:",
            "session:",
            "user(",
            "remainingSeconds:",
        ] {
            assert!(sdl.contains(field), "missing `{field}` in schema");
        }
        assert!(sdl.contains("enum UserRole"));
    }
}
