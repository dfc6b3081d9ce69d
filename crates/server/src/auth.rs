//! Token issuing and the extractors that guard routes.

pub mod middleware;

pub use middleware::{
    issue_token, Admins, AuthenticatedUser, Authorized, Claims, Contributors, MaybeUser,
    RolePolicy,
};
