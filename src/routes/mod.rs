/// Router Module Index
///
/// Routes are split by access level so the auth layer is applied per module rather than
/// remembered per route.

/// Routes open to anyone: catalogue and review reads, user upsert/login, admin flag lookup.
pub mod public;

/// Routes that require a valid bearer token. Handlers add the owner checks.
pub mod authenticated;

/// Routes that require a valid bearer token whose user holds the admin role.
pub mod admin;
