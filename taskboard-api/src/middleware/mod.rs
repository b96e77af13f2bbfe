/// Tower middleware for the API server
///
/// Authentication lives in `app::jwt_auth_layer`, next to the router it
/// guards.

pub mod security;
