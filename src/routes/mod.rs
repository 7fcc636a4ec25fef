/// Router Module Index
///
/// Routes are split by the access level the router enforces with layers. The
/// services still apply the authorization table themselves, so a route that
/// ends up in the wrong module fails closed.

/// Routes open to anonymous callers. Handlers accept an optional identity and
/// widen what they return for signed-in users.
pub mod public;

/// Routes behind the authentication layer.
pub mod authenticated;

/// Category mutations, behind the authentication and admin layers.
pub mod admin;
