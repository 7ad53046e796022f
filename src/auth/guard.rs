/// Login / sign-up page
pub const LOGIN_PATH: &str = "/acesso";
/// Admin dashboard
pub const ADMIN_PATH: &str = "/admin";

const UNGUARDED_PREFIXES: [&str; 4] = ["/api", "/_next/static", "/_next/image", "/favicon.ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Continue,
    Redirect(&'static str),
}

/// Where a request for `path` should go given whether a session exists.
///
/// Signed-in users are kept away from the login page, signed-out users
/// away from the admin area. Everything else passes through.
pub fn guard(path: &str, has_session: bool) -> RouteDecision {
    if UNGUARDED_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return RouteDecision::Continue;
    }

    if has_session && path.starts_with(LOGIN_PATH) {
        return RouteDecision::Redirect(ADMIN_PATH);
    }
    if !has_session && path.starts_with(ADMIN_PATH) {
        return RouteDecision::Redirect(LOGIN_PATH);
    }
    RouteDecision::Continue
}
