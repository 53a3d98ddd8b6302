/// Middleware module
///
/// The access gate guarding each resource and the request logger.

mod access_gate;
mod logger;

pub use access_gate::{
    access_token_from, admit, refresh_cookie, refresh_token_from, AccessGate, Admission,
    RequiredRoles, REFRESH_COOKIE,
};
pub use logger::LoggerMiddleware;
