use thiserror::Error;

/// Failure kinds surfaced by every public router operation.
#[derive(Error, Debug)]
pub enum RoutingError {
    #[error("profile \"{0}\" is not supported by this router")]
    ProfileUnsupported(String),

    #[error("could not resolve a routable edge: {0}")]
    ResolveFailed(String),

    #[error("no route found: {0}")]
    RouteNotFound(String),

    #[error("could not build a route: {0}")]
    RouteBuildFailed(String),

    #[error("the query was canceled")]
    Canceled,

    #[error("graph invariant violated: {0}")]
    InvariantViolation(String),
}
