use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// No host capability is available at all. Fatal for session setup;
    /// callers surface this once and stop, rather than re-raising per tick.
    #[error("no identity provider available — install or enable one to continue")]
    NoProvider,

    #[error("identity provider error: {0}")]
    Provider(String),
}
