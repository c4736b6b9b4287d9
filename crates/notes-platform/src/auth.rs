/// Credential boundary consumed by the remote backend.
///
/// Acquiring and refreshing tokens happens outside this workspace; providers
/// only ask for a usable bearer token.
pub trait AuthSession: Send + Sync {
    /// Current bearer token, if one has been granted
    fn access_token(&self) -> Option<String>;

    /// Whether a granted token exists and has not expired
    fn is_authenticated(&self) -> bool;
}
