use super::coordinator::RefreshFailure;

/// Session lifecycle notifications broadcast by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A refresh stored a new credential
    Refreshed,
    /// The coordinator removed the credential; the user must sign in again.
    /// Sent once per removal, however many requests were waiting.
    Terminated { reason: RefreshFailure },
    /// The application cleared the session itself (sign-out)
    Cleared,
}
