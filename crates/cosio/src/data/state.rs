use std::fmt;

/// Lifecycle of a transfer.
///
/// `Canceled`, `Failed`, `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransferState {
    #[default]
    NotStarted,
    InProgress,
    /// Stopped on user request; the remote session is kept for resume.
    Canceled,
    Failed,
    Completed,
    /// Canceled or failed, and the remote session has since been removed.
    Aborted,
}

impl TransferState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Canceled | Self::Failed | Self::Completed | Self::Aborted)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Staying put and leaving a non-terminal state are always allowed.
    /// Between two different terminal states only `Canceled -> Aborted` is.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self == next || !self.is_terminal() {
            return true;
        }
        matches!((self, next), (Self::Canceled, Self::Aborted))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NotStarted",
            Self::InProgress => "InProgress",
            Self::Canceled => "Canceled",
            Self::Failed => "Failed",
            Self::Completed => "Completed",
            Self::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
