use chatfab_wire::directory::DirErrorReason;

/// Typed failures for directory-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    NoSlot,
    Spawn,
    NotFound,
    MergeSyntax,
    NoToken,
    BadToken,
    UnknownCmd,
}

impl Error {
    pub fn as_reason(&self) -> DirErrorReason {
        match self {
            Error::NoSlot => DirErrorReason::NoSlot,
            Error::Spawn => DirErrorReason::Spawn,
            Error::NotFound => DirErrorReason::NotFound,
            Error::MergeSyntax => DirErrorReason::MergeSyntax,
            Error::NoToken => DirErrorReason::NoToken,
            Error::BadToken => DirErrorReason::BadToken,
            Error::UnknownCmd => DirErrorReason::UnknownCmd,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_reason())
    }
}

impl std::error::Error for Error {}
