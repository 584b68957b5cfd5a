use thiserror::Error;

/// Errors produced while parsing a command-expression argument into a `Formula`,
/// or a delay literal into a `Duration`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("argument has no '=': {0:?}")]
    MissingCommand(String),

    #[error("empty command in argument {0:?}")]
    EmptyCommand(String),

    #[error("invalid delay literal {0:?}")]
    BadDelay(String),

    #[error("unknown color {0:?}")]
    UnknownColor(String),

    #[error("unknown action {0:?}")]
    UnknownAction(String),

    #[error("malformed dependency clause {0:?}")]
    BadDep(String),

    #[error("unexpected section order in argument {0:?}")]
    BadSectionOrder(String),

    #[error("failed to tokenize command: {0}")]
    Shlex(String),

    #[error("duplicate channel name {0:?}")]
    DuplicateName(String),

    #[error("dependency targets unknown channel {0:?}")]
    UnknownDepTarget(String),

    #[error("dependency graph has an END-cycle: {0}")]
    DependencyCycle(String),
}
