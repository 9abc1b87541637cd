use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    common::election::{ChoiceIndex, ElectionId, ElectionState},
    oracle::OracleError,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Wrong lifecycle state for the requested operation.
    #[error("Election {0} is not open")]
    ElectionNotOpen(ElectionId),
    #[error("Election {0} must be closed")]
    MustBeClosed(ElectionId),
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // Caller identity or signature problems.
    #[error("Only the owner may perform this action")]
    OnlyOwner,
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
    #[error("Signed message does not match the expected request")]
    MessageMismatch,

    // Attempts to repeat something that may only happen once.
    #[error("Invalid or expired nonce")]
    InvalidOrExpiredNonce,
    #[error("Already voted in election {0}")]
    AlreadyVoted(ElectionId),
    #[error("Choice {choice} of election {election} is already revealed")]
    AlreadyRevealed {
        election: ElectionId,
        choice: ChoiceIndex,
    },
    #[error("Reveal not requested for choice {choice} of election {election}")]
    RevealNotRequested {
        election: ElectionId,
        choice: ChoiceIndex,
    },

    // Malformed input.
    #[error("Invalid choice index {0}")]
    InvalidChoiceIndex(ChoiceIndex),
    #[error("Too few choices: {0}")]
    TooFewChoices(usize),
    #[error("Too many choices: {0}")]
    TooManyChoices(usize),
    #[error("Choice {0} has an empty label")]
    EmptyChoiceLabel(usize),
    #[error("Expected {expected} inputs, found {found}")]
    InputCountMismatch { expected: usize, found: usize },
    #[error("Cleartext must be a 32-byte encoded uint32, found {0} bytes")]
    MalformedCleartext(usize),
    #[error("Bad request: {0}")]
    BadRequest(String),

    // The oracle refused to certify a decryption.
    #[error("Decryption proof rejected: {0}")]
    ProofRejected(OracleError),

    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("Relay stopped: {0}")]
    RelayStopped(String),
}

/// Coarse classification of [`Error`]s.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    State,
    Auth,
    Replay,
    Validation,
    Proof,
    NotFound,
    Upstream,
    Internal,
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// An operation was attempted from a state it does not apply to.
    pub fn invalid_state(
        election: ElectionId,
        state: ElectionState,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState(format!(
            "cannot {operation} election {election} while it is {state}"
        ))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ElectionNotOpen(_) | Self::MustBeClosed(_) | Self::InvalidState(_) => {
                ErrorKind::State
            }
            Self::OnlyOwner | Self::InvalidSignature(_) | Self::MessageMismatch | Self::Jwt(_) => {
                ErrorKind::Auth
            }
            Self::InvalidOrExpiredNonce
            | Self::AlreadyVoted(_)
            | Self::AlreadyRevealed { .. }
            | Self::RevealNotRequested { .. } => ErrorKind::Replay,
            Self::InvalidChoiceIndex(_)
            | Self::TooFewChoices(_)
            | Self::TooManyChoices(_)
            | Self::EmptyChoiceLabel(_)
            | Self::InputCountMismatch { .. }
            | Self::MalformedCleartext(_)
            | Self::BadRequest(_) => ErrorKind::Validation,
            Self::ProofRejected(_) => ErrorKind::Proof,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Oracle(e) if e.is_rejection() => ErrorKind::Validation,
            Self::Oracle(_) => ErrorKind::Upstream,
            Self::RelayStopped(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> Status {
        match (self.kind(), self) {
            (_, Self::InvalidOrExpiredNonce) => Status::BadRequest,
            (_, Self::Jwt(err)) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            (ErrorKind::State, _) | (ErrorKind::Replay, _) => Status::Conflict,
            (ErrorKind::Auth, _) => Status::Unauthorized,
            (ErrorKind::Validation, _) => Status::BadRequest,
            (ErrorKind::Proof, _) => Status::UnprocessableEntity,
            (ErrorKind::NotFound, _) => Status::NotFound,
            (ErrorKind::Upstream, _) => Status::BadGateway,
            (ErrorKind::Internal, _) => Status::InternalServerError,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        } else {
            debug!("{self}");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
