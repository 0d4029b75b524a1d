use thiserror::Error;

#[derive(Error, Debug)]
pub enum MraStreamError {
    #[error("CannotPerformHttpRequest: [{message}]")]
    CannotPerformHttpRequest { message: String },
    #[error("AuthenticationError: [{message}]")]
    AuthenticationError { message: String },
    #[error("UnexpectedEndOfStream")]
    UnexpectedEndOfStream,
    #[error("MraConnectionError: [{message}]")]
    MraConnectionError { message: String },
    #[error("PayloadParsingError: [{message}]")]
    PayloadParsingError { message: String },
}
