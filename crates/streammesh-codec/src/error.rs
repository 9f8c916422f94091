use thiserror::Error;

/// Fatal-for-the-connection decode failures. Any occurrence of these means
/// the byte stream cannot be trusted any further; the caller must close the
/// connection rather than attempt to resynchronise.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of buffer while decoding a record")]
    UnexpectedEof,
    #[error("unknown message kind tag {0}")]
    UnknownMessageKind(u8),
    #[error("field contained invalid utf-8")]
    InvalidUtf8,
    #[error("record declared length {declared} but body has {trailing} trailing bytes")]
    TrailingGarbage { declared: usize, trailing: usize },
}
