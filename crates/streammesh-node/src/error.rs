use thiserror::Error;

/// Top-level failures the bin crate surfaces to `main`. Wraps the real cause
/// with `anyhow::Context` at the call site rather than modeling every
/// underlying error source as its own variant.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("could not load config")]
    Config(#[source] anyhow::Error),
}
