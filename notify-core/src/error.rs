/// Errors raised by the client-less vocabulary in this crate.
///
/// Registries and controllers in `notify-runtime` have their own, richer
/// error enums; this one only covers malformed data that can be detected
/// without talking to anything external.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resource key '{0}' does not look like group/version/resource/namespace/name")]
    InvalidResourceKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
