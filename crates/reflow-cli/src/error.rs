#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
pub enum Error {
    #[error("{0} is empty")]
    EmptyInput(String),

    #[error("{0} is encrypted; decrypt it first")]
    Encrypted(String),

    #[error("Cannot open {path}: {reason}")]
    UnreadableInput { path: String, reason: String },
}
