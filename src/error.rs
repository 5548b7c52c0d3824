//! Custom error types and result handling for Tankobon operations.
//!
//! Only folder-level structural problems surface as an [`Error`] from
//! [`TankobonConfig::assemble`](crate::TankobonConfig::assemble). Failures that
//! concern a single image are converted into statistics entries and
//! placeholder pages instead.
//!
use std::path::PathBuf;

/// Type alias for Results with Tankobon errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all Tankobon operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O errors from the standard library
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Regular expression parsing errors
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// Image decoding or encoding errors
    #[error(transparent)]
    Image(#[from] image::ImageError),
    /// Blocking task join errors
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
    #[error(transparent)]
    ConfigBuilder(#[from] crate::tankobon::TankobonConfigBuilderError),
    /// PDF document construction or serialization errors
    #[error("PDF error: {0}")]
    Pdf(String),
    /// Error for invalid file or directory paths
    #[error("The given path '{0:?}' is invalid: {1}")]
    InvalidPath(PathBuf, String),
    /// The source folder has no chapter sub-folders
    #[error("No chapters found in {0:?}")]
    NoChapters(PathBuf),
    /// Chapters exist but none of them holds a supported image
    #[error("No images found in any chapter of {0:?}")]
    NoImages(PathBuf),
    /// Error for unsupported operations or formats (e.g., an image container the PDF cannot embed)
    #[error("Unsupported: {0}")]
    Unsupported(String),
    /// Error for resources that couldn't be found (e.g., source directory, image file)
    #[error("Not found: {0}")]
    NotFound(String),
    /// Other errors that don't fit into specific categories
    #[error("Other error: {0}")]
    Other(String),
}

impl From<printpdf::Error> for Error {
    fn from(error: printpdf::Error) -> Self {
        Error::Pdf(format!("{error:?}"))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}
