pub mod assets;
pub mod convert;
pub mod encoding;
pub mod error;
pub mod import;
pub mod postprocess;
pub mod sanitize;

pub use convert::{ConvertError, MarkdownConverter};
pub use error::ImportError;
pub use import::{run_import, DocumentFailure, ImportOptions, ImportReport};
pub use postprocess::RenderProfile;
