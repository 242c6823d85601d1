pub mod convention;
pub mod error;
pub mod interfaces;
pub mod types;

pub use convention::{classify_path, PathRole, SourceKind, WidgetSource};
pub use error::{WidgetError, WidgetResult};
pub use interfaces::*;
pub use types::*;
