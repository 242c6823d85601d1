//! Widget store: remote registry listing plus install/uninstall of widget sources.

pub mod archive;
pub mod installer;
pub mod registry;

pub use archive::extract_widget_archive;
pub use installer::{validate_widget_id, WidgetInstaller, MOCK_DOWNLOAD};
pub use registry::{builtin_registry, RegistryClient, RegistryEntry, DEFAULT_REGISTRY_URL};
