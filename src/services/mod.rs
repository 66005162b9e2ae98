pub mod file;
pub mod metadata;
pub mod reconcile;

pub use file::FileService;
pub use metadata::{MetadataStore, SqliteMetadataStore};
pub use reconcile::{ReconcileOptions, Reconciler};
