//! Media handling for inbound meter photos: storage layout, filesystem store,
//! and a small server for the stored objects.

pub mod fs_store;
pub mod media_server;
pub mod mime_detect;

pub use fs_store::{is_safe_key, storage_key, FsMediaStore};
pub use media_server::media_router;
pub use mime_detect::{detect_mime_type, extension_for, is_inline_safe};
