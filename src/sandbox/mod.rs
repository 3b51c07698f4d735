//! Sandboxed filesystem access beneath a fixed root.
//!
//! - [`policy`]: deny-list and escape classification of relative paths (no I/O)
//! - [`resolve`]: lexical resolution against the root, plus the realpath check
//! - [`reader`]: byte-capped reads with a truncation flag
//! - [`walker`]: recursive listing that prunes denied trees and skips symlinks

pub mod policy;
pub mod reader;
pub mod resolve;
pub mod walker;

pub use policy::{DenialVerdict, check_path, escapes_root, is_denied};
pub use reader::{ReadResult, read_capped};
pub use resolve::{ResolvedPath, ensure_realpath_inside_root, normalize_lexically, resolve_in_root};
pub use walker::list_files;
