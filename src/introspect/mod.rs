//! # Introspection: human-readable snapshots of entity subtrees.
//!
//! - [`dump_info`] / [`dump_info_with`]: recursive dump to any [`std::io::Write`] sink.
//! - [`sanitize`], [`is_secret`], [`is_trivial`]: the redaction and suppression rules it uses.

mod dump;
mod redact;

pub use dump::{DumpOptions, dump_info, dump_info_stdout, dump_info_to_string, dump_info_with};
pub use redact::{REDACTED, is_secret, is_trivial, sanitize};
