//! Command implementations

pub mod index;
pub mod list;
pub mod query;

pub use index::{cmd_extend, cmd_index, IndexOutcome, UploadOutcome, UploadReport};
pub use list::cmd_list;
pub use query::{cmd_ask, cmd_chat};
