//! The back end: the target-machine model and the `.pmc` textual listing
//! format (`spec.md` §4.4, §6).

pub mod listing;
pub mod machine;

pub use listing::format_listing;
pub use machine::{CapturedOutput, Machine, Output, StdoutOutput};
