//! Pure view builders. Everything here is a function of its inputs: no
//! clocks, no I/O, no shared state, so identical inputs always produce
//! identical boards.

pub mod bonus;
pub mod consensus;
pub mod diffs;
pub mod fixtures;
pub mod summary;

pub use bonus::project_bonus;
pub use consensus::consensus;
pub use diffs::differentials;
pub use fixtures::fixture_ticker;
pub use summary::member_summaries;
