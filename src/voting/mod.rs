//! Vote parsing and tabulation
//!
//! Everything here is a pure function of entry text; nothing talks to the
//! store. The text encodings of votes, the tally and the superseded flag are
//! defined once in [`markers`].

pub mod ballot;
pub mod markers;
pub mod tally;

pub use ballot::{extract_signer, parse_choice, Choice};
pub use tally::{find_tally_entry, latest_live_vote, tabulate, Tally};
