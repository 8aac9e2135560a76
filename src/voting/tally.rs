//! Vote tabulation
//!
//! `tabulate` is a pure fold over the entry list: the tally entry, comments
//! and superseded votes are skipped, malformed votes are ignored, and for each
//! signer only the latest vote counts (store order breaks timestamp ties).

use super::ballot::{extract_signer, parse_choice, Choice};
use super::markers::{is_comment, is_superseded, is_tally, TALLY_HEADER};
use crate::store::Entry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u32,
    pub no: u32,
    pub total: u32,
}

impl Tally {
    /// YES only on a strict majority; ties (including 0-0) go to NO
    pub fn majority(&self) -> Choice {
        if self.yes > self.no {
            Choice::Yes
        } else {
            Choice::No
        }
    }

    /// Body of the tally entry
    pub fn render(&self, at: DateTime<Utc>, is_final: bool) -> String {
        let footer = if is_final {
            format!("_Final tally, voting closed {}_", at.to_rfc3339())
        } else {
            format!("_Updated {}_", at.to_rfc3339())
        };
        format!(
            "{}\n\n| Choice | Votes |\n|---|---|\n| ✅ YES | {} |\n| ❌ NO | {} |\n| **Total** | {} |\n\n{}",
            TALLY_HEADER, self.yes, self.no, self.total, footer
        )
    }
}

/// Entries that may count as votes, with their signer
fn vote_candidates(entries: &[Entry]) -> impl Iterator<Item = (&Entry, &str)> {
    entries
        .iter()
        .filter(|e| !is_tally(&e.body) && !is_comment(&e.body) && !is_superseded(&e.body))
        .filter_map(|e| extract_signer(&e.body).map(|signer| (e, signer)))
}

pub fn tabulate(entries: &[Entry]) -> Tally {
    let mut latest: HashMap<&str, (DateTime<Utc>, Choice)> = HashMap::new();
    for (entry, signer) in vote_candidates(entries) {
        let Some(choice) = parse_choice(&entry.body) else {
            continue;
        };
        match latest.get(signer) {
            // Strictly older entries lose; equal timestamps go to the later one
            Some((seen_at, _)) if *seen_at > entry.created_at => {}
            _ => {
                latest.insert(signer, (entry.created_at, choice));
            }
        }
    }

    let mut tally = Tally::default();
    for (_, choice) in latest.values() {
        match choice {
            Choice::Yes => tally.yes += 1,
            Choice::No => tally.no += 1,
        }
    }
    tally.total = tally.yes + tally.no;
    tally
}

/// Most recent live (non-superseded) vote entry by `signer`
pub fn latest_live_vote<'a>(entries: &'a [Entry], signer: &str) -> Option<&'a Entry> {
    let signer = signer.trim();
    let mut found: Option<&Entry> = None;
    for (entry, by) in vote_candidates(entries) {
        if by != signer {
            continue;
        }
        if found.map_or(true, |f| f.created_at <= entry.created_at) {
            found = Some(entry);
        }
    }
    found
}

/// The distinguished tally entry, if present
pub fn find_tally_entry(entries: &[Entry]) -> Option<&Entry> {
    entries.iter().find(|e| is_tally(&e.body))
}
