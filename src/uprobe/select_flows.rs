//! Parses a `select_flows` configuration string — a comma-separated
//! list of flow-def name regexes and/or numeric id ranges — into a
//! predicate a demux pipe can use to decide which of its outputs to
//! actually instantiate (spec §3.7).
//!
//! Grammar: entries separated by `,`; each entry is either a decimal
//! id, an `id-id` inclusive range, or a `/regex/` matched against the
//! flow's `flow.def` name. `"auto"` means "select everything" and is
//! the default when no string is configured.

use regex::Regex;

use crate::error::{UError, UResult};

enum Entry {
    Id(u64),
    IdRange(u64, u64),
    NamePattern(Regex),
}

pub struct SelectFlows {
    entries: Vec<Entry>,
    select_all: bool,
}

impl SelectFlows {
    pub fn auto() -> Self {
        SelectFlows { entries: Vec::new(), select_all: true }
    }

    pub fn parse(spec: &str) -> UResult<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("auto") {
            return Ok(Self::auto());
        }
        let mut entries = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some(pattern) = part.strip_prefix('/').and_then(|p| p.strip_suffix('/')) {
                entries.push(Entry::NamePattern(Regex::new(pattern).map_err(|_| UError::Invalid)?));
            } else if let Some((lo, hi)) = part.split_once('-') {
                let lo: u64 = lo.trim().parse().map_err(|_| UError::Invalid)?;
                let hi: u64 = hi.trim().parse().map_err(|_| UError::Invalid)?;
                entries.push(Entry::IdRange(lo, hi));
            } else {
                entries.push(Entry::Id(part.parse().map_err(|_| UError::Invalid)?));
            }
        }
        Ok(SelectFlows { entries, select_all: false })
    }

    pub fn matches(&self, id: u64, name: &str) -> bool {
        if self.select_all {
            return true;
        }
        self.entries.iter().any(|e| match e {
            Entry::Id(i) => *i == id,
            Entry::IdRange(lo, hi) => id >= *lo && id <= *hi,
            Entry::NamePattern(re) => re.is_match(name),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn auto_matches_everything() {
        let sf = SelectFlows::auto();
        assert!(sf.matches(99, "anything."));
    }

    #[test]
    fn id_list_and_range() {
        let sf = SelectFlows::parse("1,3,5-7").unwrap();
        assert!(sf.matches(1, ""));
        assert!(!sf.matches(2, ""));
        assert!(sf.matches(6, ""));
        assert!(!sf.matches(8, ""));
    }

    #[test]
    fn name_pattern_matches_flow_def() {
        let sf = SelectFlows::parse("/^pic\\./").unwrap();
        assert!(sf.matches(0, "pic.yuv420p."));
        assert!(!sf.matches(0, "sound.s16."));
    }

    #[test]
    fn invalid_spec_is_rejected() {
        assert!(SelectFlows::parse("not-a-number-range-x").is_err());
    }
}
