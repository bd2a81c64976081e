//! Lazy first-parent history traversal.

use crate::domain::Commit;
use crate::error::Result;
use crate::host::VcsHost;

/// Iterator over commits, newest first, strictly following the first parent
/// so merge commits contribute a single linear path.
///
/// The walk itself is unbounded; callers stop consuming when their own
/// termination condition is met. Constructing a new walk from the same start
/// commit yields the same sequence, as nothing is cached or mutated besides
/// the iterator's own cursor.
pub struct HistoryWalk<'a, H: VcsHost + ?Sized> {
    host: &'a H,
    next_sha: Option<String>,
}

impl<'a, H: VcsHost + ?Sized> HistoryWalk<'a, H> {
    pub fn new(host: &'a H, start_sha: &str) -> Self {
        HistoryWalk {
            host,
            next_sha: Some(start_sha.to_string()),
        }
    }
}

impl<'a, H: VcsHost + ?Sized> Iterator for HistoryWalk<'a, H> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        let sha = self.next_sha.take()?;
        match self.host.get_commit(&sha) {
            Ok(commit) => {
                self.next_sha = commit.first_parent().map(String::from);
                Some(Ok(commit))
            }
            // The cursor is already cleared, so iteration ends after the
            // error is yielded.
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use chrono::{TimeZone, Utc};

    fn commit(sha: &str, parents: &[&str]) -> Commit {
        Commit::new(
            sha,
            format!("commit {}", sha),
            parents.iter().map(|p| p.to_string()).collect(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    fn shas(host: &MemoryHost, start: &str) -> Vec<String> {
        HistoryWalk::new(host, start)
            .map(|c| c.unwrap().sha)
            .collect()
    }

    #[test]
    fn test_linear_walk_newest_first() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", &[]));
        host.add_commit(commit("b", &["a"]));
        host.add_commit(commit("c", &["b"]));
        assert_eq!(shas(&host, "c"), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_merge_follows_first_parent() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", &[]));
        host.add_commit(commit("b", &["a"]));
        host.add_commit(commit("side", &["a"]));
        host.add_commit(commit("m", &["b", "side"]));
        assert_eq!(shas(&host, "m"), vec!["m", "b", "a"]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", &[]));
        host.add_commit(commit("b", &["a"]));
        host.add_commit(commit("c", &["b"]));
        assert_eq!(shas(&host, "c"), shas(&host, "c"));
    }

    #[test]
    fn test_missing_commit_yields_error_then_stops() {
        let host = MemoryHost::new();
        host.add_commit(commit("b", &["missing"]));
        let mut walk = HistoryWalk::new(&host, "b");
        assert!(walk.next().unwrap().is_ok());
        assert!(walk.next().unwrap().is_err());
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_partial_consumption_with_stop_predicate() {
        let host = MemoryHost::new();
        host.add_commit(commit("a", &[]));
        host.add_commit(commit("b", &["a"]));
        host.add_commit(commit("c", &["b"]));
        let collected: Vec<String> = HistoryWalk::new(&host, "c")
            .map(|c| c.unwrap().sha)
            .take_while(|sha| sha != "a")
            .collect();
        assert_eq!(collected, vec!["c", "b"]);
    }
}
