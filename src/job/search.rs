//! Filename search over a subtree, by glob or regex (spec §4.10
//! "search"). Yields cooperatively after each directory (spec:
//! "search/grep yield cooperatively after each directory step and check
//! cancellation").

use async_channel::Sender;

use super::{CancelToken, ItemError, JobId, Progress};
use crate::error::Result;
use crate::path::Path;

pub enum SearchPattern {
    Glob(globset::GlobMatcher),
    Regex(regex::Regex),
}

impl SearchPattern {
    fn matches(&self, name: &str) -> bool {
        match self {
            SearchPattern::Glob(matcher) => matcher.is_match(name),
            SearchPattern::Regex(re) => re.is_match(name),
        }
    }
}

pub async fn run(
    root: Path,
    pattern: SearchPattern,
    job_id: JobId,
    cancel: CancelToken,
    progress: Sender<Progress>,
) -> Result<Vec<Path>> {
    let mut matches = Vec::new();
    let mut stack = vec![root];
    let mut done = 0u64;
    let mut errors = Vec::new();

    while let Some(dir) = stack.pop() {
        cancel.check()?;
        let children = match dir.iterdir().await {
            Ok(children) => children,
            Err(e) => {
                errors.push(ItemError { item: dir.as_uri(), message: e.to_string() });
                continue;
            }
        };
        for child in children {
            if pattern.matches(&child.name()) {
                matches.push(child.clone());
            }
            if child.is_dir().await.unwrap_or(false) {
                stack.push(child);
            }
        }
        done += 1;
        let _ = progress
            .send(Progress {
                job_id,
                done,
                total: None,
                current_item: Some(dir.as_uri()),
                errors: std::mem::take(&mut errors),
                finished: false,
            })
            .await;
    }

    let _ = progress
        .send(Progress { job_id, done, total: Some(done), current_item: None, errors: Vec::new(), finished: true })
        .await;
    Ok(matches)
}
