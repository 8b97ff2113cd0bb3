//! Content search over a subtree (spec §4.10 "grep"). Shares the same
//! directory-stack/cooperative-yield shape as [`super::search`]; kept
//! separate because it reads file bodies instead of matching names.

use async_channel::Sender;
use regex::Regex;

use super::{CancelToken, ItemError, JobId, Progress};
use crate::error::Result;
use crate::path::Path;

#[derive(Debug, Clone)]
pub struct GrepMatch {
    pub path: Path,
    pub line_number: u64,
    pub line: String,
}

pub async fn run(
    root: Path,
    pattern: Regex,
    job_id: JobId,
    cancel: CancelToken,
    progress: Sender<Progress>,
) -> Result<Vec<GrepMatch>> {
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
            cancel.check()?;
            if child.is_dir().await.unwrap_or(false) {
                stack.push(child);
                continue;
            }
            match child.read_text().await {
                Ok(text) => {
                    for (line_number, line) in text.lines().enumerate() {
                        if pattern.is_match(line) {
                            matches.push(GrepMatch {
                                path: child.clone(),
                                line_number: line_number as u64 + 1,
                                line: line.to_string(),
                            });
                        }
                    }
                }
                Err(e) => errors.push(ItemError { item: child.as_uri(), message: e.to_string() }),
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
