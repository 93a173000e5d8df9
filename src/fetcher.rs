// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Concurrently fetch and normalize merged change requests across repositories, with caching and progress
// role: pipeline/fetcher
// inputs: Repository names, a TimeWindow, an optional progress callback
// outputs: Flat ChangeRequestRecord list (order not guaranteed; content deterministic)
// side_effects: Remote GitLab calls via the injected trait seam; tracing warnings for skipped repositories
// invariants:
// - Empty input returns immediately; the worker pool is never touched
// - Progress fires in completion order with fraction = completed/total
// - One repository failing yields zero records for it, never an aborted aggregate
// - Bot-authored records are excluded at normalization time; diffs are stored untruncated
// errors: Only a failed directory resolution propagates; per-repository errors are absorbed
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::cache::{fetch_key, TtlCache};
use crate::directory::ProjectDirectory;
use crate::gitlab_api::{GitlabApi, MergeRequestSummary, MrAuthor};
use crate::model::{ChangeRequestRecord, ProjectRef};
use crate::window::TimeWindow;

/// Fixed number of concurrent in-flight repository fetches.
pub const FETCH_WORKERS: usize = 8;

/// Fetch results stay valid this long; UI re-renders within the window
/// must not refetch.
const RESULT_TTL: Duration = Duration::from_secs(300);

static BOT_AUTHOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)renovate").unwrap());

/// Progress callback: (fraction complete, human-readable status).
pub type ProgressFn<'a> = dyn Fn(f32, &str) + 'a;

pub struct MergeRequestFetcher {
  api: Arc<dyn GitlabApi>,
  directory: ProjectDirectory,
  cache: TtlCache<crate::cache::FetchKey, Vec<ChangeRequestRecord>>,
  pool: rayon::ThreadPool,
}

impl MergeRequestFetcher {
  pub fn new(api: Arc<dyn GitlabApi>, group_id: Option<String>) -> Result<Self> {
    Ok(Self {
      directory: ProjectDirectory::new(Arc::clone(&api), group_id),
      api,
      cache: TtlCache::new(RESULT_TTL),
      pool: rayon::ThreadPoolBuilder::new().num_threads(FETCH_WORKERS).build()?,
    })
  }

  pub fn directory(&self) -> &ProjectDirectory {
    &self.directory
  }

  /// Fetch merged change requests for `names` within `window`, memoized per
  /// (sorted names, window) for the result TTL. Progress fires only on an
  /// actual fetch, never on a cache hit.
  pub fn fetch(
    &self,
    names: &[String],
    window: &TimeWindow,
    on_progress: Option<&ProgressFn<'_>>,
  ) -> Result<Vec<ChangeRequestRecord>> {
    if names.is_empty() {
      return Ok(Vec::new());
    }

    let key = fetch_key(names, window.start_iso(), window.end_iso());
    self
      .cache
      .get_or_fetch(key, || self.fetch_uncached(names, window, on_progress))
  }

  fn fetch_uncached(
    &self,
    names: &[String],
    window: &TimeWindow,
    on_progress: Option<&ProgressFn<'_>>,
  ) -> Result<Vec<ChangeRequestRecord>> {
    let projects = self.directory.resolve(names)?;
    let total = projects.len();
    if total == 0 {
      return Ok(Vec::new());
    }

    // One task per repository; results drained in completion order so the
    // caller sees progress as repositories finish, not as they were queued.
    let (tx, rx) = mpsc::channel::<(String, Result<Vec<ChangeRequestRecord>>)>();

    for project in projects {
      let api = Arc::clone(&self.api);
      let window = window.clone();
      let tx = tx.clone();

      self.pool.spawn(move || {
        let result = fetch_project_records(api.as_ref(), &project, &window);
        // Receiver may be gone if the caller bailed; in-flight work just ends.
        let _ = tx.send((project.path_with_namespace, result));
      });
    }
    drop(tx);

    let mut out: Vec<ChangeRequestRecord> = Vec::new();

    for (idx, (name, result)) in rx.iter().enumerate() {
      let done = idx + 1;

      match result {
        Ok(mut records) => out.append(&mut records),
        Err(err) => warn!(repo = %name, error = %format!("{err:#}"), "skipping repository after fetch failure"),
      }

      if let Some(cb) = on_progress {
        cb(
          done as f32 / total as f32,
          &format!("Fetched {name} ({done}/{total})"),
        );
      }
    }

    Ok(out)
  }
}

fn is_bot_author(author: &MrAuthor) -> bool {
  BOT_AUTHOR.is_match(&author.username) || BOT_AUTHOR.is_match(&author.name)
}

fn fetch_project_records(
  api: &dyn GitlabApi,
  project: &ProjectRef,
  window: &TimeWindow,
) -> Result<Vec<ChangeRequestRecord>> {
  let summaries = api.list_merged_requests(project.id, window)?;
  let mut out = Vec::with_capacity(summaries.len());

  for mr in summaries {
    if is_bot_author(&mr.author) {
      continue;
    }
    let diffs = api.merge_request_diffs(project.id, mr.iid)?;
    if let Some(record) = normalize(&project.path_with_namespace, mr, diffs) {
      out.push(record);
    }
  }

  Ok(out)
}

/// Flatten one merge-request summary plus its diffs into a record.
/// Returns None when the merge timestamp is absent (stale listing edge).
fn normalize(repo: &str, mr: MergeRequestSummary, diffs: Vec<String>) -> Option<ChangeRequestRecord> {
  let merged_at = mr.merged_at?;
  let repo_url = mr.web_url.split("/-/").next().unwrap_or_default().to_string();

  Some(ChangeRequestRecord {
    repo: repo.to_string(),
    repo_url,
    title: mr.title,
    url: mr.web_url,
    description: mr.description.unwrap_or_default(),
    author: mr.author.name,
    created_at: mr.created_at,
    merged_at,
    changes_count: diffs.len(),
    diffs,
    reviewers: mr.reviewers.into_iter().map(|r| r.name).collect(),
    labels: mr.labels,
    comments: mr.user_notes_count,
  })
}
