// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Define the JSON model (change requests, digests, snitch picks, podcast scripts) shared by the pipeline
// role: model/types
// outputs: Serializable structs with stable field names
// invariants: Field names match the upstream GitLab/AI wire shapes; created_at <= merged_at per record; additive fields only
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use serde::{Deserialize, Serialize};

/// One entry of the project directory: a repository path and its opaque id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProjectRef {
  pub id: u64,
  pub path_with_namespace: String,
}

/// One normalized merged change request.
///
/// `diffs` holds the full per-file diff text; truncation to a bounded prefix
/// happens only when building prompts, never here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChangeRequestRecord {
  pub repo: String,
  pub repo_url: String,
  pub title: String,
  pub url: String,
  pub description: String,
  pub author: String,
  pub created_at: String,
  pub merged_at: String,
  pub changes_count: usize,
  pub diffs: Vec<String>,
  pub reviewers: Vec<String>,
  pub labels: Vec<String>,
  pub comments: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImpactfulChange {
  pub title: String,
  pub description: String,
  pub url: String,
  pub author: String,
  pub context_area: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TechnicalHighlight {
  pub title: String,
  pub description: String,
  pub url: String,
  pub author: String,
}

/// Structured executive digest: summary plus at most 5 impactful changes and
/// at most 10 technical highlights.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DigestResult {
  pub executive_summary: String,
  pub impactful_changes: Vec<ImpactfulChange>,
  pub technical_highlights: Vec<TechnicalHighlight>,
}

/// One demo pick per distinct author, with a 1-10 spark score.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SnitchEntry {
  pub author: String,
  pub demo_title: String,
  pub description: String,
  pub song_recommendation: String,
  pub link: String,
  pub spark_score: u8,
}

/// The two fixed podcast hosts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
  Alex,
  Matt,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PodcastSegment {
  pub speaker: Speaker,
  pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PodcastScript {
  pub title: String,
  pub segments: Vec<PodcastSegment>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn record_round_trips_with_stable_field_names() {
    let rec = ChangeRequestRecord {
      repo: "team/app".into(),
      repo_url: "https://gitlab.example.com/team/app".into(),
      title: "Add retries".into(),
      url: "https://gitlab.example.com/team/app/-/merge_requests/7".into(),
      description: "".into(),
      author: "Ada".into(),
      created_at: "2025-08-01T09:00:00Z".into(),
      merged_at: "2025-08-02T10:00:00Z".into(),
      changes_count: 2,
      diffs: vec!["diff --git a b".into()],
      reviewers: vec!["Grace".into()],
      labels: vec!["backend".into()],
      comments: 3,
    };
    let v = serde_json::to_value(&rec).unwrap();
    assert_eq!(v["repo"], "team/app");
    assert_eq!(v["changes_count"], 2);
    assert_eq!(v["comments"], 3);
    let back: ChangeRequestRecord = serde_json::from_value(v).unwrap();
    assert_eq!(back, rec);
  }

  #[test]
  fn speaker_serializes_as_host_name() {
    assert_eq!(serde_json::to_value(Speaker::Alex).unwrap(), "Alex");
    assert_eq!(serde_json::to_value(Speaker::Matt).unwrap(), "Matt");
    let s: Speaker = serde_json::from_str("\"Matt\"").unwrap();
    assert_eq!(s, Speaker::Matt);
  }
}
