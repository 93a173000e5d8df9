use assert_cmd::Command;

/// Command wired against the env-mock backends: one project ("team/app")
/// with a single merged MR authored by Ada.
#[allow(dead_code)]
pub fn mocked_cmd() -> Command {
  let mut cmd = Command::cargo_bin("mr-digest").unwrap();

  cmd.env("GITLAB_URL", "https://gitlab.example.com");
  cmd.env("GITLAB_TOKEN", "glpat-test");
  cmd.env("GEMINI_API_KEY", "key-test");

  cmd.env(
    "MRD_TEST_GITLAB_PROJECTS_JSON",
    serde_json::json!([{"id": 7, "path_with_namespace": "team/app"}]).to_string(),
  );
  cmd.env(
    "MRD_TEST_GITLAB_MRS_JSON",
    serde_json::json!({
      "7": [{
        "iid": 12,
        "title": "Speed up imports",
        "web_url": "https://gitlab.example.com/team/app/-/merge_requests/12",
        "description": "Streams the CSV instead of buffering it",
        "author": {"name": "Ada", "username": "ada"},
        "created_at": "2025-08-02T09:00:00Z",
        "merged_at": "2025-08-03T10:00:00Z",
        "labels": ["backend"],
        "user_notes_count": 2,
        "reviewers": [{"name": "Grace"}]
      }]
    })
    .to_string(),
  );
  cmd.env("MRD_TEST_GITLAB_DIFFS_JSON", "[\"@@ -1 +1 @@ streaming\"]");

  cmd
}

/// Deterministic window flags: custom range plus a pinned "now".
#[allow(dead_code)]
pub fn window_args(cmd: &mut Command) {
  cmd.args([
    "--timeframe",
    "custom-range",
    "--since",
    "2025-08-01",
    "--until",
    "2025-08-07",
    "--now-override",
    "2025-08-15T12:00:00",
  ]);
}
