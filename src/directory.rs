use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::cache::TtlCell;
use crate::gitlab_api::GitlabApi;
use crate::model::ProjectRef;

/// Directory listing TTL; the set of repositories changes rarely.
const DIRECTORY_TTL: Duration = Duration::from_secs(3600);

/// Resolves repository names against a cached directory listing.
///
/// Scoped to a top-level group (nested subgroups included) when one is
/// configured, otherwise to projects the token holder is a member of.
pub struct ProjectDirectory {
  api: Arc<dyn GitlabApi>,
  group_id: Option<String>,
  listing: TtlCell<Vec<ProjectRef>>,
}

impl ProjectDirectory {
  pub fn new(api: Arc<dyn GitlabApi>, group_id: Option<String>) -> Self {
    Self {
      api,
      group_id,
      listing: TtlCell::new(DIRECTORY_TTL),
    }
  }

  /// The full directory listing, refreshed at most once per TTL.
  pub fn all_projects(&self) -> Result<Vec<ProjectRef>> {
    self.listing.get_or_init(|| match &self.group_id {
      Some(group) => self.api.list_group_projects(group),
      None => self.api.list_member_projects(),
    })
  }

  /// Sorted project names, optionally filtered by a case-insensitive
  /// substring on the path.
  pub fn project_names(&self, filter: Option<&str>) -> Result<Vec<String>> {
    let needle = filter.map(str::to_lowercase);
    let mut names: Vec<String> = self
      .all_projects()?
      .into_iter()
      .map(|p| p.path_with_namespace)
      .filter(|name| match &needle {
        Some(f) => name.to_lowercase().contains(f),
        None => true,
      })
      .collect();
    names.sort();

    Ok(names)
  }

  /// Resolve names to directory entries. Unknown names are silently
  /// skipped; the listing may be up to a TTL stale.
  pub fn resolve(&self, names: &[String]) -> Result<Vec<ProjectRef>> {
    let listing = self.all_projects()?;

    Ok(
      names
        .iter()
        .filter_map(|name| listing.iter().find(|p| &p.path_with_namespace == name).cloned())
        .collect(),
    )
  }
}
