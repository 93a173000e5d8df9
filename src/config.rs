use anyhow::{bail, Result};

/// Process-wide configuration, read once at startup.
///
/// Missing credentials are startup-fatal; they are never retried or patched
/// over mid-run.
#[derive(Debug, Clone)]
pub struct Config {
  pub gitlab_url: String,
  pub gitlab_token: String,
  /// Optional top-level group to scope the project directory to.
  pub group_id: Option<String>,
  pub gemini_api_key: String,
  /// Optional text-to-speech endpoint override.
  pub tts_url: Option<String>,
}

fn required(name: &str) -> Result<String> {
  match std::env::var(name) {
    Ok(v) if !v.trim().is_empty() => Ok(v),
    _ => bail!("{name} is not set; configure it in the environment before starting"),
  }
}

fn optional(name: &str) -> Option<String> {
  std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
  pub fn from_env() -> Result<Config> {
    Ok(Config {
      gitlab_url: required("GITLAB_URL")?,
      gitlab_token: required("GITLAB_TOKEN")?,
      group_id: optional("COMPANY_GROUP_ID"),
      gemini_api_key: required("GEMINI_API_KEY")?,
      tts_url: optional("MRD_TTS_URL"),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  fn set_base_env() {
    std::env::set_var("GITLAB_URL", "https://gitlab.example.com");
    std::env::set_var("GITLAB_TOKEN", "glpat-test");
    std::env::set_var("GEMINI_API_KEY", "key-test");
    std::env::remove_var("COMPANY_GROUP_ID");
    std::env::remove_var("MRD_TTS_URL");
  }

  #[test]
  #[serial]
  fn from_env_reads_all_fields() {
    set_base_env();
    std::env::set_var("COMPANY_GROUP_ID", "42");
    let cfg = Config::from_env().unwrap();
    assert_eq!(cfg.gitlab_url, "https://gitlab.example.com");
    assert_eq!(cfg.group_id.as_deref(), Some("42"));
    assert!(cfg.tts_url.is_none());
  }

  #[test]
  #[serial]
  fn missing_api_key_is_fatal() {
    set_base_env();
    std::env::remove_var("GEMINI_API_KEY");
    let err = Config::from_env().unwrap_err();
    assert!(format!("{err:#}").contains("GEMINI_API_KEY"));
  }

  #[test]
  #[serial]
  fn blank_values_count_as_missing() {
    set_base_env();
    std::env::set_var("GITLAB_TOKEN", "   ");
    assert!(Config::from_env().is_err());
  }
}
