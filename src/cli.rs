use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Parser;

use crate::window::Timeframe;

#[derive(Parser, Debug)]
#[command(
  name = "mr-digest",
  version,
  about = "Digest merged GitLab activity into summaries, demo picks, and podcast audio",
  long_about = None
)]
pub struct Cli {
  /// Repository path (namespace/project); repeatable. Default: every project
  /// visible to the token (optionally narrowed by --filter).
  #[arg(long)]
  pub repo: Vec<String>,

  /// Case-insensitive substring filter on repository paths
  #[arg(long)]
  pub filter: Option<String>,

  /// Print the resolved project directory and exit
  #[arg(long)]
  pub list_projects: bool,

  /// Reporting window preset
  #[arg(long, value_enum, default_value_t = Timeframe::LastFullWorkWeek)]
  pub timeframe: Timeframe,

  /// Custom window start date (requires --timeframe custom-range)
  #[arg(long, alias = "start")]
  pub since: Option<NaiveDate>,

  /// Custom window end date, inclusive (requires --timeframe custom-range)
  #[arg(long, alias = "end")]
  pub until: Option<NaiveDate>,

  /// Generate the executive digest (default action)
  #[arg(long)]
  pub digest: bool,

  /// Generate the auto-snitch demo picks
  #[arg(long)]
  pub snitch: bool,

  /// Generate a podcast script (and audio with --audio-out)
  #[arg(long)]
  pub podcast: bool,

  /// Podcast episode length in minutes
  #[arg(long, default_value_t = 5)]
  pub length: u32,

  /// Listener role framing for the podcast
  #[arg(long, default_value = "Data & Analytics Leader")]
  pub role: String,

  /// Speech-rate modifier in percent
  #[arg(long, default_value_t = 10)]
  pub rate: u32,

  /// Write synthesized podcast audio (MP3) to this file
  #[arg(long)]
  pub audio_out: Option<String>,

  /// Report output: file path, or "-" for stdout
  #[arg(long, default_value = "-")]
  pub out: String,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  /// Override the "now" instant for window resolution (hidden; tests only)
  #[arg(long = "now-override", hide = true)]
  pub now_override: Option<String>,
}

#[derive(Debug)]
pub struct EffectiveConfig {
  pub repos: Vec<String>,
  pub filter: Option<String>,
  pub list_projects: bool,
  pub timeframe: Timeframe,
  pub custom_start: Option<NaiveDate>,
  pub custom_end: Option<NaiveDate>,
  pub digest: bool,
  pub snitch: bool,
  pub podcast: bool,
  pub length_minutes: u32,
  pub role: String,
  pub rate_percent: u32,
  pub audio_out: Option<String>,
  pub out: String,
  pub now_override: Option<String>,
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  // Validate window selection before anything touches the network.
  match cli.timeframe {
    Timeframe::CustomRange => {
      if cli.since.is_none() || cli.until.is_none() {
        bail!("--timeframe custom-range requires both --since and --until");
      }
    }
    _ => {
      if cli.since.is_some() || cli.until.is_some() {
        bail!("--since/--until only apply with --timeframe custom-range");
      }
    }
  }

  if cli.audio_out.is_some() && !cli.podcast {
    bail!("--audio-out requires --podcast");
  }

  if cli.length == 0 {
    bail!("--length must be at least 1 minute");
  }

  // No action chosen means the digest, the common case.
  let digest = cli.digest || (!cli.snitch && !cli.podcast && !cli.list_projects);

  Ok(EffectiveConfig {
    repos: cli.repo,
    filter: cli.filter,
    list_projects: cli.list_projects,
    timeframe: cli.timeframe,
    custom_start: cli.since,
    custom_end: cli.until,
    digest,
    snitch: cli.snitch,
    podcast: cli.podcast,
    length_minutes: cli.length,
    role: cli.role,
    rate_percent: cli.rate,
    audio_out: cli.audio_out,
    out: cli.out,
    now_override: cli.now_override,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn base_cli() -> Cli {
    Cli {
      repo: vec![],
      filter: None,
      list_projects: false,
      timeframe: Timeframe::LastFullWorkWeek,
      since: None,
      until: None,
      digest: false,
      snitch: false,
      podcast: false,
      length: 5,
      role: "Data & Analytics Leader".into(),
      rate: 10,
      audio_out: None,
      out: "-".into(),
      gen_man: false,
      now_override: None,
    }
  }

  #[test]
  fn no_action_defaults_to_digest() {
    let cfg = normalize(base_cli()).unwrap();
    assert!(cfg.digest);
    assert!(!cfg.snitch && !cfg.podcast);
  }

  #[test]
  fn explicit_snitch_does_not_imply_digest() {
    let mut cli = base_cli();
    cli.snitch = true;
    let cfg = normalize(cli).unwrap();
    assert!(cfg.snitch);
    assert!(!cfg.digest);
  }

  #[test]
  fn custom_range_requires_both_dates() {
    let mut cli = base_cli();
    cli.timeframe = Timeframe::CustomRange;
    cli.since = Some(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    assert!(normalize(cli).is_err());
  }

  #[test]
  fn preset_rejects_stray_custom_dates() {
    let mut cli = base_cli();
    cli.until = Some(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
    assert!(normalize(cli).is_err());
  }

  #[test]
  fn audio_out_requires_podcast() {
    let mut cli = base_cli();
    cli.audio_out = Some("episode.mp3".into());
    assert!(normalize(cli).is_err());

    let mut cli = base_cli();
    cli.podcast = true;
    cli.audio_out = Some("episode.mp3".into());
    assert!(normalize(cli).is_ok());
  }
}
