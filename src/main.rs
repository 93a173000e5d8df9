use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use mr_digest::cli::{normalize, Cli, EffectiveConfig};
use mr_digest::pipeline::DigestPipeline;
use mr_digest::window::resolve_window;
use mr_digest::{render, util};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  if cli.gen_man {
    let page = util::render_man_page::<Cli>()?;
    print!("{}", page);
    return Ok(());
  }

  // Phase 1: normalize CLI
  let cfg = normalize(cli)?;

  // Phase 2: wire backends and resolve scope
  let now_opt = util::parse_now_override(cfg.now_override.as_deref());
  let pipeline = DigestPipeline::from_env()?;

  if cfg.list_projects {
    for name in pipeline.project_names(cfg.filter.as_deref())? {
      println!("{name}");
    }
    return Ok(());
  }

  let window = resolve_window(cfg.timeframe, cfg.custom_start, cfg.custom_end, now_opt)?;
  let repos = if cfg.repos.is_empty() {
    pipeline.project_names(cfg.filter.as_deref())?
  } else {
    cfg.repos.clone()
  };

  // Phase 3: fetch, with completion-order progress on stderr
  let progress = |fraction: f32, message: &str| {
    eprintln!("[{:>3.0}%] {message}", fraction * 100.0);
  };
  let records = pipeline.fetch_merge_requests(&repos, &window, Some(&progress))?;
  eprintln!(
    "{} merged change request(s) across {} repositories ({} .. {})",
    records.len(),
    repos.len(),
    window.start_iso(),
    window.end_iso()
  );

  // Phase 4: generate the requested reports
  let report = build_report(&pipeline, &cfg, &records, now_opt)?;
  write_output(&cfg.out, &report)?;

  Ok(())
}

fn build_report(
  pipeline: &DigestPipeline,
  cfg: &EffectiveConfig,
  records: &[mr_digest::ChangeRequestRecord],
  now_opt: Option<chrono::DateTime<chrono::Local>>,
) -> Result<String> {
  let today = util::effective_now(now_opt).date_naive();
  let mut report = String::new();

  if cfg.digest {
    match pipeline.summarize(records, cfg.timeframe.label()) {
      Ok(Some(digest)) => report.push_str(&render::digest_markdown(&digest, today)),
      Ok(None) => report.push_str("_No digest: nothing merged in the window or generation declined._\n"),
      Err(err) => {
        warn!(error = %format!("{err:#}"), "digest generation failed");
        report.push_str("_Digest could not be generated; see logs._\n");
      }
    }
  }

  if cfg.snitch {
    if !report.is_empty() {
      report.push('\n');
    }
    match pipeline.snitch(records) {
      Ok(Some(entries)) => report.push_str(&render::snitch_markdown(&entries, today)),
      Ok(None) => report.push_str("_No snitch report: nothing merged or the picks missed the contract._\n"),
      Err(err) => {
        warn!(error = %format!("{err:#}"), "snitch generation failed");
        report.push_str("_Snitch report could not be generated; see logs._\n");
      }
    }
  }

  if cfg.podcast {
    if !report.is_empty() {
      report.push('\n');
    }
    match pipeline.script(records, cfg.length_minutes, &cfg.role, cfg.rate_percent) {
      Ok(Some(script)) => {
        report.push_str(&render::script_transcript(&script));
        if let Some(path) = &cfg.audio_out {
          match pipeline.synthesize_podcast_audio(&script, cfg.rate_percent)? {
            Some(audio) => {
              std::fs::write(path, audio).with_context(|| format!("writing audio to {path}"))?;
              eprintln!("wrote podcast audio to {path}");
            }
            None => eprintln!("script had no segments; no audio written"),
          }
        }
      }
      Ok(None) => report.push_str("_No podcast script: nothing merged in the window or generation declined._\n"),
      Err(err) => {
        warn!(error = %format!("{err:#}"), "script generation failed");
        report.push_str("_Podcast script could not be generated; see logs._\n");
      }
    }
  }

  Ok(report)
}

fn write_output(out: &str, content: &str) -> Result<()> {
  if out == "-" {
    print!("{content}");
    return Ok(());
  }
  std::fs::write(out, content).with_context(|| format!("writing report to {out}"))
}
