use chrono::NaiveDate;

use crate::model::{DigestResult, PodcastScript, SnitchEntry};

/// Display label for a merge-request URL: `!123` when the URL ends in a
/// number, a generic "MR" otherwise.
fn mr_label(url: &str) -> String {
  let tail = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
  if !tail.is_empty() && tail.chars().all(|c| c.is_ascii_digit()) {
    format!("!{tail}")
  } else {
    "MR".to_string()
  }
}

/// Downloadable Markdown report for an executive digest.
pub fn digest_markdown(digest: &DigestResult, date: NaiveDate) -> String {
  let mut out = format!("# Executive Digest - {}\n\n", date.format("%Y-%m-%d"));
  out.push_str(&format!("## Executive Summary\n{}\n\n", digest.executive_summary));

  out.push_str("## Impactful Changes\n");
  for change in &digest.impactful_changes {
    out.push_str(&format!(
      "- **[{}]({})** - {} (by {}): {}\n",
      change.title, change.url, change.context_area, change.author, change.description
    ));
  }

  out.push_str("\n## Technical Highlights\n");
  for item in &digest.technical_highlights {
    out.push_str(&format!(
      "- {} — *{}* · [{}]({})\n",
      item.description,
      item.author,
      mr_label(&item.url),
      item.url
    ));
  }

  out
}

/// Downloadable Markdown report for the snitch picks, one section per author.
pub fn snitch_markdown(entries: &[SnitchEntry], date: NaiveDate) -> String {
  let mut out = format!("# Auto Snitch - {}\n\n", date.format("%Y-%m-%d"));
  for item in entries {
    out.push_str(&format!("## [{}]({})\n", item.demo_title, item.link));
    out.push_str(&format!("**Author:** {}\n\n", item.author));
    out.push_str(&format!("**Spark score:** {}/10\n\n", item.spark_score));
    out.push_str(&format!("{}\n\n", item.description));
    out.push_str(&format!("🎵 *{}*\n\n", item.song_recommendation));
  }

  out
}

/// Plain transcript of a podcast script, one speaker-prefixed line per segment.
pub fn script_transcript(script: &PodcastScript) -> String {
  let mut out = format!("# {}\n\n", script.title);
  for seg in &script.segments {
    out.push_str(&format!("**{:?}:** {}\n\n", seg.speaker, seg.text));
  }

  out
}
