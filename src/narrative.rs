// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Turn normalized change requests into structured narratives (digest, snitch picks, podcast script)
// role: pipeline/narrative
// inputs: ChangeRequestRecord lists plus per-call knobs (timeframe label, episode length, listener role, rate)
// outputs: Option-wrapped typed results; None means "could not generate", never a crash
// side_effects: Remote generative-text calls via the trait seam; retry sleeps on transient failures
// invariants:
// - Empty record input returns None without any remote call
// - Per-record prompt context truncates concatenated diffs to 1500 chars; stored records stay untouched
// - Responses are validated against the same schema sent with the request; drift is a contract miss
// - Snitch output covers each distinct input author exactly once or is discarded
// errors: Transient (503) failures retried twice with doubling delay; other errors propagate
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::fmt;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tracing::warn;

use crate::config::Config;
use crate::model::{ChangeRequestRecord, DigestResult, PodcastScript, SnitchEntry};
use crate::schema;
use crate::util::{effective_now, truncate_chars};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-3-flash-preview";

/// Characters of concatenated diff text included per record when prompting.
const DIFF_SNIPPET_CHARS: usize = 1500;

/// Spoken-word budget per scripted minute, before the rate adjustment.
const WORDS_PER_MINUTE: u32 = 150;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

/// Marker for the one failure signal worth retrying: the service says it is
/// temporarily unavailable.
#[derive(Debug)]
pub struct TransientServiceError(pub String);

impl fmt::Display for TransientServiceError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "transient service failure: {}", self.0)
  }
}

impl std::error::Error for TransientServiceError {}

// --- Trait seam for the structured text-generation interface ---
pub trait TextGenApi: Send + Sync {
  /// One structured-output request: the response must be JSON text conforming
  /// to `schema`.
  fn generate(&self, prompt: &str, schema: &Value, temperature: f64) -> Result<String>;
}

pub struct GeminiHttpApi {
  agent: ureq::Agent,
  base_url: String,
  api_key: String,
  model: String,
}

impl GeminiHttpApi {
  pub fn new(api_key: String) -> Self {
    Self {
      agent: ureq::AgentBuilder::new().build(),
      base_url: GEMINI_BASE_URL.to_string(),
      api_key,
      model: GEMINI_MODEL.to_string(),
    }
  }
}

impl TextGenApi for GeminiHttpApi {
  fn generate(&self, prompt: &str, schema: &Value, temperature: f64) -> Result<String> {
    let url = format!(
      "{}/v1beta/models/{}:generateContent",
      self.base_url, self.model
    );
    let body = json!({
      "contents": [{"parts": [{"text": prompt}]}],
      "generationConfig": {
        "temperature": temperature,
        "topP": 0.95,
        "topK": 40,
        "maxOutputTokens": 8192,
        "responseMimeType": "application/json",
        "responseSchema": schema,
      }
    });

    let resp = match self
      .agent
      .post(&url)
      .query("key", &self.api_key)
      .send_json(body)
    {
      Ok(resp) => resp,
      Err(ureq::Error::Status(503, _)) => {
        return Err(anyhow::Error::new(TransientServiceError(
          "generation service returned 503".into(),
        )));
      }
      Err(ureq::Error::Status(code, resp)) => {
        let detail = resp.into_string().unwrap_or_default();
        bail!("generation request failed with status {code}: {}", truncate_chars(&detail, 300));
      }
      Err(e) => return Err(e).with_context(|| format!("POST {url}")),
    };

    let payload: Value = resp.into_json().context("decoding generation response")?;
    let text = payload["candidates"][0]["content"]["parts"][0]["text"]
      .as_str()
      .context("generation response carried no candidate text")?;

    Ok(text.to_string())
  }
}

// --- Env-backed mock for tests and offline runs ---
//
// Fixture selection goes by schema shape: an array schema serves the snitch
// fixture, an object schema with "segments" serves the script fixture, and
// anything else serves the digest fixture.
pub struct TextGenEnvApi;

impl TextGenApi for TextGenEnvApi {
  fn generate(&self, _prompt: &str, schema: &Value, _temperature: f64) -> Result<String> {
    let var = if schema["type"] == "array" {
      "MRD_TEST_GEN_SNITCH_JSON"
    } else if schema["properties"].get("segments").is_some() {
      "MRD_TEST_GEN_SCRIPT_JSON"
    } else {
      "MRD_TEST_GEN_DIGEST_JSON"
    };

    std::env::var(var).with_context(|| format!("{var} fixture is not set"))
  }
}

pub fn env_wants_gen_mock() -> bool {
  ["MRD_TEST_GEN_DIGEST_JSON", "MRD_TEST_GEN_SNITCH_JSON", "MRD_TEST_GEN_SCRIPT_JSON"]
    .iter()
    .any(|k| std::env::var(k).is_ok())
}

pub fn build_textgen_api(config: &Config) -> Box<dyn TextGenApi> {
  if env_wants_gen_mock() {
    Box::new(TextGenEnvApi)
  } else {
    Box::new(GeminiHttpApi::new(config.gemini_api_key.clone()))
  }
}

/// Retry wrapper: a transient failure is retried with a doubling delay,
/// anything else propagates on the spot.
fn generate_with_retry_after(
  api: &dyn TextGenApi,
  prompt: &str,
  schema: &Value,
  temperature: f64,
  base_delay: Duration,
) -> Result<String> {
  let mut delay = base_delay;

  for attempt in 1..=RETRY_ATTEMPTS {
    match api.generate(prompt, schema, temperature) {
      Ok(text) => return Ok(text),
      Err(err) => {
        let transient = err.downcast_ref::<TransientServiceError>().is_some();
        if !transient || attempt == RETRY_ATTEMPTS {
          return Err(err);
        }
        warn!(attempt, delay_secs = delay.as_secs(), "transient generation failure, retrying");
        std::thread::sleep(delay);
        delay *= 2;
      }
    }
  }

  unreachable!("retry loop returns on the final attempt")
}

fn generate_with_retry(
  api: &dyn TextGenApi,
  prompt: &str,
  schema: &Value,
  temperature: f64,
) -> Result<String> {
  generate_with_retry_after(api, prompt, schema, temperature, RETRY_BASE_DELAY)
}

/// Per-record prompt block. Diffs are concatenated then truncated; the
/// record itself keeps the full text.
fn build_context(records: &[ChangeRequestRecord]) -> String {
  let mut out = String::new();
  for rec in records {
    let snippet = truncate_chars(&rec.diffs.join("\n"), DIFF_SNIPPET_CHARS);
    out.push_str(&format!(
      "\n---\nREPO: {}\nTITLE: {}\nAUTHOR: {}\nURL: {}\nDESCRIPTION: {}\nCODE SNIPPET:\n{}\n",
      rec.repo, rec.title, rec.author, rec.url, rec.description, snippet
    ));
  }

  out
}

/// Spoken-word target for a script: minutes at a fixed pace, stretched by the
/// speech-rate modifier so faster playback still fills the requested time.
pub fn target_word_count(length_minutes: u32, rate_percent: u32) -> u32 {
  let base = length_minutes as f64 * WORDS_PER_MINUTE as f64;
  (base * (1.0 + rate_percent as f64 / 100.0)).round() as u32
}

/// Listener-role framing, passed into the script prompt verbatim.
pub fn role_framing(role: &str) -> String {
  match role {
    "Engineering Leader" => "The listener is an engineering leader. Lean into architecture, \
      trade-offs, and code-level detail; technical vocabulary is welcome. Title the episode \
      like an engineering changelog with personality."
      .to_string(),
    "Data & Analytics Leader" => "The listener is a data and analytics leader. Emphasize data \
      flows, pipelines, metrics, and measurable outcomes; translate code changes into their \
      effect on data quality and reporting. Title the episode around insight and measurement."
      .to_string(),
    "Business Leader" => "The listener is a business leader. Avoid jargon entirely; frame every \
      change as customer value, risk reduced, or time saved. Title the episode like a \
      friendly business briefing."
      .to_string(),
    other => format!(
      "The listener is {other}. Pitch tone and vocabulary to that audience, explaining \
      technical work in terms they would care about. Title the episode accordingly."
    ),
  }
}

/// Generates all three narrative shapes over one text-generation backend.
pub struct NarrativeGenerator {
  api: Box<dyn TextGenApi>,
}

impl NarrativeGenerator {
  pub fn new(api: Box<dyn TextGenApi>) -> Self {
    Self { api }
  }

  /// Executive digest for the given window. `Ok(None)` means the service
  /// answered but the payload missed the contract.
  pub fn summarize(
    &self,
    records: &[ChangeRequestRecord],
    timeframe_label: &str,
  ) -> Result<Option<DigestResult>> {
    if records.is_empty() {
      return Ok(None);
    }

    let current_date = effective_now(None).format("%B %d, %Y").to_string();
    let total = records.len();
    let context = build_context(records);

    let prompt = format!(
      r#"You are a Technical Chief of Staff. Review these Merge Requests from the {timeframe_label}
and create an "Impact Digest" for a company executive.

Today's Date: {current_date}

The executive wants to see high-level progress and interesting technical wins.

Output a strict JSON object with the following keys:
- "executive_summary": 1-2 sentences on overall velocity. Mention that {total} MRs were merged.
- "impactful_changes": A list of objects (max 5) focusing strictly on BUSINESS VALUE and USER IMPACT.
    - "title": A concise, business-friendly title summarizing the impact (do not use the raw MR title).
    - "description": A focus on the "Why" (business value).
    - "url": The MR URL.
    - "author": The MR Author's name.
    - "context_area": Inferred business area, application name, or technology (e.g. "Payments", "Frontend", "Infrastructure").
- "technical_highlights": A list of objects (up to 10) noting interesting architectural choices, refactors, or library updates.
    - "title": A short, specific title describing the technical change.
    - "description": Focus strictly on the "How" (engineering details). Do NOT repeat high-level features listed in "impactful_changes".
    - "url": The URL of the MR this change belongs to.
    - "author": The name of the author who made the change.

DATA:
{context}"#
    );

    let schema = schema::digest_schema();
    let text = generate_with_retry(self.api.as_ref(), &prompt, &schema, 0.2)?;

    Ok(decode_checked(&text, &schema, "digest"))
  }

  /// Demo picks: exactly one entry per distinct author or nothing.
  pub fn snitch(&self, records: &[ChangeRequestRecord]) -> Result<Option<Vec<SnitchEntry>>> {
    if records.is_empty() {
      return Ok(None);
    }

    let context = build_context(records);

    let prompt = format!(
      r#"You are a Team Lead preparing for the weekly engineering demo meeting.
Review these Merge Requests and identify interesting, unique, or "cool" changes that should be shared with the team.

Look for:
- New user-facing features
- Clever code techniques or refactors
- Performance improvements
- Anything that would make for a good 5-minute demo

Constraint: Output exactly one entry per distinct author present in the data. Never omit an author who merged something; never select the same author twice.

Output a strict JSON list of objects.
Each object must have the following keys:
- "author": The author's name
- "demo_title": A catchy title for the demo
- "description": A short blurb explaining what is cool/interesting.
- "song_recommendation": A song (Artist - Title) that loosely ties to the content of the demo.
- "link": The URL to the MR.
- "spark_score": An integer from 1 to 10 rating how demo-worthy this is.

DATA:
{context}"#
    );

    let schema = schema::snitch_schema();
    let text = generate_with_retry(self.api.as_ref(), &prompt, &schema, 0.4)?;

    let Some(entries) = decode_checked::<Vec<SnitchEntry>>(&text, &schema, "snitch") else {
      return Ok(None);
    };

    Ok(enforce_author_coverage(records, entries))
  }

  /// Two-host episode script sized to the requested length and framed for
  /// the listener role.
  pub fn script(
    &self,
    records: &[ChangeRequestRecord],
    length_minutes: u32,
    role: &str,
    rate_percent: u32,
  ) -> Result<Option<PodcastScript>> {
    if records.is_empty() {
      return Ok(None);
    }

    let framing = role_framing(role);
    let target_words = target_word_count(length_minutes, rate_percent);
    let context = build_context(records);

    let prompt = format!(
      r#"You are writing a two-host podcast episode reviewing recent engineering activity.
Hosts: Alex (a curious enthusiast who asks the questions) and Matt (a technical expert who explains).

{framing}

Target length: roughly {target_words} words of spoken dialogue in total.

Write an engaging back-and-forth conversation covering the most interesting work below. Open with a short intro, alternate speakers naturally, and close with a sign-off.

Output a strict JSON object with:
- "title": The episode title.
- "segments": An ordered list of objects, each with "speaker" ("Alex" or "Matt") and "text" (what they say).

DATA:
{context}"#
    );

    let schema = schema::script_schema();
    let text = generate_with_retry(self.api.as_ref(), &prompt, &schema, 0.7)?;

    Ok(decode_checked(&text, &schema, "podcast script"))
  }
}

/// Parse response text, validate against the request schema, deserialize.
/// Any miss is logged and collapses to None.
fn decode_checked<T: serde::de::DeserializeOwned>(text: &str, schema: &Value, kind: &str) -> Option<T> {
  let value: Value = match serde_json::from_str(text) {
    Ok(v) => v,
    Err(err) => {
      warn!(%err, kind, "generation response is not JSON");
      return None;
    }
  };

  if let Err(err) = schema::validate(schema, &value) {
    warn!(error = %format!("{err:#}"), kind, "generation response failed contract validation");
    return None;
  }

  serde_json::from_value(value).ok()
}

/// Drop duplicate authors, then require the remaining set to cover every
/// input author exactly. A partial report misleads more than no report.
fn enforce_author_coverage(
  records: &[ChangeRequestRecord],
  entries: Vec<SnitchEntry>,
) -> Option<Vec<SnitchEntry>> {
  let expected: std::collections::BTreeSet<&str> =
    records.iter().map(|r| r.author.as_str()).collect();

  let mut seen: std::collections::BTreeSet<String> = Default::default();
  let mut deduped = Vec::with_capacity(entries.len());
  for entry in entries {
    if seen.insert(entry.author.clone()) {
      deduped.push(entry);
    }
  }

  let got: std::collections::BTreeSet<&str> = deduped.iter().map(|e| e.author.as_str()).collect();
  if got != expected {
    warn!(
      expected = expected.len(),
      got = got.len(),
      "snitch report does not cover each author exactly once"
    );
    return None;
  }

  Some(deduped)
}
