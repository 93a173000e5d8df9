// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Render a podcast script to audio: per-segment concurrent TTS, order-preserving concatenation
// role: pipeline/podcast
// inputs: A PodcastScript plus the shared speech-rate modifier
// outputs: One MP3 byte stream, or None for an empty script
// side_effects: Remote text-to-speech calls via the trait seam
// invariants:
// - Each speaker label maps to exactly one fixed voice
// - Output bytes equal the in-order concatenation of per-segment audio, whatever the completion order
// - Any single segment failure fails the whole render; no partial audio
// errors: Segment synthesis errors propagate with the segment index attached
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::io::Read;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::Config;
use crate::model::{PodcastScript, Speaker};

const VOICE_HOST_A: &str = "en-US-JennyNeural"; // Alex, the enthusiast
const VOICE_HOST_B: &str = "en-US-GuyNeural"; // Matt, the technical expert

pub fn voice_for(speaker: Speaker) -> &'static str {
  match speaker {
    Speaker::Alex => VOICE_HOST_A,
    Speaker::Matt => VOICE_HOST_B,
  }
}

// --- Trait seam for the text-to-speech interface ---
pub trait SpeechApi: Send + Sync {
  /// Synthesize one utterance with the given voice and rate modifier.
  fn synthesize(&self, text: &str, voice: &str, rate_percent: u32) -> Result<Vec<u8>>;
}

/// POSTs each utterance to an edge-tts-compatible HTTP bridge and reads the
/// audio bytes back.
pub struct SpeechHttpApi {
  agent: ureq::Agent,
  endpoint: String,
}

impl SpeechHttpApi {
  pub fn new(endpoint: String) -> Self {
    Self {
      agent: ureq::AgentBuilder::new().build(),
      endpoint,
    }
  }
}

impl SpeechApi for SpeechHttpApi {
  fn synthesize(&self, text: &str, voice: &str, rate_percent: u32) -> Result<Vec<u8>> {
    let resp = self
      .agent
      .post(&self.endpoint)
      .send_json(serde_json::json!({
        "text": text,
        "voice": voice,
        "rate": format!("+{rate_percent}%"),
      }))
      .with_context(|| format!("POST {}", self.endpoint))?;

    let mut audio = Vec::new();
    resp
      .into_reader()
      .read_to_end(&mut audio)
      .context("reading synthesized audio")?;

    Ok(audio)
  }
}

/// Echo mock: deterministic bytes derived from the inputs, so ordering and
/// voice selection stay observable end to end.
pub struct SpeechEnvApi;

impl SpeechApi for SpeechEnvApi {
  fn synthesize(&self, text: &str, voice: &str, rate_percent: u32) -> Result<Vec<u8>> {
    Ok(format!("[{voice}+{rate_percent}%]{text};").into_bytes())
  }
}

pub fn env_wants_speech_mock() -> bool {
  std::env::var("MRD_TEST_TTS_ECHO").is_ok()
}

pub fn build_speech_api(config: &Config) -> Result<Box<dyn SpeechApi>> {
  if env_wants_speech_mock() {
    return Ok(Box::new(SpeechEnvApi));
  }
  match &config.tts_url {
    Some(url) => Ok(Box::new(SpeechHttpApi::new(url.clone()))),
    None => anyhow::bail!("MRD_TTS_URL is not set; audio synthesis needs a speech endpoint"),
  }
}

pub struct PodcastSynthesizer {
  api: Box<dyn SpeechApi>,
}

impl PodcastSynthesizer {
  pub fn new(api: Box<dyn SpeechApi>) -> Self {
    Self { api }
  }

  /// Synthesize every segment concurrently and concatenate the audio in
  /// script order. Returns None for a script with no segments.
  pub fn synthesize(&self, script: &PodcastScript, rate_percent: u32) -> Result<Option<Vec<u8>>> {
    if script.segments.is_empty() {
      return Ok(None);
    }

    // One thread per segment; fan-out is bounded by script length.
    let pool = rayon::ThreadPoolBuilder::new()
      .num_threads(script.segments.len())
      .build()?;

    // par_iter keeps collection in index order regardless of which
    // synthesis call finishes first.
    let parts: Vec<Vec<u8>> = pool.install(|| {
      script
        .segments
        .par_iter()
        .enumerate()
        .map(|(idx, seg)| {
          self
            .api
            .synthesize(&seg.text, voice_for(seg.speaker), rate_percent)
            .with_context(|| format!("synthesizing segment {idx}"))
        })
        .collect::<Result<Vec<_>>>()
    })?;

    Ok(Some(parts.concat()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::PodcastSegment;
  use std::time::Duration;

  fn script(texts: &[(&str, Speaker)]) -> PodcastScript {
    PodcastScript {
      title: "Shipping News".into(),
      segments: texts
        .iter()
        .map(|(text, speaker)| PodcastSegment {
          speaker: *speaker,
          text: (*text).to_string(),
        })
        .collect(),
    }
  }

  #[test]
  fn empty_script_returns_none_without_remote_calls() {
    struct PanicSpeech;
    impl SpeechApi for PanicSpeech {
      fn synthesize(&self, _t: &str, _v: &str, _r: u32) -> Result<Vec<u8>> {
        panic!("remote touched for empty script")
      }
    }

    let synth = PodcastSynthesizer::new(Box::new(PanicSpeech));
    assert!(synth.synthesize(&script(&[]), 10).unwrap().is_none());
  }

  #[test]
  fn output_preserves_segment_order_despite_completion_order() {
    // Earlier segments sleep longer, so later ones finish first.
    struct SlowFirst;
    impl SpeechApi for SlowFirst {
      fn synthesize(&self, text: &str, _v: &str, _r: u32) -> Result<Vec<u8>> {
        let delay = match text {
          "one" => 60,
          "two" => 30,
          _ => 0,
        };
        std::thread::sleep(Duration::from_millis(delay));
        Ok(format!("{text};").into_bytes())
      }
    }

    let synth = PodcastSynthesizer::new(Box::new(SlowFirst));
    let audio = synth
      .synthesize(
        &script(&[("one", Speaker::Alex), ("two", Speaker::Matt), ("three", Speaker::Alex)]),
        10,
      )
      .unwrap()
      .unwrap();
    assert_eq!(String::from_utf8(audio).unwrap(), "one;two;three;");
  }

  #[test]
  fn speakers_map_to_their_fixed_voices() {
    assert_eq!(voice_for(Speaker::Alex), "en-US-JennyNeural");
    assert_eq!(voice_for(Speaker::Matt), "en-US-GuyNeural");

    let synth = PodcastSynthesizer::new(Box::new(SpeechEnvApi));
    let audio = synth
      .synthesize(&script(&[("hi", Speaker::Matt)]), 10)
      .unwrap()
      .unwrap();
    assert_eq!(String::from_utf8(audio).unwrap(), "[en-US-GuyNeural+10%]hi;");
  }

  #[test]
  fn one_failed_segment_fails_the_whole_render() {
    struct FailSecond;
    impl SpeechApi for FailSecond {
      fn synthesize(&self, text: &str, _v: &str, _r: u32) -> Result<Vec<u8>> {
        if text == "two" {
          anyhow::bail!("stream reset")
        }
        Ok(text.as_bytes().to_vec())
      }
    }

    let synth = PodcastSynthesizer::new(Box::new(FailSecond));
    let err = synth
      .synthesize(&script(&[("one", Speaker::Alex), ("two", Speaker::Matt)]), 10)
      .unwrap_err();
    assert!(format!("{err:#}").contains("segment 1"));
  }
}
