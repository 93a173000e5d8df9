// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: JSON Schema contracts for AI-generated payloads (digest, snitch, podcast script)
// role: contracts/schema
// outputs: Schema documents plus a validate helper shared by request building and response checking
// invariants:
// - The schema sent with a generation request is the same document the response is validated against
// - additionalProperties stays false; the model must not smuggle extra fields through
// errors: Validation failures carry the first offending path; callers map them to a contract miss
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

/// Executive digest: a summary plus bounded lists of changes worth reading.
pub fn digest_schema() -> Value {
  json!({
    "type": "object",
    "properties": {
      "executive_summary": {"type": "string"},
      "impactful_changes": {
        "type": "array",
        "maxItems": 5,
        "items": {
          "type": "object",
          "properties": {
            "title": {"type": "string"},
            "description": {"type": "string"},
            "url": {"type": "string"},
            "author": {"type": "string"},
            "context_area": {"type": "string"}
          },
          "required": ["title", "description", "url", "author", "context_area"],
          "additionalProperties": false
        }
      },
      "technical_highlights": {
        "type": "array",
        "maxItems": 10,
        "items": {
          "type": "object",
          "properties": {
            "title": {"type": "string"},
            "description": {"type": "string"},
            "url": {"type": "string"},
            "author": {"type": "string"}
          },
          "required": ["title", "description", "url", "author"],
          "additionalProperties": false
        }
      }
    },
    "required": ["executive_summary", "impactful_changes", "technical_highlights"],
    "additionalProperties": false
  })
}

/// Snitch report: one pick per distinct author, scored 1-10.
pub fn snitch_schema() -> Value {
  json!({
    "type": "array",
    "items": {
      "type": "object",
      "properties": {
        "author": {"type": "string"},
        "demo_title": {"type": "string"},
        "description": {"type": "string"},
        "song_recommendation": {"type": "string"},
        "link": {"type": "string"},
        "spark_score": {"type": "integer", "minimum": 1, "maximum": 10}
      },
      "required": ["author", "demo_title", "description", "song_recommendation", "link", "spark_score"],
      "additionalProperties": false
    }
  })
}

/// Two-host podcast script: title plus an ordered list of spoken segments.
pub fn script_schema() -> Value {
  json!({
    "type": "object",
    "properties": {
      "title": {"type": "string"},
      "segments": {
        "type": "array",
        "items": {
          "type": "object",
          "properties": {
            "speaker": {"type": "string", "enum": ["Alex", "Matt"]},
            "text": {"type": "string"}
          },
          "required": ["speaker", "text"],
          "additionalProperties": false
        }
      }
    },
    "required": ["title", "segments"],
    "additionalProperties": false
  })
}

/// Validate `instance` against `schema`, reporting the first violation.
pub fn validate(schema: &Value, instance: &Value) -> Result<()> {
  let validator = jsonschema::validator_for(schema)
    .map_err(|e| anyhow!("schema document is itself invalid: {e}"))?;

  validator
    .validate(instance)
    .map_err(|e| anyhow!("payload violates contract at {}: {e}", e.instance_path))
}
