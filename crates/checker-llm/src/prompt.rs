//! Prompt construction and completion parsing.
//!
//! Prompts only ever see an allow-listed projection of round and
//! application metadata, shrunk to a byte budget. Responses are parsed into
//! the typed shapes the rest of the system consumes.

use std::collections::HashSet;

use checker_core::{
  Error, Result,
  evaluation::SummaryInput,
  reasoner::{ApplicationSnapshot, RoundSnapshot},
};
use serde_json::{Map, Value};

use crate::json::{self, Kind};

/// Round metadata fields a prompt may see.
const ROUND_FIELDS: &[&str] = &["name", "roundType", "eligibility"];

/// Project fields (under `application.project`) a prompt may see.
const PROJECT_FIELDS: &[&str] = &[
  "title",
  "description",
  "website",
  "projectTwitter",
  "projectGithub",
  "userGithub",
];

pub const ROUND_BUDGET_BYTES: usize = 2_000;
pub const APPLICATION_BUDGET_BYTES: usize = 6_000;

/// Questions requested per generated rubric.
pub const RUBRIC_SIZE: usize = 5;

// ─── Sanitisation ────────────────────────────────────────────────────────────

fn pick(source: &Value, fields: &[&str]) -> Map<String, Value> {
  fields
    .iter()
    .filter_map(|f| source.get(*f).map(|v| ((*f).to_owned(), v.clone())))
    .collect()
}

/// The allow-listed projection of round metadata, within `budget` bytes.
pub fn sanitize_round(metadata: &Value, budget: usize) -> Value {
  let mut value = Value::Object(pick(metadata, ROUND_FIELDS));
  fit_to_budget(&mut value, budget);
  value
}

/// The allow-listed projection of application metadata, within `budget`
/// bytes: the project's descriptive fields plus the applicant's plaintext
/// answers to visible questions.
pub fn sanitize_application(metadata: &Value, budget: usize) -> Value {
  let application = metadata.get("application").unwrap_or(&Value::Null);

  let project = application
    .get("project")
    .map(|p| Value::Object(pick(p, PROJECT_FIELDS)))
    .unwrap_or_else(|| Value::Object(Map::new()));

  let answers: Vec<Value> = application
    .get("answers")
    .and_then(Value::as_array)
    .map(|answers| {
      answers
        .iter()
        .filter(|a| !a.get("hidden").and_then(Value::as_bool).unwrap_or(false))
        .filter(|a| a.get("encryptedAnswer").is_none())
        .filter_map(|a| {
          let question = a.get("question")?.clone();
          let answer = a.get("answer")?.clone();
          let mut entry = Map::new();
          entry.insert("question".into(), question);
          entry.insert("answer".into(), answer);
          Some(Value::Object(entry))
        })
        .collect()
    })
    .unwrap_or_default();

  let mut out = Map::new();
  out.insert("project".into(), project);
  out.insert("answers".into(), Value::Array(answers));

  let mut value = Value::Object(out);
  fit_to_budget(&mut value, budget);
  value
}

/// Drop characters from the end of the longest string leaf until the
/// serialised value fits in `budget` bytes. Structure is never cut, so the
/// result stays well-formed JSON.
pub fn fit_to_budget(value: &mut Value, budget: usize) {
  loop {
    let size = serialized_len(value);
    if size <= budget {
      return;
    }
    let Some(longest) = longest_leaf(value) else {
      return;
    };
    if longest.is_empty() {
      return;
    }

    let mut dropped = 0;
    while dropped < size - budget {
      match longest.pop() {
        Some(c) => dropped += c.len_utf8(),
        None => break,
      }
    }
  }
}

fn serialized_len(value: &Value) -> usize {
  serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}

fn longest_leaf(value: &mut Value) -> Option<&mut String> {
  match value {
    Value::String(s) => Some(s),
    Value::Array(items) => items
      .iter_mut()
      .filter_map(longest_leaf)
      .max_by_key(|s| s.len()),
    Value::Object(map) => map
      .values_mut()
      .filter_map(longest_leaf)
      .max_by_key(|s| s.len()),
    _ => None,
  }
}

fn pretty(value: &Value) -> String {
  serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// ─── Prompts ─────────────────────────────────────────────────────────────────

pub fn questions_prompt(round: &RoundSnapshot) -> String {
  let round = sanitize_round(&round.round_metadata, ROUND_BUDGET_BYTES);
  format!(
    "Given the following description of a Gitcoin Grants round, generate \
     {RUBRIC_SIZE} evaluation questions that a reviewer can answer with \
     'Yes', 'No', or 'Uncertain'. The questions should help assess the \
     projects in this round. Focus on project impact, feasibility, team \
     capabilities and alignment with the goals of the round. Each question \
     must be clear, concise and answerable with one of the three responses.\n\n\
     Round description:\n{}\n\n\
     Examples of the expected format (do not reuse them):\n\
     - This project must be open source.\n\
     - Projects must conduct research that helps public goods.\n\n\
     Return the evaluation questions as a JSON array of strings and nothing else.",
    pretty(&round),
  )
}

pub fn evaluation_prompt(rubric: &[String], snapshot: &ApplicationSnapshot) -> String {
  let round = sanitize_round(&snapshot.round.round_metadata, ROUND_BUDGET_BYTES);
  let application = sanitize_application(&snapshot.metadata, APPLICATION_BUDGET_BYTES);

  let questions: String = rubric
    .iter()
    .enumerate()
    .map(|(i, q)| format!("{i}. {q}\n"))
    .collect();

  format!(
    "Evaluate the following grant application against each question below, \
     using the round and application details.\n\n\
     Round:\n{}\n\n\
     Application:\n{}\n\n\
     Questions:\n{questions}\n\
     Answer every question. Use answerEnum 0 for yes, 1 for no and 2 for \
     uncertain. Keep the summary under 800 characters.\n\
     Respond with ONLY this JSON structure and nothing else:\n\
     {{\"questions\": [{{\"questionIndex\": <number>, \"answerEnum\": <0|1|2>}}], \
     \"summary\": \"<string>\"}}",
    pretty(&round),
    pretty(&application),
  )
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Parse a rubric out of a completion: the first JSON array of strings,
/// with `N. ` enumeration prefixes stripped and blank entries dropped.
pub fn parse_questions(text: &str) -> Result<Vec<String>> {
  let value = json::extract(text, Kind::Array)?;
  let items = value
    .as_array()
    .ok_or_else(|| Error::Parse("rubric is not an array".into()))?;

  let mut questions = Vec::with_capacity(items.len());
  for item in items {
    let text = item
      .as_str()
      .ok_or_else(|| Error::Parse(format!("rubric entry is not a string: {item}")))?;
    let question = strip_enumeration(text);
    if !question.is_empty() {
      questions.push(question.to_owned());
    }
  }

  if questions.is_empty() {
    return Err(Error::Parse("rubric contains no questions".into()));
  }
  Ok(questions)
}

fn strip_enumeration(text: &str) -> &str {
  let text = text.trim();
  let digits = text.bytes().take_while(u8::is_ascii_digit).count();
  if digits == 0 {
    return text;
  }
  match text[digits..].strip_prefix('.') {
    Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
      rest.trim_start()
    }
    _ => text,
  }
}

/// Parse an evaluation out of a completion and check it against a rubric of
/// `rubric_len` questions.
pub fn parse_evaluation(text: &str, rubric_len: usize) -> Result<SummaryInput> {
  let value = json::extract(text, Kind::Object)?;
  let summary: SummaryInput = serde_json::from_value(value)
    .map_err(|e| Error::Parse(format!("unexpected evaluation shape: {e}")))?;

  let mut seen = HashSet::new();
  for answer in &summary.questions {
    if answer.question_index as usize >= rubric_len {
      return Err(Error::Parse(format!(
        "question index {} outside rubric of {rubric_len}",
        answer.question_index
      )));
    }
    if !seen.insert(answer.question_index) {
      return Err(Error::Parse(format!(
        "question index {} answered twice",
        answer.question_index
      )));
    }
    if !(0..=2).contains(&answer.answer_enum) {
      return Err(Error::Parse(format!(
        "answer code {} for question {} is not 0, 1 or 2",
        answer.answer_enum, answer.question_index
      )));
    }
  }

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn round_projection_keeps_only_allowed_fields() {
    let metadata = json!({
      "name": "Climate Round",
      "roundType": "public",
      "eligibility": { "description": "climate projects" },
      "programContractAddress": "0xdead",
      "support": { "info": "a@b.c", "type": "email" }
    });
    let out = sanitize_round(&metadata, 10_000);
    assert_eq!(
      out,
      json!({
        "name": "Climate Round",
        "roundType": "public",
        "eligibility": { "description": "climate projects" }
      })
    );
  }

  #[test]
  fn application_projection_drops_hidden_and_encrypted_answers() {
    let metadata = json!({
      "signature": "0xsig",
      "application": {
        "recipient": "0xabc",
        "project": {
          "title": "Solar",
          "description": "panels",
          "owners": [{ "address": "0x1" }],
          "logoImg": "cid"
        },
        "answers": [
          { "question": "Email?", "hidden": true, "answer": "a@b.c" },
          { "question": "Secret?", "hidden": false,
            "encryptedAnswer": { "ciphertext": "x", "encryptedSymmetricKey": "y" } },
          { "question": "Team size?", "hidden": false, "answer": "4" }
        ]
      }
    });
    let out = sanitize_application(&metadata, 10_000);
    assert_eq!(
      out,
      json!({
        "project": { "title": "Solar", "description": "panels" },
        "answers": [{ "question": "Team size?", "answer": "4" }]
      })
    );
  }

  #[test]
  fn budget_trims_longest_string_and_keeps_json_valid() {
    let mut value = json!({
      "short": "keep me",
      "long": "x".repeat(5_000),
      "list": ["y".repeat(100)]
    });
    fit_to_budget(&mut value, 500);

    let text = serde_json::to_string(&value).unwrap();
    assert!(text.len() <= 500);
    assert_eq!(value["short"], json!("keep me"));
    assert_eq!(value["list"][0].as_str().unwrap().len(), 100);
    assert!(serde_json::from_str::<Value>(&text).is_ok());
  }

  #[test]
  fn budget_handles_multibyte_characters() {
    let mut value = json!({ "d": "é".repeat(1_000) });
    fit_to_budget(&mut value, 101);
    assert!(serde_json::to_string(&value).unwrap().len() <= 101);
  }

  #[test]
  fn value_within_budget_is_untouched() {
    let mut value = json!({ "a": "b" });
    fit_to_budget(&mut value, 100);
    assert_eq!(value, json!({ "a": "b" }));
  }

  #[test]
  fn questions_strip_enumeration() {
    let text = r#"Here: ["1. Is it open source?", "2.  Does it ship?", "Has a team?", "  "]"#;
    let questions = parse_questions(text).unwrap();
    assert_eq!(
      questions,
      vec!["Is it open source?", "Does it ship?", "Has a team?"]
    );
  }

  #[test]
  fn enumeration_needs_a_dot_and_space() {
    assert_eq!(strip_enumeration("2024 goals met?"), "2024 goals met?");
    assert_eq!(strip_enumeration("3.5 stars?"), "3.5 stars?");
    assert_eq!(strip_enumeration("10. Scale?"), "Scale?");
  }

  #[test]
  fn empty_rubric_is_a_parse_failure() {
    assert!(matches!(parse_questions("[]"), Err(Error::Parse(_))));
    assert!(matches!(parse_questions("no list here"), Err(Error::Parse(_))));
    assert!(matches!(parse_questions("[1, 2]"), Err(Error::Parse(_))));
  }

  #[test]
  fn evaluation_parses_from_prose() {
    let text = r#"Result:
{"questions": [{"questionIndex": 0, "answerEnum": 0}, {"questionIndex": 1, "answerEnum": 2}],
 "summary": "Strong fit."}"#;
    let parsed = parse_evaluation(text, 2).unwrap();
    assert_eq!(parsed.questions.len(), 2);
    assert_eq!(parsed.questions[1].answer_enum, 2);
    assert_eq!(parsed.summary, "Strong fit.");
  }

  #[test]
  fn evaluation_rejects_out_of_range_index() {
    let text = r#"{"questions": [{"questionIndex": 5, "answerEnum": 0}], "summary": ""}"#;
    assert!(matches!(parse_evaluation(text, 5), Err(Error::Parse(_))));
  }

  #[test]
  fn evaluation_rejects_unknown_answer_code() {
    let text = r#"{"questions": [{"questionIndex": 0, "answerEnum": 3}], "summary": ""}"#;
    assert!(matches!(parse_evaluation(text, 1), Err(Error::Parse(_))));
  }

  #[test]
  fn evaluation_rejects_duplicate_index() {
    let text = r#"{"questions": [{"questionIndex": 0, "answerEnum": 0},
                                 {"questionIndex": 0, "answerEnum": 1}], "summary": ""}"#;
    assert!(matches!(parse_evaluation(text, 2), Err(Error::Parse(_))));
  }

  #[test]
  fn evaluation_rejects_wrong_shape() {
    let text = r#"{"score": 80, "feedback": "good"}"#;
    assert!(matches!(parse_evaluation(text, 2), Err(Error::Parse(_))));
  }
}
