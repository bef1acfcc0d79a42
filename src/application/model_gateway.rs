//! Protocol around the language model: what is asked, what shape of answer
//! is accepted, and how unusable answers degrade.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::errors::ModelError;
use crate::domain::ports::{LanguageModel, ModelRequest};

use super::replies::DraftSummary;

const EXTRACTION_INSTRUCTION: &str = r#"You are an assistant that parses grocery-ordering requests. The user will type something like:
  "I want two Jesa Milk (2L) and three Nido Milk Powder (500g)."
Return a JSON array of objects, each with exactly two fields:
  "name": <exact product name string>,
  "quantity": <integer>.

If the user mentions a product but does not specify a number, assume quantity=1.
Examples:
- Input: "I want Jesa Milk (2L) and one Coca-Cola (330ml)"
  -> Output: [{"name":"Jesa Milk (2L)","quantity":1},{"name":"Coca-Cola (330ml)","quantity":1}]
- Input: "Give me two Lipton Black Tea (50g) and Detergent Powder (2kg)"
  -> Output: [{"name":"Lipton Black Tea (50g)","quantity":2},{"name":"Detergent Powder (2kg)","quantity":1}]
- Input: "I need 5 bread loaves"
  -> Output: [{"name":"bread loaves","quantity":5}]
- Input: "I would like to buy toothpaste"
  -> Output: [{"name":"toothpaste","quantity":1}]
- If you cannot find any product names (e.g. "What is biology?"), return an empty JSON array: [].
Return only the JSON array."#;

const COMPOSITION_INSTRUCTION: &str = "You write short, friendly order summaries for a grocery pickup service. \
Use exactly the item names, quantities and amounts you are given; never add, drop or change a number. \
Do not mention a transport fee or a grand total. \
End with a yes/no question asking whether the customer confirms the order.";

const EXTRACTION_TEMPERATURE: f32 = 0.0;
const COMPOSITION_TEMPERATURE: f32 = 0.4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedLine {
    pub name: String,
    pub quantity: i32,
}

/// Outcome of an extraction call. `lines` is empty both when the model
/// recognized nothing and when its answer could not be used; `parse_error`
/// tells the two apart.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub raw_payload: String,
    pub parse_error: Option<String>,
    pub lines: Vec<RequestedLine>,
}

pub struct ModelGateway {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn extract(&self, message: &str) -> Result<Extraction, ModelError> {
        let raw = self
            .call(ModelRequest {
                system: EXTRACTION_INSTRUCTION.to_string(),
                user: format!("User: \"{}\"", message),
                temperature: EXTRACTION_TEMPERATURE,
            })
            .await?;
        log::debug!("extraction raw output: {}", raw);
        Ok(parse_extraction(raw))
    }

    pub async fn compose(&self, summary: &DraftSummary) -> Result<String, ModelError> {
        let mut facts = String::from("Order items:\n");
        for line in &summary.lines {
            let _ = writeln!(
                facts,
                "- {}: quantity {}, unit price {} {}, line total {} {}",
                line.name,
                line.quantity,
                line.unit_price,
                summary.currency,
                line.subtotal,
                summary.currency
            );
        }
        let _ = write!(facts, "Subtotal: {} {}", summary.subtotal, summary.currency);

        let text = self
            .call(ModelRequest {
                system: COMPOSITION_INSTRUCTION.to_string(),
                user: facts,
                temperature: COMPOSITION_TEMPERATURE,
            })
            .await?;
        Ok(text.trim().to_string())
    }

    async fn call(&self, request: ModelRequest) -> Result<String, ModelError> {
        tokio::time::timeout(self.timeout, self.model.generate(request))
            .await
            .map_err(|_| ModelError::Timeout(self.timeout.as_secs()))?
    }
}

/// Removes a surrounding markdown code fence, with or without a language tag.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Outermost JSON array in `text`, if any.
fn array_slice(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn quantity_of(entry: &serde_json::Map<String, Value>) -> Option<i32> {
    let quantity = match entry.get("quantity") {
        None | Some(Value::Null) => 1,
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
        Some(Value::String(s)) => s.trim().parse::<i64>().ok()?,
        Some(_) => return None,
    };
    i32::try_from(quantity).ok().filter(|q| *q >= 1)
}

pub fn parse_extraction(raw_payload: String) -> Extraction {
    let parsed = {
        let stripped = strip_fences(&raw_payload);
        let candidate = array_slice(stripped).unwrap_or(stripped);
        serde_json::from_str::<Vec<Value>>(candidate)
    };

    let entries = match parsed {
        Ok(entries) => entries,
        Err(e) => {
            return Extraction {
                raw_payload,
                parse_error: Some(e.to_string()),
                lines: Vec::new(),
            }
        }
    };

    let mut lines = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(object) = entry.as_object() else {
            log::warn!("ignoring non-object extraction entry {}", entry);
            continue;
        };
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty());
        match (name, quantity_of(object)) {
            (Some(name), Some(quantity)) => lines.push(RequestedLine {
                name: name.to_string(),
                quantity,
            }),
            _ => log::warn!("ignoring invalid extraction entry {}", entry),
        }
    }

    Extraction {
        raw_payload,
        parse_error: None,
        lines,
    }
}
