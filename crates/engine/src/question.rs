//! Questions declared by function actions and their non-interactive validation.
//!
//! A function action may declare the input it depends on. Before the body
//! runs, the executor checks that the answer recorded in the input bag
//! satisfies the declared validation. Prompting for answers is the caller's
//! concern; the engine only validates what is already in the bag.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inputs::InputBag;

/// An input a function action expects to find in the bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Dotted path of the answer in the input bag.
    pub name: String,
    /// Human-readable prompt.
    pub title: String,
    /// Constraints the answer must satisfy. Without validation any answer,
    /// including none, is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Validation>,
}

/// Declarative answer constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Validation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed values; for list answers every element must be allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Question {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            validation: None,
        }
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Validates the answer recorded in `inputs`, returning a message on failure.
    pub fn validate(&self, inputs: &InputBag) -> Result<(), String> {
        let Some(validation) = &self.validation else {
            return Ok(());
        };
        let answer = match inputs.get(&self.name) {
            Some(Value::Null) | None => return Err(format!("question '{}' has no answer", self.name)),
            Some(answer) => answer,
        };
        validation.check(&answer)
    }
}

impl Validation {
    pub fn options<I, S>(options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: Some(options.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    fn check(&self, answer: &Value) -> Result<(), String> {
        let length = match answer {
            Value::String(text) => Some(text.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        };
        if let (Some(length), Some(max)) = (length, self.max_length)
            && length > max
        {
            return Err(format!("length {length} exceeds the maximum of {max}"));
        }
        if let (Some(length), Some(min)) = (length, self.min_length)
            && length < min
        {
            return Err(format!("length {length} is below the minimum of {min}"));
        }
        if let Some(options) = &self.options {
            let candidates: Vec<&Value> = match answer {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for candidate in candidates {
                let text = match candidate {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                if !options.iter().any(|option| option == &text) {
                    return Err(format!("'{text}' is not one of [{}]", options.join(", ")));
                }
            }
        }
        Ok(())
    }
}
