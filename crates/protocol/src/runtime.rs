//! `Runtime` domain.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const RUNTIME_EVALUATE: &str = "Runtime.evaluate";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
	pub expression: String,
	pub return_by_value: bool,
}

impl EvaluateParams {
	pub fn by_value(expression: impl Into<String>) -> Self {
		Self {
			expression: expression.into(),
			return_by_value: true,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResult {
	pub result: RemoteObject,
	#[serde(default)]
	pub exception_details: Option<ExceptionDetails>,
}

/// Mirror object for a value living in the page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteObject {
	#[serde(rename = "type")]
	pub object_type: String,
	#[serde(default)]
	pub value: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
	pub text: String,
	#[serde(default)]
	pub line_number: i64,
}

impl EvaluateResult {
	/// Interprets the evaluation as a boolean, `false` on exception or non-boolean values.
	pub fn as_bool(&self) -> bool {
		self.exception_details.is_none() && self.result.value.as_ref().and_then(Value::as_bool).unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn boolean_results_are_read_by_value() {
		let result: EvaluateResult = serde_json::from_str(r#"{"result": {"type": "boolean", "value": true}}"#).unwrap();
		assert!(result.as_bool());
	}

	#[test]
	fn exceptions_read_as_false() {
		let result: EvaluateResult = serde_json::from_str(
			r#"{"result": {"type": "object"}, "exceptionDetails": {"text": "Uncaught", "lineNumber": 0}}"#,
		)
		.unwrap();
		assert!(!result.as_bool());
	}
}
