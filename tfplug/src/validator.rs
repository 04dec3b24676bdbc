//! Built-in attribute validators
//!
//! Validators run during `ValidateResourceConfig` / `ValidateDataResourceConfig`
//! / `ValidateProviderConfig` for every attribute that has a known, non-null
//! value.

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{AttributePath, Diagnostic, Dynamic};

fn invalid(path: &AttributePath, summary: String, detail: String) -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![Diagnostic::error(summary, detail).with_attribute(path.clone())],
    }
}

fn valid() -> ValidatorResponse {
    ValidatorResponse {
        diagnostics: vec![],
    }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn at_most(max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: None,
            max: Some(max),
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!(
            "string length must be between {} and {}",
            self.min.unwrap_or(0),
            self.max.map_or("unbounded".to_string(), |m| m.to_string())
        )
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return valid();
        };
        let len = s.chars().count();
        if let Some(min) = self.min {
            if len < min {
                return invalid(
                    &request.path,
                    format!("{} must have minimum length of {}", request.path, min),
                    format!("Got length {}", len),
                );
            }
        }
        if let Some(max) = self.max {
            if len > max {
                return invalid(
                    &request.path,
                    format!("{} must have maximum length of {}", request.path, max),
                    format!("Got length {}", len),
                );
            }
        }
        valid()
    }
}

pub struct StringOneOfValidator {
    pub values: Vec<String>,
}

impl StringOneOfValidator {
    pub fn create(values: &[&str]) -> Box<dyn Validator> {
        Box::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
        })
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.values.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        match request.config_value.value.as_str() {
            Some(s) if !self.values.iter().any(|v| v == s) => invalid(
                &request.path,
                format!("Invalid value for {}", request.path),
                format!("Value '{}' must be one of: {}", s, self.values.join(", ")),
            ),
            _ => valid(),
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: Result<regex::Regex, regex::Error>,
    pub description: String,
}

impl StringPatternValidator {
    /// A pattern that fails to compile reports an error on every validation.
    pub fn create(pattern: &str, description: &str) -> Box<dyn Validator> {
        Box::new(Self {
            pattern: regex::Regex::new(pattern),
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let pattern = match &self.pattern {
            Ok(pattern) => pattern,
            Err(e) => {
                return invalid(
                    &request.path,
                    format!("Invalid validator pattern for {}", request.path),
                    e.to_string(),
                )
            }
        };
        match request.config_value.value.as_str() {
            Some(s) if !pattern.is_match(s) => invalid(
                &request.path,
                format!("{} must match {}", request.path, self.description),
                format!("Value '{}' does not match pattern", s),
            ),
            _ => valid(),
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("value must be between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(n) = request.config_value.value.as_f64() else {
            return valid();
        };
        if let Some(min) = self.min {
            if n < min {
                return invalid(
                    &request.path,
                    format!("{} must be at least {}", request.path, min),
                    format!("Got {}", n),
                );
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return invalid(
                    &request.path,
                    format!("{} must be at most {}", request.path, max),
                    format!("Got {}", n),
                );
            }
        }
        valid()
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn between(min: usize, max: usize) -> Box<dyn Validator> {
        Box::new(Self {
            min: Some(min),
            max: Some(max),
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list must have between {:?} and {:?} items", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Dynamic::List(items) = &request.config_value.value else {
            return valid();
        };
        if let Some(min) = self.min {
            if items.len() < min {
                return invalid(
                    &request.path,
                    format!("{} must have at least {} items", request.path, min),
                    format!("Got {} items", items.len()),
                );
            }
        }
        if let Some(max) = self.max {
            if items.len() > max {
                return invalid(
                    &request.path,
                    format!("{} must have at most {} items", request.path, max),
                    format!("Got {} items", items.len()),
                );
            }
        }
        valid()
    }
}

/// Accepts strings holding a JSON document.
pub struct JsonStringValidator;

impl JsonStringValidator {
    pub fn create() -> Box<dyn Validator> {
        Box::new(Self)
    }
}

impl Validator for JsonStringValidator {
    fn description(&self) -> String {
        "value must be a valid JSON document".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let Some(s) = request.config_value.value.as_str() else {
            return valid();
        };
        match serde_json::from_str::<serde_json::Value>(s) {
            Ok(_) => valid(),
            Err(e) => invalid(
                &request.path,
                format!("{} must be valid JSON", request.path),
                e.to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DynamicValue;

    fn run(validator: &dyn Validator, value: Dynamic) -> Vec<Diagnostic> {
        validator
            .validate(ValidatorRequest {
                config_value: DynamicValue::new(value),
                path: AttributePath::new("field"),
            })
            .diagnostics
    }

    #[test]
    fn string_length_validator_accepts_valid_length() {
        let validator = StringLengthValidator::between(3, 10);
        assert!(run(validator.as_ref(), "hello".into()).is_empty());
    }

    #[test]
    fn string_length_validator_rejects_too_long() {
        let validator = StringLengthValidator::at_most(5);
        let diags = run(validator.as_ref(), "hello world".into());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("maximum length"));
        assert_eq!(diags[0].attribute, Some(AttributePath::new("field")));
    }

    #[test]
    fn one_of_rejects_unlisted_value() {
        let validator = StringOneOfValidator::create(&["fine-tune", "assistants"]);
        assert!(run(validator.as_ref(), "assistants".into()).is_empty());
        let diags = run(validator.as_ref(), "batch".into());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].detail.contains("fine-tune"));
    }

    #[test]
    fn string_pattern_validator_rejects_non_matching() {
        let validator = StringPatternValidator::create(r"^file-", "a file id (file-...)");
        assert!(run(validator.as_ref(), "file-abc".into()).is_empty());
        let diags = run(validator.as_ref(), "abc".into());
        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("a file id"));
    }

    #[test]
    fn number_range_validator_bounds() {
        let validator = NumberRangeValidator::between(0.0, 2.0);
        assert!(run(validator.as_ref(), Dynamic::Number(1.2)).is_empty());
        let diags = run(validator.as_ref(), Dynamic::Number(2.5));
        assert!(diags[0].summary.contains("at most"));
        let diags = run(validator.as_ref(), Dynamic::Number(-1.0));
        assert!(diags[0].summary.contains("at least"));
    }

    #[test]
    fn list_length_validator_rejects_too_many() {
        let validator = ListLengthValidator::between(0, 1);
        let diags = run(
            validator.as_ref(),
            Dynamic::List(vec!["a".into(), "b".into()]),
        );
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn json_string_validator() {
        let validator = JsonStringValidator::create();
        assert!(run(validator.as_ref(), r#"{"type":"object"}"#.into()).is_empty());
        assert_eq!(run(validator.as_ref(), "{not json".into()).len(), 1);
    }

    #[test]
    fn validators_ignore_other_types() {
        let validator = StringLengthValidator::at_most(1);
        assert!(run(validator.as_ref(), Dynamic::Number(100.0)).is_empty());
    }
}
