//! Default value providers for attributes
//!
//! Defaults are evaluated while planning, for optional+computed attributes
//! whose configuration value is null. They never override a value the user
//! set explicitly.
//!
//! ```no_run
//! use tfplug::schema::{AttributeBuilder, AttributeType};
//! use tfplug::defaults::StaticDefault;
//!
//! let purpose = AttributeBuilder::new("purpose", AttributeType::String)
//!     .optional()
//!     .computed()
//!     .default(StaticDefault::string("fine-tune"))
//!     .build();
//! ```

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::collections::HashMap;

/// StaticDefault provides a fixed default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    pub fn create(value: Dynamic) -> Box<dyn Default> {
        Box::new(Self { value })
    }

    pub fn string(value: &str) -> Box<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    pub fn number(value: f64) -> Box<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    pub fn bool(value: bool) -> Box<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }

    pub fn list(values: Vec<Dynamic>) -> Box<dyn Default> {
        Self::create(Dynamic::List(values))
    }

    pub fn empty_map() -> Box<dyn Default> {
        Self::create(Dynamic::Map(HashMap::new()))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    fn evaluate(default: &dyn Default) -> Dynamic {
        default
            .default_value(DefaultRequest {
                path: AttributePath::new("attr"),
            })
            .value
            .value
    }

    #[test]
    fn static_string_default() {
        let default = StaticDefault::string("fine-tune");
        assert_eq!(evaluate(default.as_ref()), Dynamic::String("fine-tune".into()));
        assert!(default.description().contains("fine-tune"));
    }

    #[test]
    fn static_scalar_defaults() {
        assert_eq!(evaluate(StaticDefault::bool(false).as_ref()), Dynamic::Bool(false));
        assert_eq!(evaluate(StaticDefault::number(7.0).as_ref()), Dynamic::Number(7.0));
    }

    #[test]
    fn static_collection_defaults() {
        assert_eq!(
            evaluate(StaticDefault::list(vec!["a".into()]).as_ref()),
            Dynamic::List(vec!["a".into()])
        );
        assert_eq!(
            evaluate(StaticDefault::empty_map().as_ref()),
            Dynamic::Map(HashMap::new())
        );
    }
}
