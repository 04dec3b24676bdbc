//! Built-in plan modifiers
//!
//! Attached to attributes through `AttributeBuilder::plan_modifier` and run
//! by the gRPC layer during `PlanResourceChange`, after defaults have been
//! applied and computed values marked unknown.

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::{Diagnostic, Dynamic};

/// Marks the resource for replacement whenever the attribute's planned value
/// differs from its prior state.
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "If the value of this attribute changes, Terraform will destroy and recreate the resource."
            .to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let requires_replace = !request.resource_created
            && !values_equal(&request.state_value.value, &request.plan_value.value);

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Copies the prior state into the plan when the planned value is unknown.
/// Meant for computed attributes that never change once set, such as ids.
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Box<dyn PlanModifier> {
        Box::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "Once set, the value of this attribute in state will not change.".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let keep_state = request.plan_value.is_unknown()
            && !request.state_value.is_null()
            && !request.config_value.is_unknown();

        PlanModifierResponse {
            plan_value: if keep_state {
                request.state_value
            } else {
                request.plan_value
            },
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Requires replacement when the predicate holds and the value changed.
pub struct RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    predicate: F,
    description: String,
}

impl<F> RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync + 'static,
{
    pub fn create(predicate: F, description: impl Into<String>) -> Box<dyn PlanModifier> {
        Box::new(Self {
            predicate,
            description: description.into(),
        })
    }
}

impl<F> PlanModifier for RequiresReplaceIf<F>
where
    F: Fn(&PlanModifierRequest) -> bool + Send + Sync,
{
    fn description(&self) -> String {
        self.description.clone()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let changed = !request.resource_created
            && !values_equal(&request.state_value.value, &request.plan_value.value);
        let requires_replace = changed && (self.predicate)(&request);

        let mut diagnostics = vec![];
        if requires_replace {
            diagnostics.push(
                Diagnostic::warning(
                    format!("Attribute '{}' requires resource replacement", request.path),
                    self.description.clone(),
                )
                .with_attribute(request.path.clone()),
            );
        }

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics,
        }
    }
}

/// Compares two values, treating numbers within f64 epsilon as equal.
/// Unknown never equals anything.
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic, created: bool) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("model"),
            resource_created: created,
        }
    }

    #[test]
    fn requires_replace_ignores_same_value() {
        let response = RequiresReplace.modify(request("gpt-4o".into(), "gpt-4o".into(), false));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_triggers_on_change() {
        let response = RequiresReplace.modify(request("gpt-4o".into(), "gpt-4o-mini".into(), false));
        assert!(response.requires_replace);
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn requires_replace_skips_creation() {
        let response = RequiresReplace.modify(request(Dynamic::Null, "gpt-4o".into(), true));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_treats_unknown_plan_as_change() {
        let response = RequiresReplace.modify(request("file-1".into(), Dynamic::Unknown, false));
        assert!(response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let mut req = request("asst_123".into(), Dynamic::Unknown, false);
        req.config_value = DynamicValue::null();
        let response = UseStateForUnknown.modify(req);
        assert_eq!(response.plan_value.value, Dynamic::String("asst_123".into()));
    }

    #[test]
    fn use_state_for_unknown_leaves_create_unknown() {
        let mut req = request(Dynamic::Null, Dynamic::Unknown, true);
        req.config_value = DynamicValue::null();
        let response = UseStateForUnknown.modify(req);
        assert!(response.plan_value.is_unknown());
    }

    #[test]
    fn requires_replace_if_consults_predicate() {
        let modifier = RequiresReplaceIf::create(
            |req: &PlanModifierRequest| !req.state_value.is_null(),
            "replacing when previously set",
        );

        let response = modifier.modify(request("a".into(), "b".into(), false));
        assert!(response.requires_replace);
        assert_eq!(response.diagnostics.len(), 1);

        let response = modifier.modify(request(Dynamic::Null, "b".into(), false));
        assert!(!response.requires_replace);
    }

    #[test]
    fn values_equal_compares_nested_structures() {
        let a = Dynamic::List(vec!["x".into(), Dynamic::Number(1.0)]);
        let b = Dynamic::List(vec!["x".into(), Dynamic::Number(1.0)]);
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&Dynamic::Unknown, &Dynamic::Unknown));
    }
}
