//! elbv2.listener_rule schema

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::action::{actions_attribute, condition_type, validate_actions, validate_conditions};
use super::{int_range, with_common};
use crate::utils::Attrs;

pub fn listener_rule_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.listener_rule")
        .with_description("Listener rule: conditions routed to actions, evaluated by priority")
        .attribute(
            AttributeSchema::new("listener_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("priority", int_range!(1, 50000))
                .with_description("Evaluation order; the next free priority is used when omitted"),
        )
        .attribute(actions_attribute("action"))
        .attribute(
            AttributeSchema::new("condition", AttributeType::Set(Box::new(condition_type())))
                .required()
                .with_min_items(1),
        )
        .with_validator(validate);

    with_common(schema)
}

fn validate(attrs: &Attrs) -> Result<(), String> {
    validate_actions(attrs, "action")?;
    validate_conditions(attrs, "condition")
}
