//! elbv2.target_group_attachment and elbv2.target_group_registration schemas

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

fn target_id() -> AttributeSchema {
    AttributeSchema::new("target_id", AttributeType::String)
        .required()
        .with_description("Instance ID, IP address, Lambda ARN or ALB ARN")
}

fn availability_zone() -> AttributeSchema {
    AttributeSchema::new("availability_zone", AttributeType::String)
        .with_description("\"all\" for IP targets outside the VPC")
}

/// One target registered with one target group
pub fn target_group_attachment_schema() -> ResourceSchema {
    ResourceSchema::new("elbv2.target_group_attachment")
        .with_description("Registers a single target with a target group")
        .attribute(
            AttributeSchema::new("target_group_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(target_id().force_new())
        .attribute(AttributeSchema::new("port", types::port()).force_new())
        .attribute(availability_zone().force_new())
        .attribute(super::computed("id", "target_group_arn,target_id[,port[,availability_zone]]"))
}

/// The complete set of targets of one target group
pub fn target_group_registration_schema() -> ResourceSchema {
    ResourceSchema::new("elbv2.target_group_registration")
        .with_description("Manages every target registered with a target group")
        .attribute(
            AttributeSchema::new("target_group_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(AttributeSchema::new(
            "target",
            AttributeType::Set(Box::new(AttributeType::block(
                "Target",
                vec![
                    target_id(),
                    AttributeSchema::new("port", types::port()),
                    availability_zone(),
                ],
            ))),
        ))
        .attribute(super::computed("id", "ARN of the target group"))
}
