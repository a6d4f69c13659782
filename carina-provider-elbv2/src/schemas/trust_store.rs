//! elbv2.trust_store and elbv2.trust_store_revocation schemas

use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::{computed, with_common, with_name};

pub fn trust_store_schema() -> ResourceSchema {
    let schema = ResourceSchema::new("elbv2.trust_store")
        .with_description("CA certificate bundle for mutual TLS")
        .attribute(
            AttributeSchema::new("ca_certificates_bundle_s3_bucket", AttributeType::String)
                .required()
                .write_only(),
        )
        .attribute(
            AttributeSchema::new("ca_certificates_bundle_s3_key", AttributeType::String)
                .required()
                .write_only(),
        )
        .attribute(
            AttributeSchema::new(
                "ca_certificates_bundle_s3_object_version",
                AttributeType::String,
            )
            .write_only(),
        )
        .attribute(computed("arn_suffix", "ARN suffix for use with CloudWatch metrics"))
        .attribute(
            AttributeSchema::new("number_of_ca_certificates", AttributeType::Int).computed(),
        )
        .attribute(AttributeSchema::new("total_revoked_entries", AttributeType::Int).computed());

    with_common(with_name(schema, "trust store"))
}

pub fn trust_store_revocation_schema() -> ResourceSchema {
    let s3 = |name: &str| {
        AttributeSchema::new(name, AttributeType::String)
            .force_new()
            .write_only()
    };
    ResourceSchema::new("elbv2.trust_store_revocation")
        .with_description("Certificate revocation list added to a trust store")
        .attribute(
            AttributeSchema::new("trust_store_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(s3("revocations_s3_bucket").required())
        .attribute(s3("revocations_s3_key").required())
        .attribute(s3("revocations_s3_object_version"))
        .attribute(AttributeSchema::new("revocation_id", AttributeType::Int).computed())
        .attribute(computed("id", "trust_store_arn,revocation_id"))
}
