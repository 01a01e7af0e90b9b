use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};

use crate::mlclient::services::{PersistentStore, StoreError, VersionedValue};

const ID_ATTR: &str = "id";
const VALUE_ATTR: &str = "value";
const VERSION_ATTR: &str = "version";

/// Versioned JSON documents in a single DynamoDB table keyed by `id = "{kind}#{key}"`.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    table: String,
}

impl DynamoDbStore {
    pub fn new(client: Client, table: String) -> Self {
        Self { client, table }
    }
}

fn item_id(kind: &str, key: &str) -> String {
    format!("{}#{}", kind, key)
}

/// Guard for a write expecting `expected`, where version 0 means "not yet written".
fn version_condition(expected: u64) -> &'static str {
    if expected == 0 {
        "attribute_not_exists(#id)"
    } else {
        "#version = :expected"
    }
}

fn parse_version(attrs: &HashMap<String, AttributeValue>) -> Result<u64, StoreError> {
    attrs
        .get(VERSION_ATTR)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| StoreError::Corrupt("Invalid version".to_string()))
}

fn parse_item(item: &HashMap<String, AttributeValue>) -> Result<VersionedValue, StoreError> {
    let raw = item
        .get(VALUE_ATTR)
        .and_then(|v| v.as_s().ok())
        .ok_or_else(|| StoreError::Corrupt("Invalid value".to_string()))?;

    Ok(VersionedValue {
        value: serde_json::from_str(raw)?,
        version: parse_version(item)?,
    })
}

#[async_trait]
impl PersistentStore for DynamoDbStore {
    async fn get(&self, kind: &str, key: &str) -> Result<Option<VersionedValue>, StoreError> {
        let id = item_id(kind, key);
        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(ID_ATTR, AttributeValue::S(id.clone()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| {
                log::error!("DynamoDB get_item failed for {}: {:?}", id, e);
                StoreError::Backend(e.to_string())
            })?;

        result.item.as_ref().map(parse_item).transpose()
    }

    async fn put(
        &self,
        kind: &str,
        key: &str,
        value: serde_json::Value,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let id = item_id(kind, key);
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table)
            .key(ID_ATTR, AttributeValue::S(id.clone()))
            .update_expression(
                "SET #value = :value, #version = if_not_exists(#version, :zero) + :one",
            )
            .expression_attribute_names("#value", VALUE_ATTR)
            .expression_attribute_names("#version", VERSION_ATTR)
            .expression_attribute_values(
                ":value",
                AttributeValue::S(serde_json::to_string(&value)?),
            )
            .expression_attribute_values(":zero", AttributeValue::N("0".to_string()))
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .return_values(ReturnValue::UpdatedNew);

        if let Some(expected) = expected_version {
            request = request.condition_expression(version_condition(expected));
            if expected == 0 {
                request = request.expression_attribute_names("#id", ID_ATTR);
            } else {
                request = request.expression_attribute_values(
                    ":expected",
                    AttributeValue::N(expected.to_string()),
                );
            }
        }

        match request.send().await {
            Ok(response) => {
                let attrs = response.attributes.ok_or_else(|| {
                    StoreError::Corrupt(format!("No attributes returned for {}", id))
                })?;
                let version = parse_version(&attrs)?;
                log::debug!("Wrote {} at version {}", id, version);
                Ok(version)
            }
            Err(e) => {
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception())
                {
                    log::warn!("Conditional write on {} lost to a concurrent writer", id);
                    return Err(StoreError::VersionMismatch);
                }
                log::error!("DynamoDB update_item failed for {}: {:?}", id, e);
                Err(StoreError::Backend(e.to_string()))
            }
        }
    }
}
