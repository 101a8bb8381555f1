use std::collections::HashMap;

use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use hit_counter_core::contract::{
    COUNT_ATTRIBUTE, COUNT_NAME_PLACEHOLDER, INCREMENT_UPDATE_EXPRESSION,
    INCREMENT_VALUE_PLACEHOLDER, PAGE_PATH_ATTRIBUTE,
};

use super::counter_store::{CounterStore, CounterStoreError};

pub struct DynamoDbCounterStore {
    table_name: String,
    client: aws_sdk_dynamodb::Client,
}

impl DynamoDbCounterStore {
    pub fn new(table_name: impl Into<String>, client: aws_sdk_dynamodb::Client) -> Self {
        Self {
            table_name: table_name.into(),
            client,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl CounterStore for DynamoDbCounterStore {
    fn increment(&self, page_path: &str) -> Result<u64, CounterStoreError> {
        let client = self.client.clone();
        let table_name = self.table_name.clone();
        let key = page_path.to_string();

        let output = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .update_item()
                    .table_name(table_name)
                    .key(PAGE_PATH_ATTRIBUTE, AttributeValue::S(key))
                    .update_expression(INCREMENT_UPDATE_EXPRESSION)
                    .expression_attribute_names(COUNT_NAME_PLACEHOLDER, COUNT_ATTRIBUTE)
                    .expression_attribute_values(
                        INCREMENT_VALUE_PLACEHOLDER,
                        AttributeValue::N("1".to_string()),
                    )
                    .return_values(ReturnValue::UpdatedNew)
                    .send()
                    .await
            })
        })
        .map_err(classify_update_error)?;

        updated_count(output.attributes())
    }
}

/// Reads the new counter value from `UPDATED_NEW` attributes. An absent
/// attribute counts as zero.
pub fn updated_count(
    attributes: Option<&HashMap<String, AttributeValue>>,
) -> Result<u64, CounterStoreError> {
    let Some(value) = attributes.and_then(|attributes| attributes.get(COUNT_ATTRIBUTE)) else {
        return Ok(0);
    };

    match value {
        AttributeValue::N(number) => number.parse::<u64>().map_err(|error| {
            CounterStoreError::Unexpected(format!(
                "{COUNT_ATTRIBUTE} attribute '{number}' is not a counter: {error}"
            ))
        }),
        other => Err(CounterStoreError::Unexpected(format!(
            "{COUNT_ATTRIBUTE} attribute has unexpected type: {other:?}"
        ))),
    }
}

fn classify_update_error(error: SdkError<UpdateItemError, HttpResponse>) -> CounterStoreError {
    let message = DisplayErrorContext(&error).to_string();
    match &error {
        SdkError::ServiceError(service) => CounterStoreError::Service {
            code: service.err().code().map(str::to_string),
            message,
        },
        _ => CounterStoreError::Unexpected(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attributes(value: AttributeValue) -> HashMap<String, AttributeValue> {
        HashMap::from([(COUNT_ATTRIBUTE.to_string(), value)])
    }

    #[test]
    fn reads_numeric_count() {
        let attributes = attributes(AttributeValue::N("5".to_string()));
        assert_eq!(updated_count(Some(&attributes)), Ok(5));
    }

    #[test]
    fn missing_count_is_zero() {
        assert_eq!(updated_count(None), Ok(0));
        assert_eq!(updated_count(Some(&HashMap::new())), Ok(0));
    }

    #[test]
    fn rejects_non_numeric_count() {
        let text = attributes(AttributeValue::S("five".to_string()));
        assert!(matches!(
            updated_count(Some(&text)),
            Err(CounterStoreError::Unexpected(_))
        ));

        let fractional = attributes(AttributeValue::N("1.5".to_string()));
        assert!(matches!(
            updated_count(Some(&fractional)),
            Err(CounterStoreError::Unexpected(_))
        ));
    }
}
