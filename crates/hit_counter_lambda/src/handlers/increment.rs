use hit_counter_core::contract::{
    page_path_from_event, response_headers, IncrementFailureBody, IncrementSuccessBody,
    DATABASE_ERROR_MESSAGE, GENERAL_ERROR_MESSAGE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::adapters::counter_store::{CounterStore, CounterStoreError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiGatewayResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub headers: Value,
    pub body: String,
}

/// Increments the counter named by the event's `pagePath` and reports the new
/// value. Request-level failures become 500 responses, never runtime errors.
pub fn handle_increment_event(event: &Value, store: &dyn CounterStore) -> ApiGatewayResponse {
    let page_path = match page_path_from_event(event) {
        Ok(value) => value,
        Err(request_error) => {
            error!(error = %request_error, "rejected increment request");
            return error_response(GENERAL_ERROR_MESSAGE);
        }
    };

    match store.increment(&page_path) {
        Ok(count) => {
            info!(page_path = %page_path, count, "counter incremented");
            success_response(count)
        }
        Err(store_error @ CounterStoreError::Service { .. }) => {
            error!(page_path = %page_path, error = %store_error, "counter store rejected update");
            error_response(DATABASE_ERROR_MESSAGE)
        }
        Err(store_error) => {
            error!(page_path = %page_path, error = %store_error, "counter update failed");
            error_response(GENERAL_ERROR_MESSAGE)
        }
    }
}

pub fn success_response(count: u64) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 200,
        headers: response_headers(),
        body: serde_json::to_string(&IncrementSuccessBody::new(count))
            .expect("response body should serialize"),
    }
}

pub fn error_response(message: &str) -> ApiGatewayResponse {
    ApiGatewayResponse {
        status_code: 500,
        headers: response_headers(),
        body: serde_json::to_string(&IncrementFailureBody::new(message))
            .expect("response body should serialize"),
    }
}
