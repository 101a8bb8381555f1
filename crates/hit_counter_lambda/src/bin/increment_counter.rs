use hit_counter_lambda::adapters::dynamodb::DynamoDbCounterStore;
use hit_counter_lambda::config::HandlerConfig;
use hit_counter_lambda::handlers::increment::{handle_increment_event, ApiGatewayResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

async fn handle_request(
    event: LambdaEvent<Value>,
    store: &DynamoDbCounterStore,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_increment_event(&event.payload, store))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let config = HandlerConfig::from_env();
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = DynamoDbCounterStore::new(
        config.table_name,
        aws_sdk_dynamodb::Client::new(&aws_config),
    );
    tracing::info!(table_name = store.table_name(), "counter function ready");

    lambda_runtime::run(service_fn(|event| handle_request(event, &store))).await
}
