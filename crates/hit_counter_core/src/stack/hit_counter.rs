use std::time::Duration;

use super::api::{api_url, CorsOptions, RestApiDeclaration, DEFAULT_STAGE_NAME};
use super::constructs::{declare_function, grant_read_write_data, DeclaredRestApi};
use super::error::SynthError;
use super::function::CodeAsset;
use super::table::{Attribute, AttributeType, BillingMode, TableDeclaration};
use super::template::{reference, RemovalPolicy, Template};
use super::Stack;
use crate::contract::{INCREMENT_ROUTE, PAGE_PATH_ATTRIBUTE, TABLE_NAME_ENV};

pub const DEFAULT_STACK_NAME: &str = "HitCounterStack";
pub const TABLE_CONSTRUCT_ID: &str = "PageHitCounters";
pub const FUNCTION_CONSTRUCT_ID: &str = "HitCounterFunction";
pub const API_CONSTRUCT_ID: &str = "HitCounterApi";
pub const API_URL_OUTPUT: &str = "ApiUrl";

pub const STACK_DESCRIPTION: &str =
    "Page hit counter: DynamoDB table, counter function and REST endpoint";
pub const REST_API_NAME: &str = "Hit Counter Service";
pub const REST_API_DESCRIPTION: &str = "API for incrementing page hit counters";
pub const API_URL_DESCRIPTION: &str = "URL of the API Gateway endpoint";

pub const FUNCTION_TIMEOUT: Duration = Duration::from_secs(10);
pub const FUNCTION_MEMORY_MB: u32 = 128;
pub const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
pub const CORS_ALLOW_HEADERS: [&str; 4] = ["Content-Type", "X-Amz-Date", "Authorization", "X-Api-Key"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitCounterStackProps {
    pub stack_name: String,
    pub code: CodeAsset,
    pub stage_name: String,
}

impl HitCounterStackProps {
    pub fn new(code: CodeAsset) -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            code,
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        }
    }
}

/// Logical IDs of the hit counter's primary resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitCounterResources {
    pub table: String,
    pub function: String,
    pub rest_api: String,
    pub stage: String,
    pub api_url_output: String,
}

/// Declares the counter table, the counter function with read/write access to
/// it, and the REST endpoint `POST /incrementCounter` in front of the function.
pub fn declare_hit_counter(
    props: &HitCounterStackProps,
) -> Result<(Stack, HitCounterResources), SynthError> {
    let mut stack = Stack::new(props.stack_name.clone()).with_description(STACK_DESCRIPTION);

    let table = stack.declare(
        &[TABLE_CONSTRUCT_ID, "Resource"],
        TableDeclaration::new(Attribute::new(PAGE_PATH_ATTRIBUTE, AttributeType::String))
            .billing_mode(BillingMode::PayPerRequest)
            .removal_policy(RemovalPolicy::Destroy),
    )?;

    let mut function = declare_function(
        &mut stack,
        FUNCTION_CONSTRUCT_ID,
        props.code.clone(),
        |declaration| {
            declaration
                .environment(TABLE_NAME_ENV, reference(&table))
                .timeout(FUNCTION_TIMEOUT)
                .memory_size_mb(FUNCTION_MEMORY_MB)
        },
    )?;
    grant_read_write_data(&mut stack, &table, &mut function)?;

    let mut api = DeclaredRestApi::declare(
        &mut stack,
        API_CONSTRUCT_ID,
        RestApiDeclaration {
            name: REST_API_NAME.to_string(),
            description: Some(REST_API_DESCRIPTION.to_string()),
        },
        Some(CorsOptions::permissive(&CORS_ALLOW_HEADERS, PREFLIGHT_MAX_AGE)),
    )?;
    let root = api.root();
    let increment = api.add_resource(&mut stack, &root, INCREMENT_ROUTE)?;
    api.add_lambda_method(&mut stack, &increment, "POST", &function.function)?;
    let deployed = api.deploy(&mut stack, &props.stage_name)?;

    let api_url_output = stack.add_output(
        API_URL_OUTPUT,
        api_url(&api.rest_api, &deployed.stage),
        Some(API_URL_DESCRIPTION),
    )?;

    let resources = HitCounterResources {
        table,
        function: function.function,
        rest_api: api.rest_api,
        stage: deployed.stage,
        api_url_output,
    };
    Ok((stack, resources))
}

pub fn synthesize_hit_counter(props: &HitCounterStackProps) -> Result<Template, SynthError> {
    let (stack, _) = declare_hit_counter(props)?;
    stack.synthesize()
}
