use std::time::Duration;

use serde_json::{json, Map, Value};

use super::template::{get_att, join, reference, CfnResource};

pub const REST_API_TYPE: &str = "AWS::ApiGateway::RestApi";
pub const API_RESOURCE_TYPE: &str = "AWS::ApiGateway::Resource";
pub const METHOD_TYPE: &str = "AWS::ApiGateway::Method";
pub const DEPLOYMENT_TYPE: &str = "AWS::ApiGateway::Deployment";
pub const STAGE_TYPE: &str = "AWS::ApiGateway::Stage";

pub const API_GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";
pub const ALL_ORIGINS: &str = "*";
pub const ALL_METHODS: [&str; 7] = ["OPTIONS", "GET", "PUT", "POST", "DELETE", "PATCH", "HEAD"];
pub const DEFAULT_STAGE_NAME: &str = "prod";

const PREFLIGHT_STATUS: &str = "204";

/// Preflight answer attached to every resource of a REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsOptions {
    pub allow_origin: String,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub max_age: Option<Duration>,
}

impl CorsOptions {
    pub fn permissive(allow_headers: &[&str], max_age: Duration) -> Self {
        Self {
            allow_origin: ALL_ORIGINS.to_string(),
            allow_methods: ALL_METHODS.iter().map(|method| method.to_string()).collect(),
            allow_headers: allow_headers.iter().map(|header| header.to_string()).collect(),
            max_age: Some(max_age),
        }
    }

    /// `method.response.header.*` mappings with their quoted static values.
    pub fn response_parameters(&self) -> Vec<(String, String)> {
        let mut parameters = vec![
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(","),
            ),
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
        ];
        if self.allow_origin != ALL_ORIGINS {
            parameters.push(("Vary".to_string(), "Origin".to_string()));
        }
        parameters.push((
            "Access-Control-Allow-Methods".to_string(),
            self.allow_methods.join(","),
        ));
        if let Some(max_age) = self.max_age {
            parameters.push((
                "Access-Control-Max-Age".to_string(),
                max_age.as_secs().to_string(),
            ));
        }
        parameters
            .into_iter()
            .map(|(header, value)| (format!("method.response.header.{header}"), format!("'{value}'")))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiDeclaration {
    pub name: String,
    pub description: Option<String>,
}

impl RestApiDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        let mut properties = json!({ "Name": self.name });
        if let Some(description) = &self.description {
            properties["Description"] = json!(description);
        }
        CfnResource::new(REST_API_TYPE, properties)
    }
}

/// A path segment under the API root (`parent: None`) or another resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResourceDeclaration {
    pub rest_api: String,
    pub parent: Option<String>,
    pub path_part: String,
}

impl ApiResourceDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        CfnResource::new(
            API_RESOURCE_TYPE,
            json!({
                "ParentId": resource_id(&self.rest_api, self.parent.as_deref()),
                "PathPart": self.path_part,
                "RestApiId": reference(&self.rest_api),
            }),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Integration {
    /// Synchronous `AWS_PROXY` invocation of one function.
    LambdaProxy { function: String },
    /// Static preflight answer.
    CorsPreflight(CorsOptions),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDeclaration {
    pub rest_api: String,
    pub resource: Option<String>,
    pub http_method: String,
    pub integration: Integration,
}

impl MethodDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        let mut properties = json!({
            "HttpMethod": self.http_method,
            "ResourceId": resource_id(&self.rest_api, self.resource.as_deref()),
            "RestApiId": reference(&self.rest_api),
            "AuthorizationType": "NONE",
        });

        match &self.integration {
            Integration::LambdaProxy { function } => {
                properties["Integration"] = json!({
                    "IntegrationHttpMethod": "POST",
                    "Type": "AWS_PROXY",
                    "Uri": join(vec![
                        json!("arn:"),
                        reference("AWS::Partition"),
                        json!(":apigateway:"),
                        reference("AWS::Region"),
                        json!(":lambda:path/2015-03-31/functions/"),
                        get_att(function, "Arn"),
                        json!("/invocations"),
                    ]),
                });
            }
            Integration::CorsPreflight(cors) => {
                let parameters = cors.response_parameters();
                let integration_parameters = parameters
                    .iter()
                    .map(|(name, value)| (name.clone(), Value::from(value.as_str())))
                    .collect::<Map<_, _>>();
                let method_parameters = parameters
                    .iter()
                    .map(|(name, _)| (name.clone(), Value::Bool(true)))
                    .collect::<Map<_, _>>();

                properties["Integration"] = json!({
                    "IntegrationResponses": [{
                        "ResponseParameters": integration_parameters,
                        "StatusCode": PREFLIGHT_STATUS,
                    }],
                    "RequestTemplates": { "application/json": "{ statusCode: 200 }" },
                    "Type": "MOCK",
                });
                properties["MethodResponses"] = json!([{
                    "ResponseParameters": method_parameters,
                    "StatusCode": PREFLIGHT_STATUS,
                }]);
            }
        }

        CfnResource::new(METHOD_TYPE, properties)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDeclaration {
    pub rest_api: String,
    pub description: String,
    pub methods: Vec<String>,
}

impl DeploymentDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        CfnResource::new(
            DEPLOYMENT_TYPE,
            json!({
                "Description": self.description,
                "RestApiId": reference(&self.rest_api),
            }),
        )
        .with_depends_on(self.methods.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDeclaration {
    pub rest_api: String,
    pub deployment: String,
    pub stage_name: String,
}

impl StageDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        CfnResource::new(
            STAGE_TYPE,
            json!({
                "DeploymentId": reference(&self.deployment),
                "RestApiId": reference(&self.rest_api),
                "StageName": self.stage_name,
            }),
        )
    }
}

fn resource_id(rest_api: &str, resource: Option<&str>) -> Value {
    match resource {
        Some(resource) => reference(resource),
        None => get_att(rest_api, "RootResourceId"),
    }
}

/// `https://{api}.execute-api.{region}.{suffix}/{stage}/`
pub fn api_url(rest_api: &str, stage: &str) -> Value {
    join(vec![
        json!("https://"),
        reference(rest_api),
        json!(".execute-api."),
        reference("AWS::Region"),
        json!("."),
        reference("AWS::URLSuffix"),
        json!("/"),
        reference(stage),
        json!("/"),
    ])
}

/// `arn:{partition}:execute-api:{region}:{account}:{api}/{stage}/{method}{path}`
pub fn execute_api_arn(rest_api: &str, stage: Value, http_method: &str, path: &str) -> Value {
    join(vec![
        json!("arn:"),
        reference("AWS::Partition"),
        json!(":execute-api:"),
        reference("AWS::Region"),
        json!(":"),
        reference("AWS::AccountId"),
        json!(":"),
        reference(rest_api),
        json!("/"),
        stage,
        json!(format!("/{http_method}{path}")),
    ])
}

/// Checks a deployed `ApiUrl` output value against the regional endpoint
/// format, e.g. `https://a1b2c3d4e5.execute-api.us-east-1.amazonaws.com/prod/`.
pub fn is_api_base_url(url: &str) -> bool {
    let Some(rest) = url.strip_prefix("https://") else {
        return false;
    };
    let Some((host, path)) = rest.split_once('/') else {
        return false;
    };

    let mut labels = host.splitn(3, '.');
    let (Some(api_id), Some(service), Some(region_and_suffix)) =
        (labels.next(), labels.next(), labels.next())
    else {
        return false;
    };
    let Some((region, suffix)) = region_and_suffix.split_once('.') else {
        return false;
    };

    let api_id_ok = !api_id.is_empty() && api_id.chars().all(|c| c.is_ascii_alphanumeric());
    let region_ok = !region.is_empty()
        && region
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let suffix_ok = matches!(suffix, "amazonaws.com" | "amazonaws.com.cn");
    let stage = path.strip_suffix('/').unwrap_or("");
    let stage_ok = !stage.is_empty() && !stage.contains('/');

    api_id_ok && service == "execute-api" && region_ok && suffix_ok && stage_ok
}
