//! Multi-resource helpers: a function with its service role, table data
//! grants, and a REST API with default CORS preflight and deployment.

use serde_json::json;
use sha2::{Digest, Sha256};

use super::api::{
    execute_api_arn, ApiResourceDeclaration, CorsOptions, DeploymentDeclaration, Integration,
    MethodDeclaration, RestApiDeclaration, StageDeclaration, API_GATEWAY_PRINCIPAL,
};
use super::error::SynthError;
use super::function::{CodeAsset, FunctionDeclaration, PermissionDeclaration};
use super::iam::{read_write_data_actions, PolicyDeclaration, PolicyStatement, RoleDeclaration};
use super::template::{get_att, reference};
use super::{Declaration, Stack};

const DEPLOYMENT_DESCRIPTION: &str = "Automatically created by the RestApi construct";
const TEST_INVOKE_STAGE: &str = "test-invoke-stage";
const DEPLOYMENT_DIGEST_LEN: usize = 32;

fn declare_at(
    stack: &mut Stack,
    path: &[String],
    declaration: impl Into<Declaration>,
) -> Result<String, SynthError> {
    let parts = path.iter().map(String::as_str).collect::<Vec<_>>();
    stack.declare(&parts, declaration)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFunction {
    pub construct_id: String,
    pub function: String,
    pub role: String,
    pub policy: Option<String>,
}

/// Declares a function together with its service role.
pub fn declare_function(
    stack: &mut Stack,
    construct_id: &str,
    code: CodeAsset,
    configure: impl FnOnce(FunctionDeclaration) -> FunctionDeclaration,
) -> Result<DeclaredFunction, SynthError> {
    let role = stack.declare(
        &[construct_id, "ServiceRole", "Resource"],
        RoleDeclaration::lambda_service_role(),
    )?;
    let declaration = configure(FunctionDeclaration::new(code, role.clone()));
    let function = stack.declare(&[construct_id, "Resource"], declaration)?;

    Ok(DeclaredFunction {
        construct_id: construct_id.to_string(),
        function,
        role,
        policy: None,
    })
}

/// Grants read/write data access on one table to a function's role through
/// the role's default policy.
pub fn grant_read_write_data(
    stack: &mut Stack,
    table: &str,
    grantee: &mut DeclaredFunction,
) -> Result<(), SynthError> {
    if !matches!(stack.declaration(table), Some(Declaration::Table(_))) {
        return Err(SynthError::UnknownResource {
            logical_id: table.to_string(),
        });
    }

    let statement = PolicyStatement {
        actions: read_write_data_actions(),
        resources: vec![get_att(table, "Arn")],
    };

    if let Some(policy_id) = &grantee.policy {
        return match stack.declaration_mut(policy_id) {
            Some(Declaration::Policy(policy)) => {
                policy.add_statement(statement);
                Ok(())
            }
            _ => Err(SynthError::UnknownResource {
                logical_id: policy_id.clone(),
            }),
        };
    }

    let mut policy = PolicyDeclaration::new(grantee.role.clone());
    policy.add_statement(statement);
    let policy_id = stack.declare(
        &[
            grantee.construct_id.as_str(),
            "ServiceRole",
            "DefaultPolicy",
            "Resource",
        ],
        policy,
    )?;

    // the function must not start before its permissions exist
    match stack.declaration_mut(&grantee.function) {
        Some(Declaration::Function(function)) => function.depends_on.insert(0, policy_id.clone()),
        _ => {
            return Err(SynthError::UnknownResource {
                logical_id: grantee.function.clone(),
            })
        }
    }
    grantee.policy = Some(policy_id);
    Ok(())
}

/// A position in a REST API's resource tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiPath {
    pub resource: Option<String>,
    pub http_path: String,
    construct_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ProxyRoute {
    function: String,
    http_method: String,
    http_path: String,
    construct_path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedApi {
    pub deployment: String,
    pub stage: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredRestApi {
    construct_id: String,
    pub rest_api: String,
    cors: Option<CorsOptions>,
    resources: Vec<String>,
    methods: Vec<String>,
    routes: Vec<ProxyRoute>,
}

impl DeclaredRestApi {
    pub fn declare(
        stack: &mut Stack,
        construct_id: &str,
        declaration: RestApiDeclaration,
        cors: Option<CorsOptions>,
    ) -> Result<Self, SynthError> {
        let rest_api = stack.declare(&[construct_id, "Resource"], declaration)?;
        let mut api = Self {
            construct_id: construct_id.to_string(),
            rest_api,
            cors,
            resources: Vec::new(),
            methods: Vec::new(),
            routes: Vec::new(),
        };
        let root = api.root();
        api.add_preflight(stack, &root)?;
        Ok(api)
    }

    pub fn root(&self) -> ApiPath {
        ApiPath {
            resource: None,
            http_path: "/".to_string(),
            construct_path: vec![self.construct_id.clone(), "Default".to_string()],
        }
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn add_resource(
        &mut self,
        stack: &mut Stack,
        parent: &ApiPath,
        path_part: &str,
    ) -> Result<ApiPath, SynthError> {
        if path_part.is_empty() || path_part.contains('/') {
            return Err(SynthError::InvalidProperty {
                logical_id: self.rest_api.clone(),
                message: format!("invalid path part '{path_part}'"),
            });
        }

        let mut construct_path = parent.construct_path.clone();
        construct_path.push(path_part.to_string());
        let mut resource_path = construct_path.clone();
        resource_path.push("Resource".to_string());

        let resource = declare_at(
            stack,
            &resource_path,
            ApiResourceDeclaration {
                rest_api: self.rest_api.clone(),
                parent: parent.resource.clone(),
                path_part: path_part.to_string(),
            },
        )?;

        let http_path = if parent.http_path == "/" {
            format!("/{path_part}")
        } else {
            format!("{}/{path_part}", parent.http_path)
        };
        self.resources.push(resource.clone());
        let path = ApiPath {
            resource: Some(resource),
            http_path,
            construct_path,
        };
        self.add_preflight(stack, &path)?;
        Ok(path)
    }

    pub fn add_lambda_method(
        &mut self,
        stack: &mut Stack,
        at: &ApiPath,
        http_method: &str,
        function: &str,
    ) -> Result<String, SynthError> {
        let mut construct_path = at.construct_path.clone();
        construct_path.push(http_method.to_string());

        let id = self.add_method(
            stack,
            at,
            http_method,
            Integration::LambdaProxy {
                function: function.to_string(),
            },
        )?;
        self.routes.push(ProxyRoute {
            function: function.to_string(),
            http_method: http_method.to_string(),
            http_path: at.http_path.clone(),
            construct_path,
        });
        Ok(id)
    }

    fn add_preflight(&mut self, stack: &mut Stack, at: &ApiPath) -> Result<(), SynthError> {
        if let Some(cors) = self.cors.clone() {
            self.add_method(stack, at, "OPTIONS", Integration::CorsPreflight(cors))?;
        }
        Ok(())
    }

    fn add_method(
        &mut self,
        stack: &mut Stack,
        at: &ApiPath,
        http_method: &str,
        integration: Integration,
    ) -> Result<String, SynthError> {
        let mut method_path = at.construct_path.clone();
        method_path.push(http_method.to_string());
        method_path.push("Resource".to_string());

        let id = declare_at(
            stack,
            &method_path,
            MethodDeclaration {
                rest_api: self.rest_api.clone(),
                resource: at.resource.clone(),
                http_method: http_method.to_string(),
                integration,
            },
        )?;
        self.methods.push(id.clone());
        Ok(id)
    }

    /// Digest of the rendered API, resources and methods. Any change to them
    /// yields a new deployment logical ID.
    fn deployment_digest(&self, stack: &Stack) -> String {
        let mut hasher = Sha256::new();
        let members = std::iter::once(&self.rest_api)
            .chain(&self.resources)
            .chain(&self.methods);
        for id in members {
            if let Some(declaration) = stack.declaration(id) {
                let resource = declaration.to_resource(id);
                hasher.update(id.as_bytes());
                hasher.update(resource.resource_type.as_bytes());
                hasher.update(resource.properties.to_string().as_bytes());
                hasher.update(resource.depends_on.join(",").as_bytes());
            }
        }
        let digest = format!("{:X}", hasher.finalize());
        digest[..DEPLOYMENT_DIGEST_LEN].to_string()
    }

    /// Declares the deployment, its stage and the invoke permissions for every
    /// proxy route added so far.
    pub fn deploy(&self, stack: &mut Stack, stage_name: &str) -> Result<DeployedApi, SynthError> {
        let digest = self.deployment_digest(stack);
        let deployment = stack.declare(
            &[
                self.construct_id.as_str(),
                "Deployment",
                "Resource",
                digest.as_str(),
            ],
            DeploymentDeclaration {
                rest_api: self.rest_api.clone(),
                description: DEPLOYMENT_DESCRIPTION.to_string(),
                methods: self.methods.clone(),
            },
        )?;
        let stage_construct = format!("DeploymentStage.{stage_name}");
        let stage = stack.declare(
            &[self.construct_id.as_str(), stage_construct.as_str(), "Resource"],
            StageDeclaration {
                rest_api: self.rest_api.clone(),
                deployment: deployment.clone(),
                stage_name: stage_name.to_string(),
            },
        )?;

        let mut permissions = Vec::with_capacity(self.routes.len() * 2);
        for route in &self.routes {
            for (suffix, stage_value) in [
                ("ApiPermission", reference(&stage)),
                ("ApiPermission.Test", json!(TEST_INVOKE_STAGE)),
            ] {
                let mut path = route.construct_path.clone();
                path.push(suffix.to_string());
                let source_arn = execute_api_arn(
                    &self.rest_api,
                    stage_value,
                    &route.http_method,
                    &route.http_path,
                );
                permissions.push(declare_at(
                    stack,
                    &path,
                    PermissionDeclaration {
                        function: route.function.clone(),
                        principal: API_GATEWAY_PRINCIPAL.to_string(),
                        source_arn,
                    },
                )?);
            }
        }

        Ok(DeployedApi {
            deployment,
            stage,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::stack::table::{Attribute, AttributeType, TableDeclaration};

    #[test]
    fn grant_creates_default_policy_and_dependency() {
        let mut stack = Stack::new("Test");
        let table = stack
            .declare(
                &["Table", "Resource"],
                TableDeclaration::new(Attribute::new("id", AttributeType::String)),
            )
            .unwrap();
        let mut function =
            declare_function(&mut stack, "Fn", CodeAsset::from_hash("abc"), |f| f).unwrap();
        grant_read_write_data(&mut stack, &table, &mut function).unwrap();
        grant_read_write_data(&mut stack, &table, &mut function).unwrap();

        let policy_id = function.policy.clone().expect("policy should exist");
        match stack.declaration(&policy_id) {
            Some(Declaration::Policy(policy)) => assert_eq!(policy.statements.len(), 2),
            other => panic!("expected policy, got {other:?}"),
        }
        match stack.declaration(&function.function) {
            Some(Declaration::Function(declaration)) => {
                assert_eq!(declaration.depends_on, vec![policy_id, function.role.clone()]);
            }
            other => panic!("expected function, got {other:?}"),
        }
        assert!(stack.validate().is_ok());
    }

    #[test]
    fn grant_rejects_non_table_target() {
        let mut stack = Stack::new("Test");
        let mut function =
            declare_function(&mut stack, "Fn", CodeAsset::from_hash("abc"), |f| f).unwrap();
        let role = function.role.clone();
        let error = grant_read_write_data(&mut stack, &role, &mut function)
            .expect_err("role is not a table");
        assert!(matches!(error, SynthError::UnknownResource { .. }));
    }

    fn deployment_for(allow_headers: &[&str]) -> (Stack, DeployedApi) {
        let mut stack = Stack::new("Test");
        let function =
            declare_function(&mut stack, "Fn", CodeAsset::from_hash("abc"), |f| f).unwrap();
        let mut api = DeclaredRestApi::declare(
            &mut stack,
            "Api",
            RestApiDeclaration {
                name: "api".to_string(),
                description: None,
            },
            Some(CorsOptions::permissive(allow_headers, Duration::from_secs(60))),
        )
        .unwrap();
        let root = api.root();
        let items = api.add_resource(&mut stack, &root, "items").unwrap();
        api.add_lambda_method(&mut stack, &items, "POST", &function.function).unwrap();
        let deployed = api.deploy(&mut stack, "prod").unwrap();
        (stack, deployed)
    }

    #[test]
    fn deployment_id_follows_api_contents() {
        let (stack, first) = deployment_for(&["Content-Type"]);
        let (_, rebuilt) = deployment_for(&["Content-Type"]);
        let (_, widened) = deployment_for(&["Content-Type", "X-Api-Key"]);

        assert!(first.deployment.starts_with("ApiDeployment"));
        assert_eq!(first.deployment, rebuilt.deployment);
        assert_ne!(first.deployment, widened.deployment);

        match stack.declaration(&first.stage) {
            Some(Declaration::Stage(stage)) => assert_eq!(stage.deployment, first.deployment),
            other => panic!("expected stage, got {other:?}"),
        }
        assert!(stack.validate().is_ok());
    }

    #[test]
    fn nested_resources_build_http_paths() {
        let mut stack = Stack::new("Test");
        let mut api = DeclaredRestApi::declare(
            &mut stack,
            "Api",
            RestApiDeclaration {
                name: "api".to_string(),
                description: None,
            },
            Some(CorsOptions::permissive(&["Content-Type"], Duration::from_secs(60))),
        )
        .unwrap();
        let root = api.root();
        let v1 = api.add_resource(&mut stack, &root, "v1").unwrap();
        let items = api.add_resource(&mut stack, &v1, "items").unwrap();

        assert_eq!(items.http_path, "/v1/items");
        // root, v1 and items each answer preflight
        assert_eq!(api.methods().len(), 3);
        assert!(api.add_resource(&mut stack, &root, "a/b").is_err());
    }
}
