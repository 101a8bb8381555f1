//! Typed declaration of a stack and its synthesis to a CloudFormation template.
//!
//! Declarations are registered under logical IDs derived from construct paths.
//! `Stack::synthesize` validates the whole graph (references, grants, method
//! integrations) before rendering, so an invalid stack never yields a template.

pub mod api;
pub mod constructs;
pub mod error;
pub mod function;
pub mod hit_counter;
pub mod iam;
pub mod logical_id;
pub mod table;
pub mod template;

use std::collections::BTreeMap;

use serde_json::Value;

use api::{
    ApiResourceDeclaration, DeploymentDeclaration, Integration, MethodDeclaration,
    RestApiDeclaration, StageDeclaration,
};
use error::SynthError;
use function::{FunctionDeclaration, PermissionDeclaration};
use iam::{read_write_data_actions, PolicyDeclaration, RoleDeclaration};
use logical_id::logical_id;
use table::TableDeclaration;
use template::{
    collect_references, is_pseudo_parameter, CfnOutput, CfnResource, Template,
    TEMPLATE_FORMAT_VERSION,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Table(TableDeclaration),
    Role(RoleDeclaration),
    Policy(PolicyDeclaration),
    Function(FunctionDeclaration),
    Permission(PermissionDeclaration),
    RestApi(RestApiDeclaration),
    ApiResource(ApiResourceDeclaration),
    Method(MethodDeclaration),
    Deployment(DeploymentDeclaration),
    Stage(StageDeclaration),
}

impl Declaration {
    fn check(&self, logical_id: &str) -> Result<(), SynthError> {
        match self {
            Self::Table(table) => table.check(logical_id),
            Self::Function(function) => function.check(logical_id),
            _ => Ok(()),
        }
    }

    fn to_resource(&self, logical_id: &str) -> CfnResource {
        match self {
            Self::Table(table) => table.to_resource(),
            Self::Role(role) => role.to_resource(),
            Self::Policy(policy) => policy.to_resource(logical_id),
            Self::Function(function) => function.to_resource(),
            Self::Permission(permission) => permission.to_resource(),
            Self::RestApi(rest_api) => rest_api.to_resource(),
            Self::ApiResource(resource) => resource.to_resource(),
            Self::Method(method) => method.to_resource(),
            Self::Deployment(deployment) => deployment.to_resource(),
            Self::Stage(stage) => stage.to_resource(),
        }
    }
}

macro_rules! impl_from_declaration {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for Declaration {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

impl_from_declaration! {
    Table => TableDeclaration,
    Role => RoleDeclaration,
    Policy => PolicyDeclaration,
    Function => FunctionDeclaration,
    Permission => PermissionDeclaration,
    RestApi => RestApiDeclaration,
    ApiResource => ApiResourceDeclaration,
    Method => MethodDeclaration,
    Deployment => DeploymentDeclaration,
    Stage => StageDeclaration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    name: String,
    description: Option<String>,
    declarations: BTreeMap<String, Declaration>,
    outputs: BTreeMap<String, CfnOutput>,
}

impl Stack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            declarations: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a declaration at a construct path and returns its logical ID.
    pub fn declare(
        &mut self,
        path: &[&str],
        declaration: impl Into<Declaration>,
    ) -> Result<String, SynthError> {
        let id = logical_id(path);
        if self.is_taken(&id) {
            return Err(SynthError::DuplicateLogicalId { logical_id: id });
        }
        self.declarations.insert(id.clone(), declaration.into());
        Ok(id)
    }

    pub fn add_output(
        &mut self,
        construct_id: &str,
        value: Value,
        description: Option<&str>,
    ) -> Result<String, SynthError> {
        let id = logical_id(&[construct_id]);
        if self.is_taken(&id) {
            return Err(SynthError::DuplicateLogicalId { logical_id: id });
        }
        self.outputs.insert(
            id.clone(),
            CfnOutput {
                description: description.map(str::to_string),
                value,
            },
        );
        Ok(id)
    }

    pub fn declaration(&self, logical_id: &str) -> Option<&Declaration> {
        self.declarations.get(logical_id)
    }

    pub fn declaration_mut(&mut self, logical_id: &str) -> Option<&mut Declaration> {
        self.declarations.get_mut(logical_id)
    }

    fn is_taken(&self, id: &str) -> bool {
        self.declarations.contains_key(id) || self.outputs.contains_key(id)
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        for (id, declaration) in &self.declarations {
            declaration.check(id)?;
        }

        for (id, declaration) in &self.declarations {
            let resource = declaration.to_resource(id);
            let mut targets = Vec::new();
            collect_references(&resource.properties, &mut targets);
            targets.extend(resource.depends_on.iter().cloned());
            self.check_references(id, &targets)?;
        }

        for (id, output) in &self.outputs {
            let mut targets = Vec::new();
            collect_references(&output.value, &mut targets);
            self.check_references(id, &targets)?;
        }

        for (id, declaration) in &self.declarations {
            match declaration {
                Declaration::Policy(policy) => self.check_grant(id, policy)?,
                Declaration::Method(method) => self.check_method(id, method)?,
                Declaration::Function(function) => {
                    if !matches!(
                        self.declaration(&function.role),
                        Some(Declaration::Role(_))
                    ) {
                        return Err(SynthError::InvalidProperty {
                            logical_id: id.clone(),
                            message: format!("execution role '{}' is not a role", function.role),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn check_references(&self, from: &str, targets: &[String]) -> Result<(), SynthError> {
        for target in targets {
            if !is_pseudo_parameter(target) && !self.declarations.contains_key(target) {
                return Err(SynthError::DanglingReference {
                    from: from.to_string(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }

    /// Data grants must name table ARNs explicitly and stay within the
    /// table's read/write data actions.
    fn check_grant(&self, id: &str, policy: &PolicyDeclaration) -> Result<(), SynthError> {
        let invalid = |message: String| SynthError::InvalidGrant {
            policy: id.to_string(),
            message,
        };

        if !matches!(self.declaration(&policy.role), Some(Declaration::Role(_))) {
            return Err(invalid(format!("'{}' is not a role", policy.role)));
        }
        if policy.statements.is_empty() {
            return Err(invalid("policy has no statements".to_string()));
        }

        let allowed = read_write_data_actions();
        for statement in &policy.statements {
            if statement.resources.is_empty() {
                return Err(invalid("statement has no resources".to_string()));
            }
            for resource in &statement.resources {
                let table = table_arn_target(resource)
                    .ok_or_else(|| invalid(format!("resource {resource} is not a table ARN")))?;
                if !matches!(self.declaration(table), Some(Declaration::Table(_))) {
                    return Err(invalid(format!("'{table}' is not a table")));
                }
            }
            for action in &statement.actions {
                if !allowed.contains(action) {
                    return Err(invalid(format!(
                        "action '{action}' exceeds table read/write data access"
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_method(&self, id: &str, method: &MethodDeclaration) -> Result<(), SynthError> {
        if !matches!(self.declaration(&method.rest_api), Some(Declaration::RestApi(_))) {
            return Err(SynthError::InvalidProperty {
                logical_id: id.to_string(),
                message: format!("'{}' is not a REST API", method.rest_api),
            });
        }
        if let Some(resource) = &method.resource {
            match self.declaration(resource) {
                Some(Declaration::ApiResource(api_resource))
                    if api_resource.rest_api == method.rest_api => {}
                _ => {
                    return Err(SynthError::InvalidProperty {
                        logical_id: id.to_string(),
                        message: format!("'{resource}' is not a resource of this API"),
                    });
                }
            }
        }

        match &method.integration {
            Integration::LambdaProxy { function } => {
                if !matches!(self.declaration(function), Some(Declaration::Function(_))) {
                    return Err(SynthError::MissingIntegrationTarget {
                        method: id.to_string(),
                        target: function.clone(),
                    });
                }
            }
            Integration::CorsPreflight(_) => {
                if method.http_method != "OPTIONS" {
                    return Err(SynthError::InvalidProperty {
                        logical_id: id.to_string(),
                        message: "preflight integrations only answer OPTIONS".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn synthesize(&self) -> Result<Template, SynthError> {
        self.validate()?;

        let resources = self
            .declarations
            .iter()
            .map(|(id, declaration)| (id.clone(), declaration.to_resource(id)))
            .collect();

        Ok(Template {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: self.description.clone(),
            resources,
            outputs: self.outputs.clone(),
        })
    }
}

fn table_arn_target(resource: &Value) -> Option<&str> {
    let parts = resource.get("Fn::GetAtt")?.as_array()?;
    match parts.as_slice() {
        [Value::String(target), Value::String(attribute)] if attribute == "Arn" => {
            Some(target.as_str())
        }
        _ => None,
    }
}
