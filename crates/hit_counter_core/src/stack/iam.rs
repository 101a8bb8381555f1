use serde_json::{json, Value};

use super::template::{join, reference, CfnResource};

pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const POLICY_TYPE: &str = "AWS::IAM::Policy";
pub const POLICY_VERSION: &str = "2012-10-17";

pub const LAMBDA_SERVICE_PRINCIPAL: &str = "lambda.amazonaws.com";
pub const LAMBDA_BASIC_EXECUTION_POLICY: &str = "service-role/AWSLambdaBasicExecutionRole";

pub const DYNAMODB_READ_DATA_ACTIONS: [&str; 8] = [
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

pub const DYNAMODB_WRITE_DATA_ACTIONS: [&str; 5] = [
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
];

/// Union of the read and write data actions, first occurrence wins.
pub fn read_write_data_actions() -> Vec<String> {
    let mut actions: Vec<String> = Vec::new();
    for action in DYNAMODB_READ_DATA_ACTIONS
        .iter()
        .chain(DYNAMODB_WRITE_DATA_ACTIONS.iter())
    {
        if !actions.iter().any(|existing| existing == action) {
            actions.push((*action).to_string());
        }
    }
    actions
}

/// An execution role assumable by a single service principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDeclaration {
    pub service_principal: String,
    pub managed_policies: Vec<String>,
}

impl RoleDeclaration {
    pub fn lambda_service_role() -> Self {
        Self {
            service_principal: LAMBDA_SERVICE_PRINCIPAL.to_string(),
            managed_policies: vec![LAMBDA_BASIC_EXECUTION_POLICY.to_string()],
        }
    }

    pub fn to_resource(&self) -> CfnResource {
        let managed_policy_arns = self
            .managed_policies
            .iter()
            .map(|policy| {
                join(vec![
                    json!("arn:"),
                    reference("AWS::Partition"),
                    json!(format!(":iam::aws:policy/{policy}")),
                ])
            })
            .collect::<Vec<Value>>();

        CfnResource::new(
            ROLE_TYPE,
            json!({
                "AssumeRolePolicyDocument": {
                    "Statement": [{
                        "Action": "sts:AssumeRole",
                        "Effect": "Allow",
                        "Principal": { "Service": self.service_principal },
                    }],
                    "Version": POLICY_VERSION,
                },
                "ManagedPolicyArns": managed_policy_arns,
            }),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<Value>,
}

impl PolicyStatement {
    fn to_value(&self) -> Value {
        json!({
            "Action": self.actions,
            "Effect": "Allow",
            "Resource": self.resources,
        })
    }
}

/// An inline policy attached to one role.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDeclaration {
    pub role: String,
    pub statements: Vec<PolicyStatement>,
}

impl PolicyDeclaration {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            statements: Vec::new(),
        }
    }

    pub fn add_statement(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn to_resource(&self, logical_id: &str) -> CfnResource {
        let statements = self
            .statements
            .iter()
            .map(PolicyStatement::to_value)
            .collect::<Vec<Value>>();

        CfnResource::new(
            POLICY_TYPE,
            json!({
                "PolicyDocument": {
                    "Statement": statements,
                    "Version": POLICY_VERSION,
                },
                "PolicyName": logical_id,
                "Roles": [reference(&self.role)],
            }),
        )
    }
}
