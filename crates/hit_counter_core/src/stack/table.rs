use serde_json::{json, Value};

use super::error::SynthError;
use super::template::{CfnResource, RemovalPolicy};

pub const TABLE_TYPE: &str = "AWS::DynamoDB::Table";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Number,
    Binary,
}

impl AttributeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingMode {
    PayPerRequest,
    Provisioned {
        read_capacity: u32,
        write_capacity: u32,
    },
}

/// A single-key (optionally composite-key) DynamoDB table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDeclaration {
    pub partition_key: Attribute,
    pub sort_key: Option<Attribute>,
    pub billing_mode: BillingMode,
    pub removal_policy: RemovalPolicy,
}

impl TableDeclaration {
    /// Provisioned-throughput tables are retained by default, like any
    /// stateful resource.
    pub fn new(partition_key: Attribute) -> Self {
        Self {
            partition_key,
            sort_key: None,
            billing_mode: BillingMode::Provisioned {
                read_capacity: 5,
                write_capacity: 5,
            },
            removal_policy: RemovalPolicy::Retain,
        }
    }

    pub fn sort_key(mut self, sort_key: Attribute) -> Self {
        self.sort_key = Some(sort_key);
        self
    }

    pub fn billing_mode(mut self, billing_mode: BillingMode) -> Self {
        self.billing_mode = billing_mode;
        self
    }

    pub fn removal_policy(mut self, removal_policy: RemovalPolicy) -> Self {
        self.removal_policy = removal_policy;
        self
    }

    pub fn key_attributes(&self) -> Vec<&Attribute> {
        std::iter::once(&self.partition_key)
            .chain(self.sort_key.as_ref())
            .collect()
    }

    pub fn check(&self, logical_id: &str) -> Result<(), SynthError> {
        for attribute in self.key_attributes() {
            if attribute.name.trim().is_empty() {
                return Err(SynthError::InvalidProperty {
                    logical_id: logical_id.to_string(),
                    message: "key attribute names must be non-empty".to_string(),
                });
            }
        }

        if let Some(sort_key) = &self.sort_key {
            if sort_key.name == self.partition_key.name {
                return Err(SynthError::DuplicateKeyAttribute {
                    name: sort_key.name.clone(),
                });
            }
        }

        if let BillingMode::Provisioned {
            read_capacity,
            write_capacity,
        } = self.billing_mode
        {
            if read_capacity == 0 || write_capacity == 0 {
                return Err(SynthError::InvalidProperty {
                    logical_id: logical_id.to_string(),
                    message: "provisioned capacity must be a positive integer".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn to_resource(&self) -> CfnResource {
        let mut key_schema = vec![json!({
            "AttributeName": self.partition_key.name,
            "KeyType": "HASH",
        })];
        if let Some(sort_key) = &self.sort_key {
            key_schema.push(json!({
                "AttributeName": sort_key.name,
                "KeyType": "RANGE",
            }));
        }

        let attribute_definitions = self
            .key_attributes()
            .into_iter()
            .map(|attribute| {
                json!({
                    "AttributeName": attribute.name,
                    "AttributeType": attribute.attribute_type.as_str(),
                })
            })
            .collect::<Vec<Value>>();

        let mut properties = json!({
            "KeySchema": key_schema,
            "AttributeDefinitions": attribute_definitions,
        });
        match self.billing_mode {
            BillingMode::PayPerRequest => {
                properties["BillingMode"] = json!("PAY_PER_REQUEST");
            }
            BillingMode::Provisioned {
                read_capacity,
                write_capacity,
            } => {
                properties["ProvisionedThroughput"] = json!({
                    "ReadCapacityUnits": read_capacity,
                    "WriteCapacityUnits": write_capacity,
                });
            }
        }

        CfnResource::new(TABLE_TYPE, properties).with_removal_policy(self.removal_policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_demand_table_omits_throughput() {
        let table = TableDeclaration::new(Attribute::new("pagePath", AttributeType::String))
            .billing_mode(BillingMode::PayPerRequest)
            .removal_policy(RemovalPolicy::Destroy);

        let resource = table.to_resource();
        assert_eq!(resource.properties["BillingMode"], "PAY_PER_REQUEST");
        assert!(resource.properties.get("ProvisionedThroughput").is_none());
        assert_eq!(resource.deletion_policy, Some(RemovalPolicy::Destroy));
    }

    #[test]
    fn rejects_duplicate_key_names() {
        let table = TableDeclaration::new(Attribute::new("pagePath", AttributeType::String))
            .sort_key(Attribute::new("pagePath", AttributeType::Number));

        let error = table.check("Table").expect_err("duplicate key should fail");
        assert_eq!(
            error,
            SynthError::DuplicateKeyAttribute {
                name: "pagePath".to_string()
            }
        );
    }

    #[test]
    fn default_table_is_provisioned_and_retained() {
        let table = TableDeclaration::new(Attribute::new("id", AttributeType::Binary));
        let resource = table.to_resource();
        assert_eq!(
            resource.properties["ProvisionedThroughput"]["ReadCapacityUnits"],
            5
        );
        assert_eq!(resource.deletion_policy, Some(RemovalPolicy::Retain));
        assert_eq!(resource.properties["AttributeDefinitions"][0]["AttributeType"], "B");
    }
}
