use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::error::SynthError;
use super::template::{get_att, sub, CfnResource};

pub const FUNCTION_TYPE: &str = "AWS::Lambda::Function";
pub const PERMISSION_TYPE: &str = "AWS::Lambda::Permission";

pub const ASSET_BUCKET: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";
pub const CUSTOM_RUNTIME_HANDLER: &str = "bootstrap";

const MAX_TIMEOUT: Duration = Duration::from_secs(900);
const MIN_MEMORY_MB: u32 = 128;
const MAX_MEMORY_MB: u32 = 10_240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    ProvidedAl2023,
}

impl Runtime {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProvidedAl2023 => "provided.al2023",
        }
    }
}

/// A zipped code bundle staged in the bootstrap asset bucket under its
/// content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAsset {
    sha256: String,
}

impl CodeAsset {
    pub fn from_bundle(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            sha256: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn from_hash(sha256: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
        }
    }

    pub fn hash(&self) -> &str {
        &self.sha256
    }

    pub fn s3_key(&self) -> String {
        format!("{}.zip", self.sha256)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub runtime: Runtime,
    pub handler: String,
    pub code: CodeAsset,
    pub role: String,
    pub environment: BTreeMap<String, Value>,
    pub timeout: Duration,
    pub memory_size_mb: u32,
    pub depends_on: Vec<String>,
}

impl FunctionDeclaration {
    pub fn new(code: CodeAsset, role: impl Into<String>) -> Self {
        let role = role.into();
        Self {
            runtime: Runtime::ProvidedAl2023,
            handler: CUSTOM_RUNTIME_HANDLER.to_string(),
            code,
            depends_on: vec![role.clone()],
            role,
            environment: BTreeMap::new(),
            timeout: Duration::from_secs(3),
            memory_size_mb: MIN_MEMORY_MB,
        }
    }

    pub fn environment(mut self, name: impl Into<String>, value: Value) -> Self {
        self.environment.insert(name.into(), value);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn memory_size_mb(mut self, memory_size_mb: u32) -> Self {
        self.memory_size_mb = memory_size_mb;
        self
    }

    pub fn check(&self, logical_id: &str) -> Result<(), SynthError> {
        let invalid = |message: String| SynthError::InvalidProperty {
            logical_id: logical_id.to_string(),
            message,
        };

        if self.timeout.is_zero()
            || self.timeout > MAX_TIMEOUT
            || self.timeout.subsec_nanos() != 0
        {
            return Err(invalid(format!(
                "timeout must be a whole number of seconds between 1 and {}",
                MAX_TIMEOUT.as_secs()
            )));
        }
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.memory_size_mb) {
            return Err(invalid(format!(
                "memory size must be between {MIN_MEMORY_MB} and {MAX_MEMORY_MB} MB"
            )));
        }
        if self.handler.trim().is_empty() {
            return Err(invalid("handler cannot be empty".to_string()));
        }
        if self.code.hash().is_empty() {
            return Err(invalid("code asset hash cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_resource(&self) -> CfnResource {
        let mut properties = json!({
            "Code": {
                "S3Bucket": sub(ASSET_BUCKET),
                "S3Key": self.code.s3_key(),
            },
            "Handler": self.handler,
            "MemorySize": self.memory_size_mb,
            "Role": get_att(&self.role, "Arn"),
            "Runtime": self.runtime.as_str(),
            "Timeout": self.timeout.as_secs(),
        });
        if !self.environment.is_empty() {
            properties["Environment"] = json!({ "Variables": self.environment });
        }

        CfnResource::new(FUNCTION_TYPE, properties).with_depends_on(self.depends_on.clone())
    }
}

/// Allows a service principal to invoke a function from a given source ARN.
#[derive(Debug, Clone, PartialEq)]
pub struct PermissionDeclaration {
    pub function: String,
    pub principal: String,
    pub source_arn: Value,
}

impl PermissionDeclaration {
    pub fn to_resource(&self) -> CfnResource {
        CfnResource::new(
            PERMISSION_TYPE,
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(&self.function, "Arn"),
                "Principal": self.principal,
                "SourceArn": self.source_arn,
            }),
        )
    }
}
