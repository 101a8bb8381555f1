#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    DuplicateLogicalId {
        logical_id: String,
    },
    DuplicateKeyAttribute {
        name: String,
    },
    InvalidProperty {
        logical_id: String,
        message: String,
    },
    DanglingReference {
        from: String,
        target: String,
    },
    InvalidGrant {
        policy: String,
        message: String,
    },
    MissingIntegrationTarget {
        method: String,
        target: String,
    },
    UnknownResource {
        logical_id: String,
    },
}

impl std::fmt::Display for SynthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateLogicalId { logical_id } => {
                write!(f, "duplicate logical id '{logical_id}'")
            }
            Self::DuplicateKeyAttribute { name } => {
                write!(f, "key attribute '{name}' is declared more than once")
            }
            Self::InvalidProperty {
                logical_id,
                message,
            } => write!(f, "invalid property on '{logical_id}': {message}"),
            Self::DanglingReference { from, target } => {
                write!(f, "'{from}' references undeclared resource '{target}'")
            }
            Self::InvalidGrant { policy, message } => {
                write!(f, "invalid grant in '{policy}': {message}")
            }
            Self::MissingIntegrationTarget { method, target } => write!(
                f,
                "method '{method}' integrates with '{target}', which is not a declared function"
            ),
            Self::UnknownResource { logical_id } => {
                write!(f, "no resource declared under '{logical_id}'")
            }
        }
    }
}

impl std::error::Error for SynthError {}
