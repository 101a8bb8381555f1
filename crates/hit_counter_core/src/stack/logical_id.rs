use sha2::{Digest, Sha256};

const MAX_HUMAN_LEN: usize = 240;
const HASH_LEN: usize = 8;

/// Path components that name a construct's primary resource and are left out
/// of the human-readable part of a logical ID.
const HIDDEN_COMPONENTS: [&str; 2] = ["Resource", "Default"];

/// Derives a template-unique logical ID from a construct path.
///
/// Single-component paths (top-level outputs) map to their sanitized name.
/// Deeper paths get the concatenated visible components plus an 8-character
/// uppercase sha256 suffix of the full path.
pub fn logical_id(path: &[&str]) -> String {
    if let [only] = path {
        return remove_non_alphanumeric(only);
    }

    let human = path
        .iter()
        .filter(|component| !HIDDEN_COMPONENTS.contains(*component))
        .map(|component| remove_non_alphanumeric(component))
        .collect::<String>();
    let human = human.chars().take(MAX_HUMAN_LEN).collect::<String>();

    format!("{human}{}", path_hash(path))
}

fn path_hash(path: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.join("/"));
    let digest = format!("{:X}", hasher.finalize());
    digest[..HASH_LEN].to_string()
}

fn remove_non_alphanumeric(component: &str) -> String {
    component
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}
