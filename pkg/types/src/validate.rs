use anyhow::{Result, bail};

/// Validate an object name.
/// Rules (DNS-1123 subdomain): lowercase `[a-z0-9-.]`, max 253 chars,
/// every dot-separated segment starts and ends with an alphanumeric.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > 253 {
        bail!("name '{}' exceeds 253 characters (got {})", name, name.len());
    }
    for segment in name.split('.') {
        check_label(name, segment)?;
    }
    Ok(())
}

/// Validate a namespace name.
/// Rules (DNS-1123 label): lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        bail!("namespace must not be empty");
    }
    if namespace.len() > 63 {
        bail!(
            "namespace '{}' exceeds 63 characters (got {})",
            namespace,
            namespace.len()
        );
    }
    check_label(namespace, namespace)
}

fn check_label(whole: &str, label: &str) -> Result<()> {
    if label.is_empty() {
        bail!("'{}' must not contain empty segments", whole);
    }
    if label.starts_with('-') || label.ends_with('-') {
        bail!("'{}' must not start or end with a hyphen", whole);
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "'{}' must contain only lowercase letters, digits, hyphens and dots",
            whole
        );
    }
    Ok(())
}
