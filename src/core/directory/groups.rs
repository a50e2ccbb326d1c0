//! Group and role normalization shared by every backend
//!
//! Directory group names map onto application roles by convention: `APP_*`
//! becomes `ROLE_*`, `ROLE_*` passes through, and anything else (provider
//! internals like `offline_access`, distribution lists, etc.) is dropped.

use std::collections::HashSet;

/// Normalize a set of raw group/role names into application roles
pub fn normalize_roles<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| {
            let name = name.as_ref();
            if let Some(rest) = name.strip_prefix("APP_") {
                Some(format!("ROLE_{rest}"))
            } else if name.starts_with("ROLE_") {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Extract the CN component from a group DN like
/// `CN=GroupName,OU=Groups,DC=example,DC=com`
pub fn group_cn(dn: &str) -> String {
    let lower = dn.get(..3).map(str::to_ascii_lowercase);
    if lower.as_deref() == Some("cn=") {
        let rest = &dn[3..];
        match rest.find(',') {
            Some(comma) => rest[..comma].to_string(),
            None => rest.to_string(),
        }
    } else {
        dn.to_string()
    }
}
