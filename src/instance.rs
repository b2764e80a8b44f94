//! Naming conventions for resources derived from an instance
//!
//! Every cluster object the janitor manages for an instance is named after
//! the instance uid: the root ConfigMap is the bare uid, everything else is
//! `<uid>-<suffix>`. Ownership checks for bulk operations use the same rule,
//! so `grafana-42` owns `grafana-42-dashboards` but not `grafana-420`.

use crate::proto::Instance;
use crate::Error;

/// Suffix of the htpasswd Secret
pub const AUTH_SECRET_SUFFIX: &str = "auth";

/// Suffix of the TLS Secret provisioned by cert-manager
pub const TLS_SECRET_SUFFIX: &str = "tls";

/// Name of the ConfigMap holding one directory of the configuration tree.
///
/// The root directory (`""`) maps to the bare uid.
pub fn config_map_name(uid: &str, directory: &str) -> String {
    if directory.is_empty() {
        uid.to_string()
    } else {
        format!("{uid}-{directory}")
    }
}

/// Name of the htpasswd Secret
pub fn auth_secret_name(uid: &str) -> String {
    format!("{uid}-{AUTH_SECRET_SUFFIX}")
}

/// Name of the TLS Secret
pub fn tls_secret_name(uid: &str) -> String {
    format!("{uid}-{TLS_SECRET_SUFFIX}")
}

/// Whether `name` carries the instance prefix `<uid>-`
pub fn has_instance_prefix(uid: &str, name: &str) -> bool {
    name.strip_prefix(uid)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Whether a ConfigMap called `name` belongs to the instance
pub fn owns_config_map(uid: &str, name: &str) -> bool {
    name == uid || has_instance_prefix(uid, name)
}

/// Take the instance out of a request, rejecting requests without one
pub fn require_instance(instance: Option<Instance>) -> Result<Instance, Error> {
    let instance = instance.ok_or_else(|| Error::invalid_request("request carries no instance"))?;
    if instance.uid.is_empty() {
        return Err(Error::invalid_request("instance uid is empty"));
    }
    if instance.namespace.is_empty() {
        return Err(Error::invalid_request("instance namespace is empty"));
    }
    Ok(instance)
}
