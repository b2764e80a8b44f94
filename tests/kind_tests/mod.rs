//! Integration tests for the janitor services
//!
//! Tests are organized by the story they tell:
//!
//! - `config_maps`: a configuration repository becomes instance ConfigMaps,
//!   and goes away again
//! - `secrets`: basic-auth Secrets are created, rotated and removed
//! - `readiness`: workloads are probed for readiness
//! - `namespaces`: namespaces are provisioned and conflicts are reported
//!
//! GitLab is not contacted; `helpers::StaticRepository` serves an in-memory
//! repository instead.

mod config_maps;
mod helpers;
mod namespaces;
mod readiness;
mod secrets;
