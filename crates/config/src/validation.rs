//! Cross-field configuration checks

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::{Config, Result};

const KNOWN_CATEGORIES: &[&str] = &["neb", "bbdo", "storage"];

/// Validate the whole configuration after parsing
pub fn validate(config: &Config) -> Result<()> {
    if config.db.connections == 0 {
        return Err(ConfigError::InvalidValue {
            field: "db.connections",
            reason: "at least one connection is required".into(),
        });
    }
    if config.db.queries_per_transaction == 0 {
        return Err(ConfigError::InvalidValue {
            field: "db.queries_per_transaction",
            reason: "must be positive".into(),
        });
    }
    if config.spool.max_file_size == 0 {
        return Err(ConfigError::InvalidValue {
            field: "spool.max_file_size",
            reason: "must be positive".into(),
        });
    }

    let mut names = HashSet::new();
    for endpoint in &config.endpoints {
        if !names.insert(endpoint.name.as_str()) {
            return Err(ConfigError::DuplicateEndpoint(endpoint.name.clone()));
        }
        if endpoint.max_frame_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "endpoints.max_frame_size",
                reason: format!("endpoint {} needs a positive frame cap", endpoint.name),
            });
        }
        for category in &endpoint.categories {
            if !KNOWN_CATEGORIES.contains(&category.as_str()) {
                return Err(ConfigError::InvalidValue {
                    field: "endpoints.categories",
                    reason: format!("endpoint {} names unknown category {category}", endpoint.name),
                });
            }
        }
    }

    for endpoint in &config.endpoints {
        if let Some(failover) = &endpoint.failover
            && !names.contains(failover.as_str())
        {
            return Err(ConfigError::UnknownFailover {
                endpoint: endpoint.name.clone(),
                failover: failover.clone(),
            });
        }
    }

    // Walk each failover chain; revisiting a name means a cycle.
    for endpoint in &config.endpoints {
        let mut seen = HashSet::new();
        let mut current = endpoint;
        seen.insert(current.name.as_str());
        while let Some(next_name) = &current.failover {
            if !seen.insert(next_name.as_str()) {
                return Err(ConfigError::FailoverCycle(endpoint.name.clone()));
            }
            current = config
                .endpoint(next_name)
                .expect("failover references were checked above");
        }
    }

    Ok(())
}
