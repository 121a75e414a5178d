//! Model validation: identifiers, role groups and column references.

use crate::config::{EntityConfig, ModelConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn route_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").expect("static regex"))
}

fn check_identifier(s: &str) -> Result<(), ConfigError> {
    if identifier_re().is_match(s) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(s.to_string()))
    }
}

fn check_route_fragment(s: &str) -> Result<(), ConfigError> {
    if route_name_re().is_match(s) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(s.to_string()))
    }
}

/// Expand `@group` references into role names. Plain entries are taken as roles.
pub fn expand_roles(config: &ModelConfig, roles: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut out: Vec<String> = Vec::new();
    for r in roles {
        if let Some(group) = r.strip_prefix('@') {
            let members = config
                .role_groups
                .get(group)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "role group",
                    id: group.to_string(),
                })?;
            for m in members {
                if !out.contains(m) {
                    out.push(m.clone());
                }
            }
        } else if !out.contains(r) {
            out.push(r.clone());
        }
    }
    Ok(out)
}

pub fn validate(config: &ModelConfig) -> Result<(), ConfigError> {
    if config.entities.is_empty() {
        return Err(ConfigError::Validation("at least one entity required".into()));
    }
    let auth = &config.auth;
    for ident in [
        &auth.table,
        &auth.id_column,
        &auth.name_column,
        &auth.email_column,
        &auth.password_column,
        &auth.roles_column,
    ] {
        check_identifier(ident)?;
    }

    let mut entity_names = HashSet::new();
    for e in &config.entities {
        validate_entity(config, e)?;
        if !entity_names.insert(e.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate entity: {}", e.name)));
        }
    }

    let mut ports = HashSet::new();
    for s in &config.services {
        if !ports.insert(s.port) {
            return Err(ConfigError::Validation(format!("port {} used by more than one service", s.port)));
        }
        for name in &s.entities {
            if !entity_names.contains(name.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_entity(config: &ModelConfig, e: &EntityConfig) -> Result<(), ConfigError> {
    check_route_fragment(&e.name)?;
    if let Some(p) = &e.plural {
        check_route_fragment(p)?;
    }
    check_identifier(&e.table)?;

    let columns: HashSet<&str> = e.columns.iter().map(|c| c.name.as_str()).collect();
    for c in &e.columns {
        check_identifier(&c.name)?;
    }
    if !columns.contains(e.primary_key.as_str()) {
        return Err(ConfigError::InvalidPrimaryKey {
            entity: e.name.clone(),
            column: e.primary_key.clone(),
        });
    }

    let missing_column = |col: &str| ConfigError::MissingReference {
        kind: "column",
        id: format!("{}.{}", e.table, col),
    };

    let mut qualifiers: HashSet<&str> = HashSet::new();
    qualifiers.insert(e.table.as_str());
    let mut output_names: HashSet<&str> = columns.clone();
    for j in &e.joins {
        check_identifier(&j.table)?;
        let alias = j.alias.as_deref().unwrap_or(&j.table);
        check_identifier(alias)?;
        if !qualifiers.insert(alias) {
            return Err(ConfigError::Validation(format!(
                "{}: join alias '{}' is already in use",
                e.name, alias
            )));
        }
        check_identifier(&j.foreign_column)?;
        if !columns.contains(j.local_column.as_str()) {
            return Err(missing_column(&j.local_column));
        }
        for p in &j.columns {
            check_identifier(&p.column)?;
            check_identifier(&p.alias)?;
            if !output_names.insert(p.alias.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: output column '{}' appears twice",
                    e.name, p.alias
                )));
            }
        }
    }

    for s in &e.scopes {
        check_route_fragment(&s.name)?;
        if !columns.contains(s.column.as_str()) {
            return Err(missing_column(&s.column));
        }
    }
    for l in &e.lookups {
        check_route_fragment(&l.name)?;
        if !columns.contains(l.column.as_str()) {
            return Err(missing_column(&l.column));
        }
        if let Some(roles) = &l.roles {
            expand_roles(config, roles)?;
        }
    }
    for f in &e.filters {
        check_route_fragment(&f.name)?;
        match f.column.split_once('.') {
            Some((alias, col)) => {
                let join = e
                    .joins
                    .iter()
                    .find(|j| j.alias.as_deref().unwrap_or(&j.table) == alias)
                    .ok_or_else(|| ConfigError::MissingReference {
                        kind: "join",
                        id: alias.to_string(),
                    })?;
                if !join.columns.iter().any(|p| p.column == col) {
                    return Err(ConfigError::MissingReference {
                        kind: "joined column",
                        id: f.column.clone(),
                    });
                }
            }
            None => {
                if !columns.contains(f.column.as_str()) {
                    return Err(missing_column(&f.column));
                }
            }
        }
    }
    for s in &e.sensitive_columns {
        if !output_names.contains(s.as_str()) {
            return Err(missing_column(s));
        }
    }
    if let Some(w) = &e.welcome_email {
        if !columns.contains(w.user_column.as_str()) {
            return Err(missing_column(&w.user_column));
        }
    }
    if let Some(login) = &e.login {
        check_route_fragment(login)?;
        if e.table != config.auth.table {
            return Err(ConfigError::Validation(format!(
                "{}: login is only available on the credential table '{}'",
                e.name, config.auth.table
            )));
        }
    }

    let read = expand_roles(config, &e.roles.read)?;
    let write = expand_roles(config, &e.roles.write)?;
    if read.is_empty() || write.is_empty() {
        return Err(ConfigError::Validation(format!("{}: read and write roles must not be empty", e.name)));
    }
    Ok(())
}
