//! Credential placeholder interpolation.
//!
//! A credential field whose entire value is `${NAME}` is replaced with the
//! value of environment variable `NAME`. Partial interpolation (`pre-${X}`)
//! is not supported; such values are taken literally.

use crate::config::schema::ProxyConfig;
use crate::config::validation::ValidationError;

/// Returns the variable name if `value` is a `${NAME}` placeholder.
pub fn placeholder_name(value: &str) -> Option<&str> {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|name| !name.is_empty())
}

/// Resolve every credential placeholder in `config` using `lookup`.
///
/// Unresolvable placeholders are collected rather than short-circuiting, so a
/// single startup attempt reports every missing variable.
pub fn resolve_secrets<F>(config: &mut ProxyConfig, lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    for (host, settings) in config.proxy.iter_mut() {
        let target = &mut settings.to;
        let mut fields: Vec<(&'static str, &mut String)> = Vec::new();
        if let Some(username) = target.username.as_mut() {
            fields.push(("to.username", username));
        }
        if let Some(password) = target.password.as_mut() {
            fields.push(("to.password", password));
        }
        if let Some(auth) = settings.auth.as_mut() {
            fields.push(("auth.username", &mut auth.username));
            fields.push(("auth.password", &mut auth.password));
        }

        for (field, value) in fields {
            let Some(name) = placeholder_name(value).map(str::to_owned) else {
                continue;
            };
            match lookup(&name) {
                Some(resolved) => *value = resolved,
                None => errors.push(ValidationError::UnresolvedSecret {
                    host: host.clone(),
                    field,
                    variable: name,
                }),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
