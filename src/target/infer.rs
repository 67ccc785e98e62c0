//! Parameter inference
//!
//! Pure functions over (schema, extracted target, overrides). Only required
//! parameters that the caller did not supply are considered, and only a
//! fixed set of well-known names is ever filled from the target.

use crate::errors::{OrchestratorError, Result};
use crate::target::extract::{extract_target, TargetDescriptor, TargetKind};
use crate::tools::types::{Params, ToolDescriptor};
use serde_json::Value;

/// Outcome of a lenient bind
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Binding {
    pub params: Params,
    /// Required names still unbound, in schema order
    pub missing: Vec<String>,
}

impl Binding {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Bind a tool's parameters without failing on gaps
///
/// Overrides are copied first and always win. Each remaining required
/// parameter takes its declared default, or a value derived from the
/// target for the names `target`, `host`, `domain`, `url`, `base_url` and
/// `targets`.
pub fn bind(tool: &ToolDescriptor, target: &TargetDescriptor, overrides: &Params) -> Binding {
    let mut params = overrides.clone();
    let mut missing = Vec::new();

    for spec in tool.required_parameters() {
        if params.contains_key(&spec.name) {
            continue;
        }
        let value = spec
            .default
            .clone()
            .or_else(|| derive_from_target(&spec.name, target));
        match value {
            Some(v) => {
                params.insert(spec.name.clone(), v);
            }
            None => missing.push(spec.name.clone()),
        }
    }

    Binding { params, missing }
}

/// Infer bound params for a tool from free text
pub fn infer_params(tool: &ToolDescriptor, text: &str, overrides: &Params) -> Result<Params> {
    let target = extract_target(text);
    infer_for_target(tool, &target, overrides)
}

/// Like [`infer_params`] with an already extracted target
pub fn infer_for_target(
    tool: &ToolDescriptor,
    target: &TargetDescriptor,
    overrides: &Params,
) -> Result<Params> {
    let binding = bind(tool, target, overrides);
    if binding.is_complete() {
        Ok(binding.params)
    } else {
        Err(OrchestratorError::MissingRequiredParameter {
            tool: tool.name.clone(),
            missing: binding.missing,
        })
    }
}

fn derive_from_target(name: &str, target: &TargetDescriptor) -> Option<Value> {
    let tv = target.value.as_str();
    if tv.is_empty() {
        return None;
    }
    match name.to_lowercase().as_str() {
        "target" | "host" | "targets" => Some(Value::String(tv.to_string())),
        "domain" if matches!(target.kind, TargetKind::Domain | TargetKind::Url) => {
            Some(Value::String(host_part(tv).to_string()))
        }
        "url" | "base_url" => Some(Value::String(ensure_scheme(tv))),
        _ => None,
    }
}

/// Strip scheme and path
fn host_part(value: &str) -> &str {
    let rest = match value.find("://") {
        Some(i) if has_http_scheme(value) => &value[i + 3..],
        _ => value,
    };
    rest.split('/').next().unwrap_or(rest)
}

fn has_http_scheme(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn ensure_scheme(value: &str) -> String {
    if has_http_scheme(value) {
        value.to_string()
    } else {
        format!("http://{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::{ParamType, ParameterSpec, ToolCategory};
    use serde_json::json;

    fn tool(params: &[&str]) -> ToolDescriptor {
        params.iter().fold(
            ToolDescriptor::new("probe", "test tool", ToolCategory::Recon),
            |t, name| t.param(ParameterSpec::required(*name, ParamType::String)),
        )
    }

    #[test]
    fn test_infers_target_and_url() {
        let params = infer_params(&tool(&["target", "url"]), "look at example.com", &Params::new())
            .unwrap();
        assert_eq!(params["target"], "example.com");
        assert_eq!(params["url"], "http://example.com");
    }

    #[test]
    fn test_domain_stripped_from_url() {
        let params = infer_params(
            &tool(&["domain"]),
            "check https://shop.example.com/cart?id=1",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(params["domain"], "shop.example.com");
    }

    #[test]
    fn test_domain_not_inferred_from_ip() {
        let err = infer_params(&tool(&["domain"]), "scan 10.0.0.1", &Params::new()).unwrap_err();
        match err {
            OrchestratorError::MissingRequiredParameter { tool, missing } => {
                assert_eq!(tool, "probe");
                assert_eq!(missing, vec!["domain"]);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_url_keeps_existing_scheme() {
        let params =
            infer_params(&tool(&["base_url"]), "https://a.b.com/x", &Params::new()).unwrap();
        assert_eq!(params["base_url"], "https://a.b.com/x");
    }

    #[test]
    fn test_mixed_case_names_bound_under_declared_key() {
        let params = infer_params(
            &tool(&["Target", "URL", "Base_URL"]),
            "scan example.com",
            &Params::new(),
        )
        .unwrap();
        assert_eq!(params["Target"], "example.com");
        assert_eq!(params["URL"], "http://example.com");
        assert_eq!(params["Base_URL"], "http://example.com");
        assert!(params.get("target").is_none());
    }

    #[test]
    fn test_upper_case_scheme_not_doubled() {
        let params =
            infer_params(&tool(&["url", "domain"]), "HTTPS://Shop.example.com/x", &Params::new())
                .unwrap();
        assert_eq!(params["url"], "HTTPS://Shop.example.com/x");
        assert_eq!(params["domain"], "Shop.example.com");
    }

    #[test]
    fn test_overrides_win_and_default_used() {
        let t = tool(&["target"])
            .param(ParameterSpec::required("wordlist", ParamType::String).with_default(json!("small.txt")));
        let mut overrides = Params::new();
        overrides.insert("target".into(), json!("override.example"));

        let params = infer_params(&t, "scan 10.0.0.1", &overrides).unwrap();
        assert_eq!(params["target"], "override.example");
        assert_eq!(params["wordlist"], "small.txt");
    }

    #[test]
    fn test_unrecognised_name_never_guessed() {
        let binding = bind(
            &tool(&["target", "service"]),
            &extract_target("10.0.0.1"),
            &Params::new(),
        );
        assert_eq!(binding.params["target"], "10.0.0.1");
        assert_eq!(binding.missing, vec!["service"]);
    }

    #[test]
    fn test_unknown_target_binds_nothing() {
        let binding = bind(&tool(&["target"]), &TargetDescriptor::unknown(), &Params::new());
        assert!(binding.params.is_empty());
        assert!(!binding.is_complete());
    }

    #[test]
    fn test_optional_params_untouched() {
        let t = tool(&["target"]).param(ParameterSpec::optional("url", ParamType::String));
        let params = infer_params(&t, "10.0.0.1", &Params::new()).unwrap();
        assert!(params.get("url").is_none());
    }
}
