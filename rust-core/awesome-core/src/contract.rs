//! # Parameter Contracts
//!
//! A handler declares its parameter list once, as a [`Signature`]. The
//! [`ParameterContract`] derived from it tells the adapter what to bind on
//! every request:
//!
//! - whether the raw request handle is injected (a parameter named `request`)
//! - which keyword inputs are required
//! - which keyword inputs are accepted at all
//! - whether arbitrary extra keywords pass through
//!
//! Validation happens at registration, never per request.

use crate::error::{Error, Result};
use std::fmt;

/// Reserved parameter name that receives the request handle
pub const REQUEST_PARAM: &str = "request";

/// How a declared parameter receives its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Bound by position or by name (path captures land here)
    Positional,
    /// Catch-all for extra positional values
    VarPositional,
    /// Bound by name only
    KeywordOnly {
        /// A default exists, so the input may be omitted
        has_default: bool,
    },
    /// Catch-all for extra keyword values
    VarKeyword,
}

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Binding kind
    pub kind: ParamKind,
}

/// Ordered parameter list of a handler
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Param>,
}

impl Signature {
    /// Empty signature: the handler takes nothing
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter of any kind
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, kind: ParamKind) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
        });
        self
    }

    /// Append a positional parameter
    #[must_use]
    pub fn positional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::Positional)
    }

    /// Append the request handle
    #[must_use]
    pub fn request(self) -> Self {
        self.param(REQUEST_PARAM, ParamKind::Positional)
    }

    /// Append a keyword-only parameter without default
    #[must_use]
    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::KeywordOnly { has_default: false })
    }

    /// Append a keyword-only parameter with a default
    #[must_use]
    pub fn optional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::KeywordOnly { has_default: true })
    }

    /// Append a catch-all positional parameter
    #[must_use]
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.param(name, ParamKind::VarPositional)
    }

    /// Append a catch-all keyword parameter
    #[must_use]
    pub fn var_keywords(self) -> Self {
        self.param("kw", ParamKind::VarKeyword)
    }

    /// Declared parameters in order
    #[must_use]
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Binding rules derived from a [`Signature`]
///
/// `required_keywords` is always a subset of `optional_keywords`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterContract {
    /// Inject the request handle under [`REQUEST_PARAM`]
    pub accepts_request_handle: bool,
    /// Keyword inputs that must be present
    pub required_keywords: Vec<String>,
    /// All keyword inputs, required ones included
    pub optional_keywords: Vec<String>,
    /// Unknown keywords are kept instead of filtered
    pub accepts_arbitrary_keywords: bool,
}

impl ParameterContract {
    /// Derive the contract of `handler` from its signature.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSignature` when a parameter name repeats, more
    /// than one keyword catch-all is declared, or a positional parameter
    /// follows the request handle.
    pub fn extract(handler: &str, signature: &Signature) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidSignature {
            handler: handler.to_string(),
            reason,
        };

        let mut contract = Self::default();
        let mut seen: Vec<&str> = Vec::with_capacity(signature.params.len());

        for param in &signature.params {
            if seen.contains(&param.name.as_str()) {
                return Err(invalid(format!("duplicate parameter '{}'", param.name)));
            }
            seen.push(&param.name);

            if param.name == REQUEST_PARAM {
                contract.accepts_request_handle = true;
                continue;
            }

            if contract.accepts_request_handle && param.kind == ParamKind::Positional {
                return Err(invalid(format!(
                    "request parameter must be the last positional parameter, found '{}' after it",
                    param.name
                )));
            }

            match param.kind {
                ParamKind::Positional | ParamKind::VarPositional => {}
                ParamKind::KeywordOnly { has_default } => {
                    if !has_default {
                        contract.required_keywords.push(param.name.clone());
                    }
                    contract.optional_keywords.push(param.name.clone());
                }
                ParamKind::VarKeyword => {
                    if contract.accepts_arbitrary_keywords {
                        return Err(invalid("more than one keyword catch-all".to_string()));
                    }
                    contract.accepts_arbitrary_keywords = true;
                }
            }
        }

        Ok(contract)
    }

    /// The handler takes any keyword input at all
    #[must_use]
    pub fn needs_keywords(&self) -> bool {
        self.accepts_arbitrary_keywords
            || !self.optional_keywords.is_empty()
            || !self.required_keywords.is_empty()
    }

    /// `name` is one of the declared keyword inputs
    #[must_use]
    pub fn accepts_keyword(&self, name: &str) -> bool {
        self.optional_keywords.iter().any(|k| k == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_keywords() {
        let sig = Signature::new()
            .required("email")
            .required("name")
            .required("passwd")
            .optional("image");
        let contract = ParameterContract::extract("api_register_user", &sig).unwrap();

        assert!(!contract.accepts_request_handle);
        assert_eq!(contract.required_keywords, vec!["email", "name", "passwd"]);
        assert_eq!(contract.optional_keywords, vec!["email", "name", "passwd", "image"]);
        assert!(!contract.accepts_arbitrary_keywords);
        assert!(contract.needs_keywords());
    }

    #[test]
    fn test_required_is_subset_of_optional() {
        let sig = Signature::new().request().required("content").optional("page");
        let contract = ParameterContract::extract("h", &sig).unwrap();
        for name in &contract.required_keywords {
            assert!(contract.accepts_keyword(name));
        }
    }

    #[test]
    fn test_request_handle_and_positional() {
        let sig = Signature::new().positional("id").request().required("content");
        let contract = ParameterContract::extract("api_create_comment", &sig).unwrap();
        assert!(contract.accepts_request_handle);
        assert_eq!(contract.required_keywords, vec!["content"]);
    }

    #[test]
    fn test_positional_after_request_is_rejected() {
        let sig = Signature::new().request().positional("id");
        let err = ParameterContract::extract("broken", &sig).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_catch_alls_after_request_are_allowed() {
        let sig = Signature::new().request().var_positional("args").var_keywords();
        let contract = ParameterContract::extract("h", &sig).unwrap();
        assert!(contract.accepts_arbitrary_keywords);
        assert!(contract.needs_keywords());
    }

    #[test]
    fn test_duplicate_parameter_is_rejected() {
        let sig = Signature::new().required("id").optional("id");
        assert!(ParameterContract::extract("h", &sig).is_err());
    }

    #[test]
    fn test_path_only_handler_needs_no_keywords() {
        let sig = Signature::new().positional("id");
        let contract = ParameterContract::extract("get_blog", &sig).unwrap();
        assert!(!contract.needs_keywords());
    }

    #[test]
    fn test_signature_display() {
        let sig = Signature::new().positional("id").request().required("content");
        assert_eq!(sig.to_string(), "id, request, content");
    }
}
