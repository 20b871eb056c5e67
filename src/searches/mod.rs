//! Concrete searches and the factories that build them from parameters.

pub mod activity;
pub mod g2p;

use crate::config::{ParamValue, Params};
use crate::error::KiraError;
use crate::search::Search;

pub use activity::{ActivityFactory, ActivitySearch};
pub use g2p::{G2pFactory, G2pInteractionSearch};

/// Builds one kind of search. Building validates parameters and must not
/// contact any provider.
pub trait SearchFactory: Send + Sync {
    /// Name used as `source` in batch files.
    fn source(&self) -> &'static str;

    fn search_class(&self) -> &'static str;

    fn data_source(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn defaults(&self) -> Params {
        Params::new()
    }

    fn build(&self, key: &str, params: &Params) -> Result<Box<dyn Search>, KiraError>;
}

fn invalid(key: &str, name: &str, message: impl Into<String>) -> KiraError {
    KiraError::InvalidParameter {
        key: key.to_string(),
        name: name.to_string(),
        message: message.into(),
    }
}

/// Comma-separated text or a list, trimmed, empties dropped.
pub(crate) fn param_list(params: &Params, name: &str) -> Option<Vec<String>> {
    let values: Vec<String> = match params.get(name)? {
        ParamValue::List(items) => items.iter().map(ToString::to_string).collect(),
        other => other.to_string().split(',').map(str::to_string).collect(),
    };
    Some(
        values
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect(),
    )
}

pub(crate) fn param_f64(params: &Params, key: &str, name: &str) -> Result<Option<f64>, KiraError> {
    match params.get(name) {
        None => Ok(None),
        Some(ParamValue::Float(value)) => Ok(Some(*value)),
        Some(ParamValue::Int(value)) => Ok(Some(*value as f64)),
        Some(ParamValue::Text(value)) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(key, name, format!("expected a number, got '{value}'"))),
        Some(other) => Err(invalid(key, name, format!("expected a number, got '{other}'"))),
    }
}

pub(crate) fn param_text(params: &Params, name: &str) -> Option<String> {
    params
        .get(name)
        .map(ToString::to_string)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
