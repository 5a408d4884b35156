use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{ConfigurationError, ExtractionError};
use crate::value::{Value, ValueType};

lazy_static! {
    static ref XP_FACTORY: sxd_xpath::Factory = sxd_xpath::Factory::new();
}

/// Extraction rule for one named field of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    pub name: String,

    /// An XPath 1.0 expression.
    #[serde(alias = "xpath")]
    pub query: String,

    /// A regex applied to every match, its first group (or whole match) is kept.
    #[serde(default, alias = "regex", skip_serializing_if = "Option::is_none")]
    pub refinement: Option<String>,

    #[serde(default, rename = "type")]
    pub target_type: ValueType,

    /// Datetime format, see [`ValueType::coerce`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default)]
    pub is_key: bool,
}

impl Selector {
    pub fn new(name: impl Into<String>, query: impl Into<String>, target_type: ValueType) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            refinement: None,
            target_type,
            format: None,
            is_key: false,
        }
    }

    pub fn key(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn refinement(mut self, pattern: impl Into<String>) -> Self {
        self.refinement = Some(pattern.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Checks the query and refinement and returns the selector ready to run.
    pub fn compile(&self) -> Result<TypedSelector, ConfigurationError> {
        build_xpath(&self.query).map_err(|message| ConfigurationError::InvalidQuery {
            selector: self.name.clone(),
            query: self.query.clone(),
            message,
        })?;

        let refinement = match self.refinement.as_deref() {
            None | Some("") => None,
            Some(pattern) => Some(Regex::new(pattern).map_err(|e| {
                ConfigurationError::InvalidRefinement {
                    selector: self.name.clone(),
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                }
            })?),
        };

        Ok(TypedSelector {
            name: self.name.clone(),
            query: self.query.clone(),
            refinement,
            target_type: self.target_type,
            format: self.format.clone(),
        })
    }
}

fn build_xpath(query: &str) -> Result<sxd_xpath::XPath, String> {
    XP_FACTORY
        .build(query)
        .map_err(|e| e.to_string())?
        .ok_or_else(|| String::from("Missing XPath"))
}

/// A compiled [`Selector`], a pure function of the document it is applied to.
#[derive(Debug, Clone)]
pub struct TypedSelector {
    name: String,
    query: String,
    refinement: Option<Regex>,
    target_type: ValueType,
    format: Option<String>,
}

impl TypedSelector {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_type(&self) -> ValueType {
        self.target_type
    }

    /// The raw text of every query match, in document order.
    pub fn matches(&self, doc: &Document) -> Result<Vec<String>, ExtractionError> {
        let query_err = |message: String| ExtractionError::Query {
            selector: self.name.clone(),
            message,
        };

        let xpath = build_xpath(&self.query).map_err(query_err)?;
        let context = sxd_xpath::Context::new();
        let dom = doc.as_dom();
        let value = xpath
            .evaluate(&context, dom.root())
            .map_err(|e| query_err(e.to_string()))?;

        let raw = match value {
            sxd_xpath::Value::Nodeset(nodes) => nodes
                .document_order()
                .iter()
                .map(|node| node.string_value())
                .collect(),
            sxd_xpath::Value::String(s) => vec![s],
            sxd_xpath::Value::Number(n) if n.fract() == 0.0 && n.is_finite() => {
                vec![format!("{}", n as i64)]
            }
            sxd_xpath::Value::Number(n) => vec![n.to_string()],
            sxd_xpath::Value::Boolean(b) => vec![b.to_string()],
        };

        Ok(raw)
    }

    /// Refines then coerces one raw match.
    pub fn convert(&self, raw: &str) -> Result<Value, ExtractionError> {
        let refined = match &self.refinement {
            None => raw,
            Some(re) => {
                let caps = re.captures(raw).ok_or_else(|| ExtractionError::NoMatch {
                    selector: self.name.clone(),
                    raw: raw.to_string(),
                })?;
                caps.get(1)
                    .or_else(|| caps.get(0))
                    .map(|m| m.as_str())
                    .unwrap_or_default()
            }
        };

        self.target_type
            .coerce(refined, self.format.as_deref())
            .ok_or_else(|| ExtractionError::TypeMismatch {
                selector: self.name.clone(),
                raw: refined.to_string(),
                expected: self.target_type.name(),
            })
    }

    /// Every occurrence of the field, with the conversion outcome of each.
    pub fn try_extract_all(
        &self,
        doc: &Document,
    ) -> Result<Vec<Result<Value, ExtractionError>>, ExtractionError> {
        Ok(self
            .matches(doc)?
            .iter()
            .map(|raw| self.convert(raw))
            .collect())
    }

    /// Every occurrence of the field, failed conversions are absent.
    pub fn extract_all(&self, doc: &Document) -> Vec<Option<Value>> {
        match self.try_extract_all(doc) {
            Ok(values) => values
                .into_iter()
                .map(|v| v.map_err(|e| log::debug!("{e}")).ok())
                .collect(),
            Err(e) => {
                log::debug!("{e}");
                vec![]
            }
        }
    }

    /// The first occurrence of the field.
    pub fn extract(&self, doc: &Document) -> Option<Value> {
        self.extract_all(doc).into_iter().next().flatten()
    }
}
