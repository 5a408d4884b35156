use std::iter;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::record::Record;
use crate::task::Task;

/// Produces the candidate URLs of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UrlGenerator {
    /// A fixed list of URLs.
    Static { urls: Vec<String> },

    /// URLs derived from the records of `source_task`, substituting `{field}` placeholders of the
    /// template with the record's values.
    Dynamic {
        template: String,
        #[serde(rename = "sourceTask")]
        source_task: String,
        fields: Vec<String>,
    },
}

impl UrlGenerator {
    pub fn fixed<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static {
            urls: urls.into_iter().map(Into::into).collect(),
        }
    }

    pub fn derived<I, S>(template: impl Into<String>, source_task: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Dynamic {
            template: template.into(),
            source_task: source_task.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Whether this generator feeds the frontier of `task` while it runs.
    pub fn is_recursive(&self, task: &str) -> bool {
        match self {
            Self::Static { .. } => false,
            Self::Dynamic { source_task, .. } => source_task == task,
        }
    }

    pub fn source_task(&self) -> Option<&str> {
        match self {
            Self::Static { .. } => None,
            Self::Dynamic { source_task, .. } => Some(source_task),
        }
    }

    /// Lazily yields URLs, at most `limit` of them, in a stable order.
    ///
    /// A static generator ignores `prior`. A dynamic one yields one URL per record of its source
    /// task that has every source field, in the order of `prior`.
    pub fn produce<'a>(
        &'a self,
        prior: &'a [Record],
        limit: Option<usize>,
    ) -> Box<dyn Iterator<Item = String> + 'a> {
        let limit = limit.unwrap_or(usize::MAX);
        match self {
            Self::Static { urls } => Box::new(urls.iter().cloned().take(limit)),
            Self::Dynamic {
                template,
                source_task,
                fields,
            } => match Template::parse(template, fields) {
                Ok(template) => Box::new(
                    prior
                        .iter()
                        .filter(move |record| &record.task == source_task)
                        .filter_map(move |record| template.render(record))
                        .take(limit),
                ),
                Err(e) => {
                    log::error!("{e}");
                    Box::new(iter::empty())
                }
            },
        }
    }

    pub fn validate(&self, task: &Task) -> Result<(), ConfigurationError> {
        let Self::Dynamic {
            template, fields, ..
        } = self
        else {
            return Ok(());
        };

        if fields.is_empty() {
            return Err(ConfigurationError::MissingSourceFields {
                template: template.clone(),
            });
        }

        let parsed = Template::parse(template, fields)?;
        if let Some(field) = fields.iter().find(|f| !parsed.uses(f)) {
            return Err(ConfigurationError::UnusedSourceField {
                template: template.clone(),
                field: field.clone(),
            });
        }

        if self.is_recursive(&task.name) {
            if let Some(field) = fields.iter().find(|f| task.selector(f).is_none()) {
                return Err(ConfigurationError::UnknownSourceField {
                    task: task.name.clone(),
                    field: field.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Field(String),
}

#[derive(Debug, Clone)]
struct Template(Vec<Part>);

impl Template {
    fn parse(template: &str, fields: &[String]) -> Result<Self, ConfigurationError> {
        let mut parts = vec![];
        let mut rest = template;
        while let Some(start) = rest.find('{') {
            if start > 0 {
                parts.push(Part::Literal(rest[..start].to_string()));
            }
            let end = rest[start..].find('}').ok_or_else(|| {
                ConfigurationError::UnterminatedPlaceholder {
                    template: template.to_string(),
                }
            })?;
            let field = &rest[start + 1..start + end];
            if !fields.iter().any(|f| f == field) {
                return Err(ConfigurationError::UnknownPlaceholder {
                    template: template.to_string(),
                    field: field.to_string(),
                });
            }
            parts.push(Part::Field(field.to_string()));
            rest = &rest[start + end + 1..];
        }
        if !rest.is_empty() {
            parts.push(Part::Literal(rest.to_string()));
        }
        Ok(Self(parts))
    }

    fn uses(&self, field: &str) -> bool {
        self.0
            .iter()
            .any(|p| matches!(p, Part::Field(f) if f == field))
    }

    fn render(&self, record: &Record) -> Option<String> {
        self.0.iter().try_fold(String::new(), |mut url, part| {
            match part {
                Part::Literal(s) => url.push_str(s),
                Part::Field(f) => url.push_str(&record.get(f)?.to_string()),
            }
            Some(url)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn record(task: &str, next: Option<i64>) -> Record {
        Record::new(task, "https://x/0").with("next_id", next.map(Value::Integer))
    }

    #[test]
    fn static_ignores_prior() {
        let generator = UrlGenerator::fixed(["https://x/1", "https://x/2"]);
        let prior = vec![record("t", Some(3))];

        assert_eq!(
            vec!["https://x/1", "https://x/2"],
            generator.produce(&prior, None).collect::<Vec<_>>()
        );
        assert_eq!(vec!["https://x/1"], generator.produce(&[], Some(1)).collect::<Vec<_>>());
    }

    #[test]
    fn dynamic_substitutes_and_skips_absent() {
        let generator = UrlGenerator::derived("https://x/{next_id}?p=1", "t", ["next_id"]);
        let prior = vec![
            record("t", Some(2)),
            record("t", None),
            record("other", Some(9)),
            record("t", Some(4)),
        ];

        assert_eq!(
            vec!["https://x/2?p=1", "https://x/4?p=1"],
            generator.produce(&prior, None).collect::<Vec<_>>()
        );
        assert_eq!(vec!["https://x/2?p=1"], generator.produce(&prior, Some(1)).collect::<Vec<_>>());
        assert_eq!(0, generator.produce(&[], None).count());
    }

    #[test]
    fn dynamic_with_two_fields() {
        let generator = UrlGenerator::derived("https://x/{a}/{b}", "t", ["a", "b"]);
        let prior = vec![
            Record::new("t", "u")
                .with("a", Some(Value::from("p")))
                .with("b", Some(Value::Integer(3))),
            Record::new("t", "u").with("a", Some(Value::from("q"))),
        ];

        assert_eq!(vec!["https://x/p/3"], generator.produce(&prior, None).collect::<Vec<_>>());
    }

    #[test]
    fn produce_is_restartable() {
        let generator = UrlGenerator::derived("https://x/{next_id}", "t", ["next_id"]);
        let prior = vec![record("t", Some(2))];

        let first = generator.produce(&prior, None).collect::<Vec<_>>();
        let second = generator.produce(&prior, None).collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn recursion_is_scoped_to_task() {
        let generator = UrlGenerator::derived("https://x/{id}", "players", ["id"]);

        assert!(generator.is_dynamic());
        assert!(generator.is_recursive("players"));
        assert!(!generator.is_recursive("injuries"));
        assert!(!UrlGenerator::fixed(["https://x"]).is_recursive("players"));
    }

    #[test]
    fn template_errors() {
        assert!(matches!(
            Template::parse("https://x/{id", &["id".to_string()]),
            Err(ConfigurationError::UnterminatedPlaceholder { .. })
        ));
        assert!(matches!(
            Template::parse("https://x/{other}", &["id".to_string()]),
            Err(ConfigurationError::UnknownPlaceholder { .. })
        ));
    }
}
