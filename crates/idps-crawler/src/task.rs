use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::generator::UrlGenerator;
use crate::record::Record;
use crate::selector::{Selector, TypedSelector};
use crate::value::{Value, ValueType};

/// A named crawl and extraction job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub name: String,

    #[serde(default, alias = "urlSelectors")]
    pub url_generators: Vec<UrlGenerator>,

    #[serde(default)]
    pub selectors: Vec<Selector>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_generators: vec![],
            selectors: vec![],
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn with_generator(mut self, generator: UrlGenerator) -> Self {
        self.url_generators.push(generator);
        self
    }

    pub fn selector(&self, name: &str) -> Option<&Selector> {
        self.selectors.iter().find(|s| s.name == name)
    }

    pub fn key_selectors(&self) -> impl Iterator<Item = &Selector> {
        self.selectors.iter().filter(|s| s.is_key)
    }

    /// Dynamic generators fed by this very task's records, in declaration order.
    pub fn recursive_generators(&self) -> impl Iterator<Item = &UrlGenerator> {
        self.url_generators
            .iter()
            .filter(|g| g.is_recursive(&self.name))
    }

    /// The URLs of every generator chained in declaration order, each one bounded by `limit`.
    pub fn urls<'a>(
        &'a self,
        prior: &'a [Record],
        limit: Option<usize>,
    ) -> impl Iterator<Item = String> + 'a {
        self.url_generators
            .iter()
            .flat_map(move |g| g.produce(prior, limit))
    }

    /// Checks the whole definition and compiles its selectors.
    pub fn validate(&self) -> Result<Vec<TypedSelector>, ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyTaskName);
        }

        let mut names = HashSet::new();
        for (index, selector) in self.selectors.iter().enumerate() {
            if selector.name.trim().is_empty() {
                return Err(ConfigurationError::EmptySelectorName {
                    task: self.name.clone(),
                    index,
                });
            }
            if !names.insert(selector.name.as_str()) {
                return Err(ConfigurationError::DuplicateSelector {
                    task: self.name.clone(),
                    name: selector.name.clone(),
                });
            }
        }

        for generator in &self.url_generators {
            generator.validate(self)?;
        }

        self.selectors.iter().map(Selector::compile).collect()
    }

    /// A header of selector names followed by one row per record.
    pub fn as_table<'a>(
        &'a self,
        records: &'a [Record],
    ) -> (Vec<&'a str>, impl Iterator<Item = Vec<Option<&'a Value>>> + 'a) {
        let header = self.selectors.iter().map(|s| s.name.as_str()).collect();
        let rows = records.iter().map(move |record| {
            self.selectors
                .iter()
                .map(|s| record.get(&s.name))
                .collect()
        });
        (header, rows)
    }

    /// The task definition as YAML, the format [`Task`] deserializes from.
    pub fn export(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// A sample injury table crawl.
    pub fn example() -> Self {
        Self::new("test")
            .with_generator(UrlGenerator::fixed([
                "http://www.transfermarkt.de/spieler/verletzungen/spieler/10",
            ]))
            .with_selector(
                Selector::new(
                    "spieler_id",
                    r#"(//a[@class="megamenu"])[1]/@href"#,
                    ValueType::Integer,
                )
                .refinement(r"(\d+)$")
                .key(),
            )
            .with_selector(Selector::new(
                "injury",
                r#"//table[@class="items"]//tr/td[2]/text()"#,
                ValueType::String,
            ))
            .with_selector(
                Selector::new(
                    "from",
                    r#"//table[@class="items"]//tr/td[3]/text()"#,
                    ValueType::Datetime,
                )
                .format("%d.%m.%Y")
                .key(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Task {
        Task::new("chain")
            .with_generator(UrlGenerator::fixed(["https://x/1"]))
            .with_generator(UrlGenerator::derived("https://x/{next_id}", "chain", ["next_id"]))
            .with_generator(UrlGenerator::derived("https://y/{id}", "other", ["id"]))
            .with_selector(Selector::new("title", "//title", ValueType::String).key())
            .with_selector(Selector::new("next_id", "//a/@data-next", ValueType::Integer))
    }

    #[test]
    fn valid_task() {
        let selectors = chain().validate().unwrap();
        assert_eq!(
            vec!["title", "next_id"],
            selectors.iter().map(|s| s.name()).collect::<Vec<_>>()
        );
        assert!(Task::example().validate().is_ok());
    }

    #[test]
    fn key_and_recursive_generators() {
        let task = chain();

        assert_eq!(
            vec!["title"],
            task.key_selectors().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(1, task.recursive_generators().count());
    }

    #[test]
    fn urls_are_chained_and_limited_per_generator() {
        let task = Task::new("t")
            .with_generator(UrlGenerator::fixed(["a", "b"]))
            .with_generator(UrlGenerator::fixed(["c"]));

        assert_eq!(vec!["a", "b", "c"], task.urls(&[], None).collect::<Vec<_>>());
        assert_eq!(vec!["a", "c"], task.urls(&[], Some(1)).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_selector() {
        let task = chain().with_selector(Selector::new("title", "//h1", ValueType::String));
        assert_eq!(
            Err(ConfigurationError::DuplicateSelector {
                task: "chain".into(),
                name: "title".into()
            }),
            task.validate().map(|_| ())
        );
    }

    #[test]
    fn recursive_generator_on_unknown_field() {
        let task = Task::new("t")
            .with_generator(UrlGenerator::derived("https://x/{missing}", "t", ["missing"]))
            .with_selector(Selector::new("title", "//title", ValueType::String));
        assert!(matches!(
            task.validate(),
            Err(ConfigurationError::UnknownSourceField { .. })
        ));
    }

    #[test]
    fn cross_task_generator_may_read_any_field() {
        let task = Task::new("t")
            .with_generator(UrlGenerator::derived("https://x/{id}", "elsewhere", ["id"]))
            .with_selector(Selector::new("title", "//title", ValueType::String));
        assert!(task.validate().is_ok());
    }

    #[test]
    fn unused_source_field() {
        let task = Task::new("t")
            .with_generator(UrlGenerator::derived("https://x/{a}", "t", ["a", "b"]))
            .with_selector(Selector::new("a", "//a", ValueType::String))
            .with_selector(Selector::new("b", "//b", ValueType::String));
        assert!(matches!(
            task.validate(),
            Err(ConfigurationError::UnusedSourceField { .. })
        ));
    }

    #[test]
    fn empty_names() {
        assert_eq!(
            Err(ConfigurationError::EmptyTaskName),
            Task::new(" ").validate().map(|_| ())
        );
        let task = Task::new("t").with_selector(Selector::new("", "//a", ValueType::String));
        assert!(matches!(
            task.validate(),
            Err(ConfigurationError::EmptySelectorName { index: 0, .. })
        ));
    }

    #[test]
    fn table() {
        let task = chain();
        let records = vec![
            Record::new("chain", "https://x/1")
                .with("title", Some(Value::from("one")))
                .with("next_id", Some(Value::Integer(2))),
            Record::new("chain", "https://x/2").with("title", Some(Value::from("two"))),
        ];

        let (header, rows) = task.as_table(&records);
        let rows = rows.collect::<Vec<_>>();

        assert_eq!(vec!["title", "next_id"], header);
        assert_eq!(vec![Some(&Value::from("two")), None], rows[1]);
    }

    #[test]
    fn export_round_trips() {
        let task = Task::example();
        let yaml = task.export().unwrap();
        let parsed: Task = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(task, parsed);
    }

    #[test]
    fn reads_definition_file() {
        let yaml = r#"
name: players
urlSelectors:
  - kind: static
    urls: ["https://x/1"]
  - kind: dynamic
    template: "https://x/{next_id}"
    sourceTask: players
    fields: [next_id]
selectors:
  - name: next_id
    xpath: '//a[@rel="next"]/@href'
    regex: '(\d+)$'
    type: INTEGER
    isKey: true
"#;
        let task: Task = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(2, task.url_generators.len());
        assert_eq!(Some(r"(\d+)$"), task.selectors[0].refinement.as_deref());
        assert_eq!(ValueType::Integer, task.selectors[0].target_type);
        assert!(task.selectors[0].is_key);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn identity_uses_key_fields() {
        let task = chain();
        let a = Record::new("chain", "https://x/1")
            .with("title", Some(Value::from("same")))
            .with("next_id", Some(Value::Integer(2)));
        let b = Record::new("chain", "https://x/9")
            .with("title", Some(Value::from("same")))
            .with("next_id", None);

        assert_eq!(a.identity(&task), b.identity(&task));
    }
}
