use crate::core::snake;
use crate::schema::{DataClassification, PropertyOption};

/// Parsed field tag: `name, opt1, opt2, ...`.
///
/// The first token overrides the canonical name (`-` suppresses the field,
/// empty keeps the derived name). Remaining tokens are flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub name: Option<String>,
    pub skip: bool,
    pub omit_empty: bool,
    pub options: Vec<PropertyOption>,
    pub classification: DataClassification,
}

impl FieldTag {
    pub fn parse(tag: &str) -> Self {
        let mut parsed = Self::default();
        let mut tokens = tag.split(',').map(str::trim);

        match tokens.next() {
            Some("-") => {
                parsed.skip = true;
                return parsed;
            }
            Some("") | None => {}
            Some(name) => parsed.name = Some(name.to_string()),
        }

        for token in tokens {
            match token {
                "omitempty" => parsed.omit_empty = true,
                "pii" | "personal" | "gdpr" => {
                    parsed.classification = DataClassification::Personal;
                }
                "user" => parsed.classification = DataClassification::UserInput,
                other => {
                    if let Some(option) = property_option(other) {
                        parsed.push_option(option);
                    }
                }
            }
        }
        parsed
    }

    fn push_option(&mut self, option: PropertyOption) {
        if !self.options.contains(&option) {
            self.options.push(option);
        }
    }

    pub fn has_option(&self, option: PropertyOption) -> bool {
        self.options.contains(&option)
    }

    /// The canonical property name for a field called `ident`.
    pub fn property_name(&self, ident: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => snake(ident.trim_start_matches("r#")),
        }
    }
}

fn property_option(token: &str) -> Option<PropertyOption> {
    let option = match token {
        "unique" => PropertyOption::Unique,
        "primary" => PropertyOption::Primary,
        "indexed" | "query" => PropertyOption::Indexed,
        "searchable" | "search" => PropertyOption::Searchable,
        "immutable" => PropertyOption::Immutable,
        "deprecated" => PropertyOption::Deprecated,
        "required" | "req" => PropertyOption::Required,
        "lookup" => PropertyOption::ReverseLookup,
        "verify" => PropertyOption::VerifyOnly,
        "metric" => PropertyOption::Metric,
        "metricFilter" | "metric_filter" => PropertyOption::MetricFilter,
        "no-snapshot" | "skip-snapshot" | "no_snapshot" | "skip_snapshot" => {
            PropertyOption::NoSnapshot
        }
        _ => return None,
    };
    Some(option)
}
