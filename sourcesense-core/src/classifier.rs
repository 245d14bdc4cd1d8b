//! Sensitive column classification by column name.
//!
//! A pure pass over the metadata tree: each column name is lowercased and
//! tested for substring matches against every category's pattern list. The
//! first matching pattern within a category produces one finding, so a column
//! can be reported under several categories but never twice under one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::SchemaMetadata;

/// Sensitive data category. Ordering follows declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SensitiveCategory {
    /// Personally identifiable information
    #[serde(rename = "PII")]
    Pii,
    Financial,
    Health,
    Authentication,
}

impl std::fmt::Display for SensitiveCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pii => "PII",
            Self::Financial => "Financial",
            Self::Health => "Health",
            Self::Authentication => "Authentication",
        };
        f.write_str(name)
    }
}

/// How sure the classifier is about a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// One column flagged under one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveFinding {
    /// Schema of the matched column
    pub schema_name: String,
    /// Table of the matched column
    pub table_name: String,
    /// Matched column
    pub column_name: String,
    /// Column type from the catalog
    pub data_type: String,
    /// Category whose pattern matched
    pub category: SensitiveCategory,
    /// First pattern of the category found in the name
    pub pattern_matched: String,
    /// Always `medium` for name matches
    pub confidence: Confidence,
}

/// Ordered category to pattern table.
///
/// Patterns are stored lowercase and tested in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    categories: BTreeMap<SensitiveCategory, Vec<String>>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::empty()
            .with_category(
                SensitiveCategory::Pii,
                [
                    "email",
                    "ssn",
                    "social_security",
                    "phone",
                    "address",
                    "name",
                    "firstname",
                    "lastname",
                ],
            )
            .with_category(
                SensitiveCategory::Financial,
                ["credit_card", "account_number", "salary", "income", "payment"],
            )
            .with_category(
                SensitiveCategory::Health,
                ["medical", "health", "diagnosis", "patient"],
            )
            .with_category(
                SensitiveCategory::Authentication,
                ["password", "token", "secret", "key", "hash"],
            )
    }
}

impl PatternSet {
    /// A set with no categories.
    pub const fn empty() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Sets the pattern list for `category`, replacing any existing one.
    pub fn with_category<I, S>(mut self, category: SensitiveCategory, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| pattern.as_ref().to_lowercase())
            .filter(|pattern| !pattern.is_empty())
            .collect();
        self.categories.insert(category, patterns);
        self
    }

    /// Categories with their patterns, in category order.
    pub fn categories(&self) -> impl Iterator<Item = (SensitiveCategory, &[String])> {
        self.categories
            .iter()
            .map(|(category, patterns)| (*category, patterns.as_slice()))
    }

    /// First pattern of `category` contained in `lowercase_name`.
    fn first_match(&self, category: SensitiveCategory, lowercase_name: &str) -> Option<&str> {
        self.categories
            .get(&category)?
            .iter()
            .find(|pattern| lowercase_name.contains(pattern.as_str()))
            .map(String::as_str)
    }
}

/// Classifier output. Always present, even with zero findings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensitiveDataReport {
    /// When classification ran
    pub detection_timestamp: DateTime<Utc>,
    /// Findings in column discovery order
    pub sensitive_columns: Vec<SensitiveFinding>,
    /// Findings per category, including categories with zero findings
    pub summary: BTreeMap<SensitiveCategory, usize>,
}

/// Name-based sensitive column classifier.
///
/// # Example
/// ```rust
/// use sourcesense_core::classifier::{SensitiveCategory, SensitiveDataClassifier};
/// use sourcesense_core::models::*;
///
/// let metadata = SchemaMetadata::new(DatabaseInfo::new(DatabaseKind::Sqlite, "app.db"))
///     .with_schema(SchemaInfo::new("main").with_table(
///         TableInfo::new("main", "users").with_column(ColumnInfo::new("email", "TEXT")),
///     ));
///
/// let report = SensitiveDataClassifier::default().classify(&metadata);
/// assert_eq!(report.summary[&SensitiveCategory::Pii], 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SensitiveDataClassifier {
    patterns: PatternSet,
}

impl SensitiveDataClassifier {
    /// Creates a classifier over a custom pattern set.
    pub const fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    /// Returns the pattern set in use.
    pub const fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Classifies every column in the tree.
    pub fn classify(&self, metadata: &SchemaMetadata) -> SensitiveDataReport {
        let mut summary: BTreeMap<SensitiveCategory, usize> = self
            .patterns
            .categories()
            .map(|(category, _)| (category, 0))
            .collect();
        let mut sensitive_columns = Vec::new();

        for table in metadata.tables() {
            for column in &table.columns {
                let lowercase_name = column.column_name.to_lowercase();

                for (category, _) in self.patterns.categories() {
                    let Some(pattern) = self.patterns.first_match(category, &lowercase_name)
                    else {
                        continue;
                    };

                    tracing::debug!(
                        "Column {}.{}.{} matched {} pattern '{}'",
                        table.schema_name,
                        table.table_name,
                        column.column_name,
                        category,
                        pattern
                    );

                    sensitive_columns.push(SensitiveFinding {
                        schema_name: table.schema_name.clone(),
                        table_name: table.table_name.clone(),
                        column_name: column.column_name.clone(),
                        data_type: column.data_type.clone(),
                        category,
                        pattern_matched: pattern.to_string(),
                        confidence: Confidence::Medium,
                    });
                    let count = summary.entry(category).or_insert(0);
                    *count = count.saturating_add(1);
                }
            }
        }

        tracing::info!(
            "Sensitive data detection found {} findings",
            sensitive_columns.len()
        );

        SensitiveDataReport {
            detection_timestamp: Utc::now(),
            sensitive_columns,
            summary,
        }
    }
}
