//! Prompt tables: which replies to type when a marker shows up.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ConfigError;

/// Text typed in response to a prompt.
pub enum Reply {
    /// Safe to log.
    Plain(String),

    /// Never logged or printed.
    Secret(SecretString),
}

impl Reply {
    /// The text to send.
    pub fn expose(&self) -> &str {
        match self {
            Reply::Plain(text) => text,
            Reply::Secret(secret) => secret.expose_secret(),
        }
    }

    /// Whether the reply must stay out of logs.
    pub fn is_secret(&self) -> bool {
        matches!(self, Reply::Secret(_))
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Plain(text) => write!(f, "Plain({:?})", text),
            Reply::Secret(_) => write!(f, "Secret([REDACTED])"),
        }
    }
}

/// A marker and the reply it triggers.
#[derive(Debug)]
pub struct Prompt {
    marker: String,
    reply: Reply,
}

impl Prompt {
    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn reply(&self) -> &Reply {
        &self.reply
    }

    /// Reply text for log lines, masked when secret.
    pub fn loggable_reply(&self) -> &str {
        if self.reply.is_secret() {
            "********"
        } else {
            self.reply.expose()
        }
    }
}

#[derive(Debug)]
struct TableInner {
    /// Prompts in match order: longest marker first, then declaration order.
    prompts: Vec<Prompt>,
    completion: String,
    window: usize,
}

/// Immutable set of prompt markers plus the completion marker.
///
/// Cloning is cheap; clones share the same entries.
///
/// # Example
///
/// ```rust
/// use ferrovpn::PromptTable;
///
/// let table = PromptTable::builder("Data Base Updated")
///     .prompt("removal:", "yes")
///     .build()
///     .unwrap();
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PromptTable {
    inner: Arc<TableInner>,
}

impl PromptTable {
    /// Start a table that finishes when `completion` appears.
    pub fn builder(completion: impl Into<String>) -> PromptTableBuilder {
        PromptTableBuilder {
            prompts: IndexMap::new(),
            completion: completion.into(),
            error: None,
        }
    }

    /// The completion marker.
    pub fn completion(&self) -> &str {
        &self.inner.completion
    }

    /// Prompts in the order they are matched.
    pub fn prompts(&self) -> &[Prompt] {
        &self.inner.prompts
    }

    /// Look up a prompt by its match-order index.
    pub fn get(&self, index: usize) -> Option<&Prompt> {
        self.inner.prompts.get(index)
    }

    pub fn len(&self) -> usize {
        self.inner.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.prompts.is_empty()
    }

    /// Bytes of trailing output needed to evaluate every marker.
    pub fn window_len(&self) -> usize {
        self.inner.window
    }

    /// Whether `tail` ends with the completion marker.
    pub fn is_complete(&self, tail: &[u8]) -> bool {
        tail.ends_with(self.inner.completion.as_bytes())
    }

    /// Indices of every prompt whose marker is a suffix of `tail`, in match order.
    pub fn matches<'a>(&'a self, tail: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
        self.inner
            .prompts
            .iter()
            .enumerate()
            .filter(move |(_, p)| tail.ends_with(p.marker.as_bytes()))
            .map(|(i, _)| i)
    }
}

/// Builder for [`PromptTable`].
pub struct PromptTableBuilder {
    prompts: IndexMap<String, Reply>,
    completion: String,
    error: Option<ConfigError>,
}

impl PromptTableBuilder {
    /// Reply with `reply` whenever output ends with `marker`.
    pub fn prompt(self, marker: impl Into<String>, reply: impl Into<String>) -> Self {
        self.insert(marker.into(), Reply::Plain(reply.into()))
    }

    /// Like [`prompt`](Self::prompt), but the reply is never logged.
    pub fn secret_prompt(self, marker: impl Into<String>, reply: SecretString) -> Self {
        self.insert(marker.into(), Reply::Secret(reply))
    }

    fn insert(mut self, marker: String, reply: Reply) -> Self {
        if self.error.is_some() {
            return self;
        }
        if marker.is_empty() {
            self.error = Some(ConfigError::EmptyMarker);
            return self;
        }
        match self.prompts.entry(marker) {
            Entry::Occupied(entry) => {
                self.error = Some(ConfigError::DuplicateMarker {
                    marker: entry.key().clone(),
                });
            }
            Entry::Vacant(entry) => {
                entry.insert(reply);
            }
        }
        self
    }

    /// Validate and freeze the table.
    pub fn build(self) -> Result<PromptTable, ConfigError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.completion.is_empty() {
            return Err(ConfigError::EmptyCompletion);
        }

        let mut prompts: Vec<Prompt> = self
            .prompts
            .into_iter()
            .map(|(marker, reply)| Prompt { marker, reply })
            .collect();
        // Stable sort keeps declaration order among equal lengths
        prompts.sort_by(|a, b| b.marker.len().cmp(&a.marker.len()));

        let window = prompts
            .iter()
            .map(|p| p.marker.len())
            .chain(std::iter::once(self.completion.len()))
            .max()
            .unwrap_or(0);

        Ok(PromptTable {
            inner: Arc::new(TableInner {
                prompts,
                completion: self.completion,
                window,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_match_order_longest_first() {
        let table = PromptTable::builder("done")
            .prompt("a:", "short")
            .prompt("xa:", "long")
            .prompt("b:", "other")
            .build()
            .unwrap();

        let markers: Vec<_> = table.prompts().iter().map(|p| p.marker()).collect();
        assert_eq!(markers, vec!["xa:", "a:", "b:"]);

        let hits: Vec<_> = table.matches(b"prompt xa:").collect();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_window_covers_completion() {
        let table = PromptTable::builder("Data Base Updated")
            .prompt("phrase:", "x")
            .build()
            .unwrap();
        assert_eq!(table.window_len(), "Data Base Updated".len());
    }

    #[test]
    fn test_rejects_bad_markers() {
        assert!(matches!(
            PromptTable::builder("done").prompt("", "x").build(),
            Err(ConfigError::EmptyMarker)
        ));
        assert!(matches!(
            PromptTable::builder("").prompt("a", "x").build(),
            Err(ConfigError::EmptyCompletion)
        ));
        assert!(matches!(
            PromptTable::builder("done")
                .prompt("a:", "x")
                .prompt("a:", "y")
                .build(),
            Err(ConfigError::DuplicateMarker { .. })
        ));
    }

    #[test]
    fn test_secret_reply_hidden() {
        let table = PromptTable::builder("done")
            .secret_prompt("phrase:", secret("secret123"))
            .build()
            .unwrap();
        let prompt = table.get(0).unwrap();

        assert_eq!(prompt.reply().expose(), "secret123");
        assert_eq!(prompt.loggable_reply(), "********");
        assert!(!format!("{:?}", table).contains("secret123"));
    }
}
