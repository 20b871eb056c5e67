//! The per-compound lookup contract shared by every data source.

use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};

use crate::error::KiraError;
use crate::hit::{Hit, HitDraft, HitOrigin, HitSchema};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// A configured lookup against one data source.
///
/// Implementors provide [`Search::find`] for a single compound; iteration,
/// partial-failure handling and progress reporting live in
/// [`Search::find_all`].
pub trait Search: Send + Sync {
    /// Unique key of this search within a batch.
    fn key(&self) -> &str;

    /// Implementation name, e.g. `ActivitySearch`.
    fn search_class(&self) -> &'static str;

    fn data_source(&self) -> &'static str;

    fn schema(&self) -> HitSchema;

    /// Effective parameters, in declaration order.
    fn params(&self) -> Vec<(String, String)>;

    /// Fails with [`KiraError::CompoundNotFound`] when the source does not
    /// know the compound.
    fn find(&self, compound: &str) -> Result<Vec<Hit>, KiraError>;

    /// `ActivitySearch` -> `activity`.
    fn search_name(&self) -> String {
        search_name(self.search_class())
    }

    fn describe(&self) -> String {
        self.params()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn create_hit(&self, draft: HitDraft) -> Result<Hit, KiraError> {
        let origin = HitOrigin {
            search_key: self.key().to_string(),
            search_class: self.search_class().to_string(),
            data_source: self.data_source().to_string(),
            run_date: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        Hit::create(draft, &origin, &self.schema())
    }

    fn find_all(
        &self,
        compounds: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Hit>, KiraError> {
        let started = Instant::now();
        let total = compounds.len();
        let mut hits = Vec::new();
        for (index, compound) in compounds.iter().enumerate() {
            match self.find(compound) {
                Ok(found) => hits.extend(found),
                Err(err) if err.is_not_found() => {
                    tracing::info!(key = self.key(), compound = %compound, "compound not found; skipping");
                }
                Err(err) => {
                    return Err(KiraError::Search {
                        compound: compound.clone(),
                        search_key: self.key().to_string(),
                        search_class: self.search_class().to_string(),
                        source: Box::new(err),
                    });
                }
            }
            let done = index + 1;
            if done % PROGRESS_EVERY == 0 && done < total {
                report(self.key(), hits.len(), done, total, started, sink);
            }
        }
        report(self.key(), hits.len(), total, total, started, sink);
        Ok(hits)
    }
}

/// Lowercased implementation name without the trailing `Search`.
pub fn search_name(search_class: &str) -> String {
    let class = search_class.to_lowercase();
    class.strip_suffix("search").unwrap_or(&class).to_string()
}

fn report(
    key: &str,
    hits: usize,
    done: usize,
    total: usize,
    started: Instant,
    sink: &dyn ProgressSink,
) {
    tracing::info!(key, hits, done, total, "search progress");
    sink.event(ProgressEvent {
        message: format!("phase=Search; key={key}; hits={hits}; compounds={done}/{total}"),
        elapsed: Some(started.elapsed()),
    });
}

/// Two searches are equal when they are the same implementation with the
/// same effective parameters. The key is not part of equality.
impl PartialEq for dyn Search {
    fn eq(&self, other: &Self) -> bool {
        self.search_class() == other.search_class() && self.params() == other.params()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const SCHEMA: HitSchema = HitSchema::new(&[]);

    struct Echo {
        key: String,
    }

    impl Search for Echo {
        fn key(&self) -> &str {
            &self.key
        }

        fn search_class(&self) -> &'static str {
            "EchoSearch"
        }

        fn data_source(&self) -> &'static str {
            "echo"
        }

        fn schema(&self) -> HitSchema {
            SCHEMA
        }

        fn params(&self) -> Vec<(String, String)> {
            vec![("a".to_string(), "1".to_string()), ("b".to_string(), "x".to_string())]
        }

        fn find(&self, compound: &str) -> Result<Vec<Hit>, KiraError> {
            self.create_hit(HitDraft {
                compound_id: compound.to_string(),
                ..HitDraft::default()
            })
            .map(|hit| vec![hit])
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressSink for Recorder {
        fn event(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event.message);
        }
    }

    #[test]
    fn names_and_description() {
        let search = Echo {
            key: "e".to_string(),
        };
        assert_eq!(search.search_name(), "echo");
        assert_eq!(search.describe(), "a=1, b=x");
    }

    #[test]
    fn progress_every_ten_and_at_end() {
        let search = Echo {
            key: "e".to_string(),
        };
        let compounds: Vec<String> = (0..25).map(|i| format!("C{i}")).collect();
        let sink = Recorder::default();
        let hits = search.find_all(&compounds, &sink).unwrap();
        assert_eq!(hits.len(), 25);
        assert_eq!(hits[0].search_key(), "e");
        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[2].contains("compounds=25/25"));
    }

    #[test]
    fn equality_ignores_key() {
        let a: Box<dyn Search> = Box::new(Echo {
            key: "one".to_string(),
        });
        let b: Box<dyn Search> = Box::new(Echo {
            key: "two".to_string(),
        });
        assert!(*a == *b);
    }
}
