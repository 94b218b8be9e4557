use dashmap::DashMap;

use super::types::request::{Command, SubscribeOptions};
use crate::topic;

/// One recorded control command.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntry {
    pub topic: String,
    pub command: Command,
    pub options: Option<SubscribeOptions>,
}

impl SubscriptionEntry {
    #[must_use]
    pub fn is_replay(&self) -> bool {
        self.options.as_ref().is_some_and(|options| options.is_replay)
    }
}

/// Per-topic history of subscribe and unsubscribe commands, used to restore topic state on a
/// fresh socket.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    history: DashMap<String, Vec<SubscriptionEntry>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `command` for every topic, skipping heartbeat topics and replays of topics that
    /// are already recorded. Returns the number of entries appended.
    pub fn record(
        &self,
        topics: &[String],
        command: Command,
        options: Option<&SubscribeOptions>,
    ) -> usize {
        let is_replay = options.is_some_and(|options| options.is_replay);
        let mut recorded = 0;

        for topic in topics {
            if topic::is_heartbeat(topic) {
                continue;
            }

            let mut entries = self.history.entry(topic.clone()).or_default();
            if is_replay && !entries.is_empty() {
                continue;
            }

            entries.push(SubscriptionEntry {
                topic: topic.clone(),
                command,
                options: options.cloned(),
            });
            recorded += 1;
        }

        recorded
    }

    /// Entries to re-issue on a new socket, ordered by topic.
    ///
    /// Only topics whose latest command is a subscribe are included, one entry each, with their
    /// options marked as a replay.
    #[must_use]
    pub fn replay_plan(&self) -> Vec<SubscriptionEntry> {
        let mut plan: Vec<SubscriptionEntry> = self
            .history
            .iter()
            .filter_map(|entries| {
                let latest = entries.value().last()?;
                (latest.command == Command::Subscribe).then(|| SubscriptionEntry {
                    topic: latest.topic.clone(),
                    command: Command::Subscribe,
                    options: Some(
                        latest
                            .options
                            .as_ref()
                            .map_or_else(Self::replay_options, SubscribeOptions::replayed),
                    ),
                })
            })
            .collect();

        plan.sort_by(|a, b| a.topic.cmp(&b.topic));
        plan
    }

    /// Topics whose latest recorded command is a subscribe, sorted.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .history
            .iter()
            .filter(|entries| {
                entries
                    .value()
                    .last()
                    .is_some_and(|latest| latest.command == Command::Subscribe)
            })
            .map(|entries| entries.key().clone())
            .collect();

        topics.sort();
        topics
    }

    /// Every command recorded for `topic`, oldest first.
    #[must_use]
    pub fn history(&self, topic: &str) -> Vec<SubscriptionEntry> {
        self.history
            .get(topic)
            .map(|entries| entries.value().clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn replay_options() -> SubscribeOptions {
        SubscribeOptions::builder().is_replay(true).build()
    }
}
