//! Per-connection subscription manager.
//!
//! Tracks which topics a WebSocket client is subscribed to and provides
//! server-side event filtering.

use std::collections::HashSet;

use crate::domain::Topic;

/// Parses a topic name. Returns `None` for unknown names and for `"*"`.
#[must_use]
pub fn parse_topic(name: &str) -> Option<Topic> {
    match name {
        "events" => Some(Topic::Events),
        "stats" => Some(Topic::Stats),
        "sync" => Some(Topic::Sync),
        _ => None,
    }
}

/// Manages the set of topic subscriptions for a single WebSocket connection.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Subscribed topics. Ignored while `subscribe_all` is set.
    topics: HashSet<Topic>,
    /// Whether the client subscribes to all topics (wildcard `"*"`).
    subscribe_all: bool,
}

impl SubscriptionManager {
    /// Creates a new empty subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds topics by name. `"*"` enables the wildcard; unknown names are
    /// returned.
    pub fn subscribe<'a>(&mut self, names: &'a [String]) -> Vec<&'a str> {
        let mut unknown = Vec::new();
        for name in names {
            if name == "*" {
                self.subscribe_all = true;
            } else if let Some(topic) = parse_topic(name) {
                self.topics.insert(topic);
            } else {
                unknown.push(name.as_str());
            }
        }
        unknown
    }

    /// Removes topics by name. `"*"` drops the wildcard.
    pub fn unsubscribe(&mut self, names: &[String]) {
        for name in names {
            if name == "*" {
                self.subscribe_all = false;
            } else if let Some(topic) = parse_topic(name) {
                self.topics.remove(&topic);
            }
        }
    }

    /// Returns `true` if the given topic matches the subscription filter.
    #[must_use]
    pub fn matches(&self, topic: Topic) -> bool {
        self.subscribe_all || self.topics.contains(&topic)
    }

    /// Returns the explicitly subscribed topic names, sorted.
    #[must_use]
    pub fn topic_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .topics
            .iter()
            .map(|t| match t {
                Topic::Events => "events",
                Topic::Stats => "stats",
                Topic::Sync => "sync",
            })
            .collect();
        names.sort_unstable();
        names
    }

    /// Returns `true` if the wildcard subscription is active.
    #[must_use]
    pub fn is_subscribed_all(&self) -> bool {
        self.subscribe_all
    }
}
