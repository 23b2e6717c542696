// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic → backend routing tables and the subscription index.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::wrappers::{PublishTypeWrapper, SubscribeWrapper};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("bad topic rule [{pattern}]: {source}")]
    BadRule {
        pattern: String,
        source: regex::Error,
    },

    #[error("channel [{topic}] already initialized for type [{type_name}]")]
    DuplicateChannel {
        topic: String,
        type_name: &'static str,
    },

    #[error("no subscribe rule matches topic [{topic}]")]
    NoBackendMatched { topic: String },

    #[error("unknown filter [{0}]")]
    UnknownFilter(String),
}

#[derive(Debug)]
struct Rule {
    raw: String,
    pattern: Regex,
    backends: Vec<String>,
    filters: Vec<String>,
}

/// Ordered first-match-wins rule list for one direction.
///
/// Every rule is compiled anchored (`^(?:rule)$`), so an exact topic string
/// behaves as the special regex `^literal$`.
#[derive(Debug, Default)]
pub struct RuleList {
    rules: Vec<Rule>,
}

impl RuleList {
    pub fn push(
        &mut self,
        topic_rule: &str,
        backends: Vec<String>,
        filters: Vec<String>,
    ) -> Result<(), ChannelError> {
        let pattern =
            Regex::new(&format!("^(?:{topic_rule})$")).map_err(|source| ChannelError::BadRule {
                pattern: topic_rule.to_owned(),
                source,
            })?;
        self.rules.push(Rule {
            raw: topic_rule.to_owned(),
            pattern,
            backends,
            filters,
        });
        Ok(())
    }

    fn find(&self, topic: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(topic))
    }

    /// The backend set of the earliest matching rule; `None` when nothing
    /// matches (publish no-op, subscribe error).
    pub fn match_backends(&self, topic: &str) -> Option<&[String]> {
        self.find(topic).map(|rule| rule.backends.as_slice())
    }

    pub fn match_filters(&self, topic: &str) -> &[String] {
        self.find(topic).map(|rule| rule.filters.as_slice()).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.raw.as_str())
    }
}

/// Mutable during Init; frozen into a [`ChannelRegistry`] before Start.
#[derive(Debug, Default)]
pub struct ChannelRegistryBuilder {
    pub_rules: RuleList,
    sub_rules: RuleList,
    publish_types: Vec<PublishTypeWrapper>,
    subscriptions: HashMap<String, Vec<Arc<SubscribeWrapper>>>,
}

impl ChannelRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pub_rule(
        &mut self,
        topic_rule: &str,
        backends: Vec<String>,
        filters: Vec<String>,
    ) -> Result<(), ChannelError> {
        self.pub_rules.push(topic_rule, backends, filters)
    }

    pub fn add_sub_rule(
        &mut self,
        topic_rule: &str,
        backends: Vec<String>,
        filters: Vec<String>,
    ) -> Result<(), ChannelError> {
        self.sub_rules.push(topic_rule, backends, filters)
    }

    pub fn register_publish_type(&mut self, wrapper: PublishTypeWrapper) {
        self.publish_types.push(wrapper);
    }

    /// Register a subscription. The subscribed topic must be routable, or
    /// module initialization fails.
    pub fn subscribe(&mut self, wrapper: SubscribeWrapper) -> Result<(), ChannelError> {
        if self.sub_rules.match_backends(&wrapper.topic).is_none() {
            return Err(ChannelError::NoBackendMatched {
                topic: wrapper.topic.clone(),
            });
        }
        self.subscriptions
            .entry(wrapper.topic.clone())
            .or_default()
            .push(Arc::new(wrapper));
        Ok(())
    }

    pub fn freeze(self) -> Arc<ChannelRegistry> {
        Arc::new(ChannelRegistry {
            pub_rules: self.pub_rules,
            sub_rules: self.sub_rules,
            publish_types: self.publish_types,
            subscriptions: self.subscriptions,
        })
    }
}

/// Read-only routing state shared with every backend for Start..PreShutdown.
#[derive(Debug)]
pub struct ChannelRegistry {
    pub_rules: RuleList,
    sub_rules: RuleList,
    publish_types: Vec<PublishTypeWrapper>,
    subscriptions: HashMap<String, Vec<Arc<SubscribeWrapper>>>,
}

impl ChannelRegistry {
    pub fn pub_backends(&self, topic: &str) -> Option<&[String]> {
        self.pub_rules.match_backends(topic)
    }

    pub fn sub_backends(&self, topic: &str) -> Option<&[String]> {
        self.sub_rules.match_backends(topic)
    }

    pub fn pub_filters(&self, topic: &str) -> &[String] {
        self.pub_rules.match_filters(topic)
    }

    pub fn sub_filters(&self, topic: &str) -> &[String] {
        self.sub_rules.match_filters(topic)
    }

    pub fn publish_types(&self) -> &[PublishTypeWrapper] {
        &self.publish_types
    }

    pub fn subscriptions(&self, topic: &str) -> &[Arc<SubscribeWrapper>] {
        self.subscriptions
            .get(topic)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_subscriptions(&self) -> impl Iterator<Item = &Arc<SubscribeWrapper>> {
        self.subscriptions.values().flatten()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
