//! The dispatcher registry.
//!
//! Matching rules:
//! - a pattern must match the *whole* input (it is anchored at both ends);
//! - matching ignores letter case;
//! - the highest priority among matching entries wins;
//! - equal priorities are resolved by the dispatcher's `TieBreak` policy.

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::error::DispatchError;

/// Priority given by `register`.
pub const DEFAULT_PRIORITY: i32 = 10;

/// A registered handler. Shared so `register` can hand it back unchanged.
pub type Handler<T> = Arc<dyn Fn(&str) -> T + Send + Sync>;

/// How to choose between matching entries of equal priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The entry registered first wins.
    #[default]
    FirstRegistered,
    /// Equal-priority matches are an error.
    Strict,
}

struct Entry<T> {
    pattern: String,
    regex: Regex,
    priority: i32,
    handler: Handler<T>,
}

pub struct RegexDispatcher<T> {
    name: String,
    policy: TieBreak,
    entries: Vec<Entry<T>>,
}

impl<T> fmt::Debug for RegexDispatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexDispatcher")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field(
                "patterns",
                &self
                    .entries
                    .iter()
                    .map(|e| (e.pattern.as_str(), e.priority))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<T> RegexDispatcher<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: TieBreak::default(),
            entries: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: TieBreak) -> Self {
        self.policy = policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> TieBreak {
        self.policy
    }

    /// Register `handler` for `pattern` at `DEFAULT_PRIORITY`.
    pub fn register<F>(&mut self, pattern: &str, handler: F) -> Result<Handler<T>, DispatchError>
    where
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        self.register_handler(pattern, DEFAULT_PRIORITY, Arc::new(handler))
    }

    pub fn register_with_priority<F>(
        &mut self,
        pattern: &str,
        priority: i32,
        handler: F,
    ) -> Result<Handler<T>, DispatchError>
    where
        F: Fn(&str) -> T + Send + Sync + 'static,
    {
        self.register_handler(pattern, priority, Arc::new(handler))
    }

    /// Register an already shared handler; returns it unchanged.
    ///
    /// The pattern is compiled here, so a malformed pattern is rejected at
    /// registration rather than at dispatch. Registering the same pattern at
    /// the same priority again replaces the handler and keeps the original
    /// registration slot.
    pub fn register_handler(
        &mut self,
        pattern: &str,
        priority: i32,
        handler: Handler<T>,
    ) -> Result<Handler<T>, DispatchError> {
        let regex = compile(pattern)?;

        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.pattern == pattern && e.priority == priority)
        {
            existing.handler = Arc::clone(&handler);
            return Ok(handler);
        }

        self.entries.push(Entry {
            pattern: pattern.to_string(),
            regex,
            priority,
            handler: Arc::clone(&handler),
        });
        Ok(handler)
    }

    /// Select the handler for `input`.
    pub fn dispatch(&self, input: &str) -> Result<&Handler<T>, DispatchError> {
        let mut best: Option<&Entry<T>> = None;
        let mut tied: Vec<&Entry<T>> = Vec::new();

        for entry in self.entries.iter().filter(|e| e.regex.is_match(input)) {
            match best {
                Some(b) if entry.priority < b.priority => {}
                Some(b) if entry.priority == b.priority => tied.push(entry),
                _ => {
                    best = Some(entry);
                    tied.clear();
                }
            }
        }

        let Some(best) = best else {
            return Err(DispatchError::NoMatch {
                dispatcher: self.name.clone(),
                input: input.to_string(),
            });
        };

        if self.policy == TieBreak::Strict && !tied.is_empty() {
            let mut patterns = vec![best.pattern.clone()];
            patterns.extend(tied.iter().map(|e| e.pattern.clone()));
            return Err(DispatchError::Conflict {
                dispatcher: self.name.clone(),
                input: input.to_string(),
                priority: best.priority,
                patterns,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            dispatcher = %self.name,
            pattern = %best.pattern,
            priority = best.priority,
            ties = tied.len(),
            "regex dispatch"
        );

        Ok(&best.handler)
    }

    /// Dispatch, then invoke the selected handler on `input`.
    pub fn call(&self, input: &str) -> Result<T, DispatchError> {
        let handler = self.dispatch(input)?;
        Ok(handler(input))
    }

    /// Handlers in registration order.
    pub fn handlers(&self) -> impl Iterator<Item = &Handler<T>> + '_ {
        self.entries.iter().map(|e| &e.handler)
    }

    /// `(pattern, priority)` pairs in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = (&str, i32)> + '_ {
        self.entries.iter().map(|e| (e.pattern.as_str(), e.priority))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile(pattern: &str) -> Result<Regex, DispatchError> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(true)
        .build()
        .map_err(|source| DispatchError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}
