//! Scripted backend connections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backend::{
    BackendConnection, BackendError, BackendPool, BackendResult, BinaryRecord, ExhaustionPolicy,
    QueryParams,
};

/// Canned reply for one action.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(Vec<String>),
    Binary(Option<BinaryRecord>),
    /// Fail with a query error carrying this message
    Fail(String),
    Timeout,
}

/// Shared script and call log for every connection of a mock pool.
///
/// Replies are keyed by the query's `action`; an unscripted action fails.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    name: String,
    replies: Arc<Mutex<HashMap<String, MockReply>>>,
    calls: Arc<Mutex<Vec<QueryParams>>>,
}

impl MockBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reply(self, action: &str, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(action.to_string(), reply);
        self
    }

    pub fn text<S: Into<String>>(self, action: &str, lines: impl IntoIterator<Item = S>) -> Self {
        let lines = lines.into_iter().map(Into::into).collect();
        self.reply(action, MockReply::Text(lines))
    }

    pub fn binary(self, action: &str, record: BinaryRecord) -> Self {
        self.reply(action, MockReply::Binary(Some(record)))
    }

    pub fn fail(self, action: &str, message: &str) -> Self {
        self.reply(action, MockReply::Fail(message.to_string()))
    }

    /// Every query issued so far, in order.
    pub fn calls(&self) -> Vec<QueryParams> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Queries issued with the given action.
    pub fn calls_for(&self, action: &str) -> Vec<QueryParams> {
        self.calls()
            .into_iter()
            .filter(|q| q.action() == action)
            .collect()
    }

    pub fn connection(&self) -> MockConnection {
        MockConnection {
            backend: self.clone(),
        }
    }

    /// A pool of `capacity` connections sharing this script.
    pub fn pool(&self, capacity: usize, policy: ExhaustionPolicy) -> BackendPool {
        let conns = (0..capacity)
            .map(|_| Box::new(self.connection()) as Box<dyn BackendConnection>)
            .collect();
        BackendPool::new(self.name.clone(), conns, policy)
    }

    fn answer(&self, params: &QueryParams) -> BackendResult<MockReply> {
        self.calls.lock().unwrap().push(params.clone());
        let reply = self.replies.lock().unwrap().get(params.action()).cloned();
        match reply {
            Some(MockReply::Fail(message)) => Err(BackendError::Query {
                backend: self.name.clone(),
                status: 500,
                message,
            }),
            Some(MockReply::Timeout) => Err(BackendError::Timeout {
                backend: self.name.clone(),
            }),
            Some(reply) => Ok(reply),
            None => Err(BackendError::Query {
                backend: self.name.clone(),
                status: 404,
                message: format!("no scripted reply for action '{}'", params.action()),
            }),
        }
    }
}

/// One connection of a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct MockConnection {
    backend: MockBackend,
}

#[async_trait]
impl BackendConnection for MockConnection {
    fn backend(&self) -> &str {
        &self.backend.name
    }

    async fn text_query(&self, params: &QueryParams) -> BackendResult<Vec<String>> {
        match self.backend.answer(params)? {
            MockReply::Text(lines) => Ok(lines),
            other => Err(BackendError::decode(
                &self.backend.name,
                format!("expected text reply, scripted {:?}", other),
            )),
        }
    }

    async fn binary_query(&self, params: &QueryParams) -> BackendResult<Option<BinaryRecord>> {
        match self.backend.answer(params)? {
            MockReply::Binary(record) => Ok(record),
            other => Err(BackendError::decode(
                &self.backend.name,
                format!("expected binary reply, scripted {:?}", other),
            )),
        }
    }
}
