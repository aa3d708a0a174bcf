#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dojo_sync::application::coordinator::DataLayer;
use dojo_sync::application::transport::{ApiRequest, START_KEY_PARAM, Transport, TransportError};
use dojo_sync::cache::EntityCache;
use dojo_sync::infra::connectivity::ConnectivityFlag;
use serde_json::{Value, json};

/// In-process transport answering from scripted responses.
///
/// Routes are `"{path}"` or `"{path}?startKey={cursor}"`. Each route replays its
/// queued responses in order and keeps repeating the last one.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, TransportError>>>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, route: &str, response: Result<Value, TransportError>) -> &Self {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(route.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_to(&self, route: &str) -> usize {
        self.calls().iter().filter(|call| *call == route).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    fn route(request: &ApiRequest) -> String {
        match request.query_value(START_KEY_PARAM) {
            Some(cursor) => format!("{}?{START_KEY_PARAM}={cursor}", request.path()),
            None => request.path(),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let route = Self::route(&request);
        self.calls.lock().expect("calls lock").push(route.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut responses = self.responses.lock().expect("responses lock");
        match responses.get_mut(&route) {
            Some(queue) if queue.len() > 1 => queue.pop_front().expect("queued response"),
            Some(queue) => queue.front().cloned().expect("queued response"),
            None => Err(TransportError::Status {
                status: 404,
                body: format!("no scripted response for {route}"),
            }),
        }
    }
}

pub struct Harness {
    pub layer: DataLayer,
    pub transport: Arc<ScriptedTransport>,
    pub connectivity: ConnectivityFlag,
}

pub fn harness(transport: ScriptedTransport) -> Harness {
    let transport = Arc::new(transport);
    let connectivity = ConnectivityFlag::default();
    let layer = DataLayer::new(
        Arc::new(EntityCache::new()),
        transport.clone(),
        Arc::new(connectivity.clone()),
    );
    Harness {
        layer,
        transport,
        connectivity,
    }
}

pub fn user_json(username: &str, cohort: &str, rating: f64) -> Value {
    json!({
        "username": username,
        "displayName": username.to_uppercase(),
        "dojoCohort": cohort,
        "rating": rating,
    })
}

pub fn game_json(cohort: &str, id: u32) -> Value {
    json!({
        "cohort": cohort,
        "id": format!("g{id:03}"),
        "white": "alice",
        "black": "bob",
        "date": format!("2024-01-{:02}", id % 28 + 1),
        "result": "1-0",
    })
}

pub fn games_page(cohort: &str, ids: std::ops::Range<u32>, cursor: Option<&str>) -> Value {
    let items: Vec<Value> = ids.map(|id| game_json(cohort, id)).collect();
    match cursor {
        Some(cursor) => json!({ "items": items, "lastEvaluatedKey": cursor }),
        None => json!({ "items": items }),
    }
}
