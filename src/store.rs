use crate::models::{Response, ResponseRecord};
use std::collections::BTreeMap;

/// In-memory answers for the running check-in, keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseStore {
    responses: BTreeMap<u64, Response>,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(responses: BTreeMap<u64, Response>) -> Self {
        Self { responses }
    }

    pub fn get(&self, question_id: u64) -> Option<&Response> {
        self.responses.get(&question_id)
    }

    pub fn contains(&self, question_id: u64) -> bool {
        self.responses.contains_key(&question_id)
    }

    pub fn insert(&mut self, question_id: u64, response: Response) {
        self.responses.insert(question_id, response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    pub fn answered_ids(&self) -> Vec<u64> {
        self.responses.keys().copied().collect()
    }

    /// Wire form, keyed by the id rendered as a string.
    pub fn to_records(&self) -> BTreeMap<String, ResponseRecord> {
        self.responses
            .iter()
            .map(|(id, response)| (id.to_string(), ResponseRecord::from(response.clone())))
            .collect()
    }
}
