use crate::renderer::{ChatEntry, InputState};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinConfig {
    #[serde(deserialize_with = "numeric_id")]
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Scale,
    MultipleChoice,
}

impl QuestionType {
    pub fn takes_options(self) -> bool {
        matches!(self, QuestionType::Scale | QuestionType::MultipleChoice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(deserialize_with = "numeric_id")]
    pub id: u64,
    pub question_text: String,
    pub question_type: QuestionType,
    /// Either a JSON array or a string holding an encoded JSON array.
    #[serde(default, deserialize_with = "option_list")]
    pub options: Vec<String>,
    /// Kept raw: the backend sends an object, an encoded string or null, and a
    /// malformed rule must not reject the whole config.
    #[serde(default)]
    pub conditional_logic: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRule {
    #[serde(default, deserialize_with = "optional_numeric_id")]
    pub depends_on_question_id: Option<u64>,
    #[serde(default)]
    pub show_if_value: Option<ShowIfValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShowIfValue {
    One(String),
    Any(Vec<String>),
}

/// A recorded answer. Choice questions store the selected option as a value,
/// free-text questions store the typed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ResponseRecord", try_from = "ResponseRecord")]
pub enum Response {
    Text(String),
    Value(String),
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Response::Text(text.into())
    }

    pub fn value(value: impl Into<String>) -> Self {
        Response::Value(value.into())
    }

    /// The string conditional rules compare against.
    pub fn as_str(&self) -> &str {
        match self {
            Response::Text(text) | Response::Value(text) => text,
        }
    }
}

/// Wire form of a [`Response`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub response_value: Option<String>,
}

impl From<Response> for ResponseRecord {
    fn from(response: Response) -> Self {
        match response {
            Response::Text(text) => ResponseRecord {
                response_text: Some(text),
                response_value: None,
            },
            Response::Value(value) => ResponseRecord {
                response_text: None,
                response_value: Some(value),
            },
        }
    }
}

impl TryFrom<ResponseRecord> for Response {
    type Error = String;

    fn try_from(record: ResponseRecord) -> Result<Self, Self::Error> {
        let non_empty = |field: Option<String>| field.filter(|value| !value.is_empty());
        match (
            non_empty(record.response_value),
            non_empty(record.response_text),
        ) {
            (Some(value), _) => Ok(Response::Value(value)),
            (None, Some(text)) => Ok(Response::Text(text)),
            (None, None) => Err("response has neither response_text nor response_value".into()),
        }
    }
}

/// Persisted in-progress answers for one config and one week.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub responses: BTreeMap<String, ResponseRecord>,
    #[serde(rename = "currentQuestionIndex", default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, deserialize_with = "numeric_id")]
    pub config_id: u64,
    #[serde(default, alias = "week_date")]
    pub week_start: Option<String>,
}

impl ProgressSnapshot {
    /// Responses keyed by numeric question id. Non-numeric keys and records
    /// without an answer are dropped.
    pub fn responses(&self) -> BTreeMap<u64, Response> {
        decode_responses(&self.responses)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub points_awarded: Option<i64>,
    #[serde(default)]
    pub new_total_points: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteProgress {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "response_map")]
    pub responses: BTreeMap<String, ResponseRecord>,
    #[serde(default, deserialize_with = "numeric_id_list")]
    pub answered_questions: Vec<u64>,
}

impl RemoteProgress {
    pub fn responses(&self) -> BTreeMap<u64, Response> {
        decode_responses(&self.responses)
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: u64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionStatus {
    NotStarted,
    InFlight,
    Accepted {
        points_awarded: i64,
        new_total_points: Option<i64>,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckinView {
    pub config_id: u64,
    pub title: Option<String>,
    pub messages: Vec<ChatEntry>,
    pub input: InputState,
    pub current_question: Option<u64>,
    pub completed: bool,
    pub submission: SubmissionStatus,
}

fn decode_responses(raw: &BTreeMap<String, ResponseRecord>) -> BTreeMap<u64, Response> {
    raw.iter()
        .filter_map(|(key, record)| {
            let id = key.trim().parse::<u64>().ok()?;
            let response = Response::try_from(record.clone()).ok()?;
            Some((id, response))
        })
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericId {
    Number(u64),
    Text(String),
}

impl NumericId {
    fn parse(self) -> Result<u64, String> {
        match self {
            NumericId::Number(id) => Ok(id),
            NumericId::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| format!("invalid numeric id: {text:?}")),
        }
    }
}

fn numeric_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    NumericId::deserialize(deserializer)?
        .parse()
        .map_err(de::Error::custom)
}

fn optional_numeric_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    match Option::<NumericId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumericId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(id) => id.parse().map(Some).map_err(de::Error::custom),
    }
}

fn numeric_id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
    Option::<Vec<NumericId>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|id| id.parse().map_err(de::Error::custom))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OptionList {
    List(Vec<String>),
    Encoded(String),
}

fn option_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match Option::<OptionList>::deserialize(deserializer)? {
        None => Ok(Vec::new()),
        Some(OptionList::List(options)) => Ok(options),
        Some(OptionList::Encoded(encoded)) if encoded.trim().is_empty() => Ok(Vec::new()),
        Some(OptionList::Encoded(encoded)) => {
            serde_json::from_str(&encoded).map_err(de::Error::custom)
        }
    }
}

// PHP encodes an empty associative array as `[]`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResponseMap {
    Map(BTreeMap<String, ResponseRecord>),
    List(de::IgnoredAny),
}

fn response_map<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, ResponseRecord>, D::Error> {
    match Option::<ResponseMap>::deserialize(deserializer)? {
        Some(ResponseMap::Map(map)) => Ok(map),
        Some(ResponseMap::List(_)) | None => Ok(BTreeMap::new()),
    }
}
