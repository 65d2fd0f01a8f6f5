use glam::DVec2;
use serde_json::Value;

use crate::game::{GameMode, GameState, Intent, OutcomeView, StateView};
use crate::input::KeySnapshot;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct RequestId(Value);

impl RequestId {
    pub fn new(value: Value) -> Option<Self> {
        match value {
            Value::String(_) | Value::Number(_) => Some(Self(value)),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

#[derive(Debug)]
pub enum Request {
    Hello(HelloRequest),
    Start(StartRequest),
    Update(UpdateRequest),
    GetState { id: Option<RequestId> },
    Mine(TargetRequest),
    Place(TargetRequest),
    SelectSlot(SelectSlotRequest),
    Jump { id: Option<RequestId> },
    Save { id: Option<RequestId> },
    ListWorlds { id: Option<RequestId> },
    Menu { id: Option<RequestId> },
    Shutdown { id: Option<RequestId> },
    Unknown { id: Option<RequestId>, op: String },
}

impl Request {
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Request::Hello(req) => req.id.clone(),
            Request::Start(req) => req.id.clone(),
            Request::Update(req) => req.id.clone(),
            Request::Mine(req) | Request::Place(req) => req.id.clone(),
            Request::SelectSlot(req) => req.id.clone(),
            Request::GetState { id }
            | Request::Jump { id }
            | Request::Save { id }
            | Request::ListWorlds { id }
            | Request::Menu { id }
            | Request::Shutdown { id }
            | Request::Unknown { id, .. } => id.clone(),
        }
    }

    pub fn op(&self) -> &str {
        match self {
            Request::Hello(_) => "hello",
            Request::Start(_) => "start",
            Request::Update(_) => "update",
            Request::GetState { .. } => "state",
            Request::Mine(_) => "mine",
            Request::Place(_) => "place",
            Request::SelectSlot(_) => "select_slot",
            Request::Jump { .. } => "jump",
            Request::Save { .. } => "save",
            Request::ListWorlds { .. } => "list_worlds",
            Request::Menu { .. } => "menu",
            Request::Shutdown { .. } => "shutdown",
            Request::Unknown { op, .. } => op,
        }
    }
}

#[derive(Debug)]
pub struct HelloRequest {
    pub id: Option<RequestId>,
    pub version: u32,
}

#[derive(Debug)]
pub struct StartRequest {
    pub id: Option<RequestId>,
    pub mode: GameMode,
    /// Defaults to `world`.
    pub world: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug)]
pub struct UpdateRequest {
    pub id: Option<RequestId>,
    pub keys: KeySnapshot,
    pub intent: Intent,
}

/// A world-space target for `mine` and `place`.
#[derive(Debug)]
pub struct TargetRequest {
    pub id: Option<RequestId>,
    pub at: DVec2,
}

#[derive(Debug)]
pub struct SelectSlotRequest {
    pub id: Option<RequestId>,
    pub slot: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Unsupported,
    NotPlaying,
    Busy,
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Unsupported => "unsupported",
            ErrorCode::NotPlaying => "not_playing",
            ErrorCode::Busy => "busy",
            ErrorCode::Internal => "internal",
        }
    }
}

#[derive(Debug)]
pub struct ProtocolError {
    pub id: Option<RequestId>,
    pub code: ErrorCode,
    pub message: String,
}

pub fn decode_request(line: &str) -> Result<Request, ProtocolError> {
    let value: Value = serde_json::from_str(line).map_err(|err| ProtocolError {
        id: None,
        code: ErrorCode::BadRequest,
        message: format!("invalid JSON: {err}"),
    })?;

    let obj = value.as_object().ok_or_else(|| ProtocolError {
        id: None,
        code: ErrorCode::BadRequest,
        message: "request must be a JSON object".to_string(),
    })?;

    let id = obj.get("id").cloned().and_then(RequestId::new);
    let bad = |message: String| ProtocolError {
        id: id.clone(),
        code: ErrorCode::BadRequest,
        message,
    };

    let op = obj
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or_else(|| bad("missing or invalid string field `op`".to_string()))?;

    match op {
        "hello" => {
            let version = obj
                .get("version")
                .and_then(|v| v.as_u64())
                .ok_or_else(|| bad("missing or invalid numeric field `version`".to_string()))?
                as u32;
            Ok(Request::Hello(HelloRequest { id, version }))
        }
        "start" => {
            let mode = match parse_optional_str(obj, "mode").map_err(bad)? {
                None => GameMode::default(),
                Some(key) => GameMode::from_key(key)
                    .ok_or_else(|| bad(format!("unknown game mode `{key}`")))?,
            };
            let world = parse_optional_str(obj, "world").map_err(bad)?.map(str::to_string);
            let seed = parse_optional_u64(obj, "seed").map_err(bad)?;
            Ok(Request::Start(StartRequest {
                id,
                mode,
                world,
                seed,
            }))
        }
        "update" => {
            let keys = match obj.get("keys") {
                None => KeySnapshot::new(),
                Some(Value::Object(map)) => {
                    let mut entries = Vec::with_capacity(map.len());
                    for (name, pressed) in map {
                        let pressed = pressed
                            .as_bool()
                            .ok_or_else(|| bad(format!("invalid boolean for key `{name}`")))?;
                        entries.push((name.as_str(), pressed));
                    }
                    KeySnapshot::from_named(entries).map_err(bad)?
                }
                Some(_) => return Err(bad("invalid object field `keys`".to_string())),
            };
            let intent = Intent {
                cursor: parse_optional_point(obj, "cursor")
                    .map_err(bad)?
                    .unwrap_or(DVec2::ZERO),
                mining: parse_optional_bool(obj, "mining").map_err(bad)?.unwrap_or(false),
                place: parse_optional_bool(obj, "place").map_err(bad)?.unwrap_or(false),
                scroll: parse_optional_i32(obj, "scroll").map_err(bad)?.unwrap_or(0),
            };
            Ok(Request::Update(UpdateRequest { id, keys, intent }))
        }
        "state" => Ok(Request::GetState { id }),
        "mine" | "place" => {
            let at = parse_optional_point(obj, "at")
                .map_err(bad)?
                .ok_or_else(|| bad("missing field `at`".to_string()))?;
            let target = TargetRequest { id, at };
            Ok(if op == "mine" {
                Request::Mine(target)
            } else {
                Request::Place(target)
            })
        }
        "select_slot" => {
            let slot = parse_optional_u64(obj, "slot")
                .map_err(bad)?
                .ok_or_else(|| bad("missing or invalid numeric field `slot`".to_string()))?;
            Ok(Request::SelectSlot(SelectSlotRequest {
                id,
                slot: slot as usize,
            }))
        }
        "jump" => Ok(Request::Jump { id }),
        "save" => Ok(Request::Save { id }),
        "list_worlds" => Ok(Request::ListWorlds { id }),
        "menu" => Ok(Request::Menu { id }),
        "shutdown" => Ok(Request::Shutdown { id }),
        other => Ok(Request::Unknown {
            id,
            op: other.to_string(),
        }),
    }
}

fn parse_optional_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<&'a str>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_str()
            .ok_or_else(|| format!("invalid string field `{key}`"))
            .map(Some),
    }
}

fn parse_optional_bool(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<bool>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| format!("invalid boolean field `{key}`"))
            .map(Some),
    }
}

fn parse_optional_u64(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<u64>, String> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .ok_or_else(|| format!("invalid numeric field `{key}`"))
            .map(Some),
    }
}

fn parse_optional_i32(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<i32>, String> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => {
            let raw = v
                .as_i64()
                .ok_or_else(|| format!("invalid numeric field `{key}`"))?;
            let value: i32 = raw
                .try_into()
                .map_err(|_| format!("field `{key}` out of range"))?;
            Ok(Some(value))
        }
    }
}

fn parse_optional_point(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<Option<DVec2>, String> {
    let invalid = || format!("field `{key}` must be an [x, y] pair of numbers");
    match obj.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) if items.len() == 2 => {
            let x = items[0].as_f64().ok_or_else(invalid)?;
            let y = items[1].as_f64().ok_or_else(invalid)?;
            Ok(Some(DVec2::new(x, y)))
        }
        Some(_) => Err(invalid()),
    }
}

fn event(name: &str, id: Option<RequestId>) -> serde_json::Map<String, Value> {
    let mut obj = serde_json::Map::new();
    obj.insert("event".to_string(), Value::String(name.to_string()));
    if let Some(id) = id {
        obj.insert("id".to_string(), id.into_value());
    }
    obj
}

pub fn event_hello(id: Option<RequestId>, capabilities: &[&str]) -> Value {
    let mut obj = event("hello", id);
    obj.insert(
        "version".to_string(),
        Value::Number((PROTOCOL_VERSION as u64).into()),
    );
    obj.insert(
        "capabilities".to_string(),
        Value::Array(
            capabilities
                .iter()
                .map(|cap| Value::String((*cap).to_string()))
                .collect(),
        ),
    );
    Value::Object(obj)
}

pub fn event_ok(id: Option<RequestId>) -> Value {
    Value::Object(event("ok", id))
}

pub fn event_error(id: Option<RequestId>, code: ErrorCode, message: impl Into<String>) -> Value {
    let mut obj = event("error", id);
    obj.insert("code".to_string(), Value::String(code.as_str().to_string()));
    obj.insert("message".to_string(), Value::String(message.into()));
    Value::Object(obj)
}

pub fn event_started(id: Option<RequestId>, world: &str, seed: u64, mode: GameMode) -> Value {
    let mut obj = event("started", id);
    obj.insert("world".to_string(), Value::String(world.to_string()));
    obj.insert("seed".to_string(), Value::Number(seed.into()));
    obj.insert("mode".to_string(), Value::String(mode.as_str().to_string()));
    Value::Object(obj)
}

pub fn event_updated(id: Option<RequestId>, tick: u64, outcomes: &[OutcomeView]) -> Value {
    let mut obj = event("updated", id);
    obj.insert("tick".to_string(), Value::Number(tick.into()));
    obj.insert(
        "events".to_string(),
        serde_json::to_value(outcomes).unwrap_or(Value::Array(Vec::new())),
    );
    Value::Object(obj)
}

pub fn event_action(id: Option<RequestId>, outcome: &OutcomeView) -> Value {
    let mut obj = event("action", id);
    obj.insert(
        "outcome".to_string(),
        serde_json::to_value(outcome).unwrap_or(Value::Null),
    );
    Value::Object(obj)
}

/// Frame state, or just the session state when no game is running.
pub fn event_state(
    id: Option<RequestId>,
    state: GameState,
    view: Option<&StateView>,
) -> Result<Value, serde_json::Error> {
    let mut obj = event("state", id);
    obj.insert("state".to_string(), serde_json::to_value(state)?);
    obj.insert("in_game".to_string(), Value::Bool(view.is_some()));
    if let Some(view) = view {
        obj.insert("frame".to_string(), serde_json::to_value(view)?);
    }
    Ok(Value::Object(obj))
}

pub fn event_worlds(id: Option<RequestId>, worlds: &[String], next: &str) -> Value {
    let mut obj = event("worlds", id);
    obj.insert(
        "worlds".to_string(),
        Value::Array(worlds.iter().cloned().map(Value::String).collect()),
    );
    obj.insert("next".to_string(), Value::String(next.to_string()));
    Value::Object(obj)
}
