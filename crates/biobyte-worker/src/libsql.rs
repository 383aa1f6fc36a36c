//! libSQL remote protocol (`/v2/pipeline` over HTTP) for SeaORM's proxy backend.
//!
//! Rows come back as typed [`Value`]s chosen from each column's declared type,
//! because SeaORM reads a proxied `i32` only from `Value::Int`, an `i64` only
//! from `Value::BigInt`, and so on.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sea_orm::{DbErr, ProxyExecResult, ProxyRow, RuntimeErr, Statement, Value};
use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::error::{AppError, AppResult};

/// `libsql://host` and `https://host` both map to `https://host/v2/pipeline`.
pub fn pipeline_url(database_url: &str) -> AppResult<String> {
    let trimmed = database_url.trim().trim_end_matches('/');
    let base = if let Some(host) = trimmed.strip_prefix("libsql://") {
        format!("https://{host}")
    } else if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        return Err(AppError::Config(format!(
            "LIBSQL_URL must start with libsql://, https:// or http:// (got {trimmed})"
        )));
    };
    Ok(format!("{base}/v2/pipeline"))
}

fn query_err(msg: impl Into<String>) -> DbErr {
    DbErr::Query(RuntimeErr::Internal(msg.into()))
}

fn integer(v: Option<i64>) -> Json {
    match v {
        Some(n) => json!({ "type": "integer", "value": n.to_string() }),
        None => json!({ "type": "null" }),
    }
}

fn float(v: Option<f64>) -> Json {
    match v {
        Some(f) => json!({ "type": "float", "value": f }),
        None => json!({ "type": "null" }),
    }
}

fn text(v: Option<String>) -> Json {
    match v {
        Some(s) => json!({ "type": "text", "value": s }),
        None => json!({ "type": "null" }),
    }
}

/// Encode one bound parameter.
pub fn encode_value(value: &Value) -> Result<Json, DbErr> {
    Ok(match value {
        Value::Bool(v) => integer(v.map(i64::from)),
        Value::TinyInt(v) => integer(v.map(i64::from)),
        Value::SmallInt(v) => integer(v.map(i64::from)),
        Value::Int(v) => integer(v.map(i64::from)),
        Value::BigInt(v) => integer(*v),
        Value::TinyUnsigned(v) => integer(v.map(i64::from)),
        Value::SmallUnsigned(v) => integer(v.map(i64::from)),
        Value::Unsigned(v) => integer(v.map(i64::from)),
        Value::BigUnsigned(v) => integer(
            v.map(i64::try_from)
                .transpose()
                .map_err(|_| query_err("unsigned value does not fit in an SQLite integer"))?,
        ),
        Value::Float(v) => float(v.map(f64::from)),
        Value::Double(v) => float(*v),
        Value::String(v) => text(v.as_deref().cloned()),
        Value::Char(v) => text(v.map(String::from)),
        Value::Bytes(v) => match v {
            Some(bytes) => json!({ "type": "blob", "base64": STANDARD.encode(bytes.as_slice()) }),
            None => json!({ "type": "null" }),
        },
        Value::Json(v) => text(v.as_deref().map(Json::to_string)),
        other => return Err(query_err(format!("unsupported bind value {other:?}"))),
    })
}

/// One `execute` request, followed by `close` unless the stream must stay open
/// for a transaction.
pub fn pipeline_body(stmt: &Statement, baton: Option<&str>, close: bool) -> Result<Json, DbErr> {
    let args = match &stmt.values {
        Some(values) => values.0.iter().map(encode_value).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let mut requests = vec![json!({
        "type": "execute",
        "stmt": { "sql": stmt.sql, "args": args, "want_rows": true },
    })];
    if close {
        requests.push(json!({ "type": "close" }));
    }
    Ok(json!({ "baton": baton, "requests": requests }))
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WireValue {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decltype: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StmtResult {
    #[serde(default)]
    pub cols: Vec<Column>,
    #[serde(default)]
    pub rows: Vec<Vec<WireValue>>,
    #[serde(default)]
    pub affected_row_count: u64,
    #[serde(default)]
    pub last_insert_rowid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResponse {
    Execute { result: StmtResult },
    Close,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResult {
    Ok { response: StreamResponse },
    Error { error: WireError },
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    #[serde(default)]
    baton: Option<String>,
    results: Vec<StreamResult>,
}

/// Parse a pipeline answer into the next baton and the `execute` result.
pub fn parse_pipeline(body: &str) -> Result<(Option<String>, StmtResult), DbErr> {
    let parsed: PipelineResponse = serde_json::from_str(body)
        .map_err(|e| DbErr::Conn(RuntimeErr::Internal(format!("libsql: malformed pipeline answer: {e}"))))?;
    match parsed.results.into_iter().next() {
        Some(StreamResult::Ok {
            response: StreamResponse::Execute { result },
        }) => Ok((parsed.baton, result)),
        Some(StreamResult::Error { error }) => Err(query_err(error.message)),
        Some(StreamResult::Ok {
            response: StreamResponse::Close,
        })
        | None => Err(query_err("libsql: pipeline answer has no execute result")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Int,
    BigInt,
    Real,
    Text,
    Bool,
    Blob,
}

/// Column type as declared by the migrations; expressions have none.
fn affinity(decltype: Option<&str>) -> Option<Affinity> {
    let t = decltype?.to_ascii_lowercase();
    Some(if t.contains("bool") {
        Affinity::Bool
    } else if t.contains("bigint") || t.contains("big_integer") {
        Affinity::BigInt
    } else if t.contains("int") {
        Affinity::Int
    } else if t.contains("char") || t.contains("text") || t.contains("clob") {
        Affinity::Text
    } else if t.contains("real") || t.contains("floa") || t.contains("doub") || t.contains("dec") {
        Affinity::Real
    } else if t.contains("blob") {
        Affinity::Blob
    } else {
        return None;
    })
}

fn parse_i64(raw: &str) -> Result<i64, DbErr> {
    raw.parse()
        .map_err(|_| query_err(format!("libsql: integer value {raw:?} out of range")))
}

fn decode_blob(raw: &str) -> Result<Vec<u8>, DbErr> {
    STANDARD
        .decode(raw)
        .map_err(|e| query_err(format!("libsql: bad blob encoding: {e}")))
}

fn mismatch(affinity: Affinity, value: &WireValue) -> DbErr {
    query_err(format!("libsql: {value:?} in a {affinity:?} column"))
}

/// Convert one wire value into the SeaORM value its column expects.
fn column_value(decltype: Option<&str>, value: &WireValue) -> Result<Value, DbErr> {
    let Some(affinity) = affinity(decltype) else {
        return Ok(match value {
            WireValue::Null => Value::BigInt(None),
            WireValue::Integer { value } => Value::BigInt(Some(parse_i64(value)?)),
            WireValue::Float { value } => Value::Double(Some(*value)),
            WireValue::Text { value } => Value::String(Some(Box::new(value.clone()))),
            WireValue::Blob { base64 } => Value::Bytes(Some(Box::new(decode_blob(base64)?))),
        });
    };
    Ok(match (affinity, value) {
        (Affinity::Int, WireValue::Null) => Value::Int(None),
        (Affinity::Int, WireValue::Integer { value }) => Value::Int(Some(
            i32::try_from(parse_i64(value)?)
                .map_err(|_| query_err(format!("libsql: {value} does not fit in i32")))?,
        )),
        (Affinity::BigInt, WireValue::Null) => Value::BigInt(None),
        (Affinity::BigInt, WireValue::Integer { value }) => Value::BigInt(Some(parse_i64(value)?)),
        (Affinity::Bool, WireValue::Null) => Value::Bool(None),
        (Affinity::Bool, WireValue::Integer { value }) => Value::Bool(Some(parse_i64(value)? != 0)),
        (Affinity::Real, WireValue::Null) => Value::Double(None),
        (Affinity::Real, WireValue::Float { value }) => Value::Double(Some(*value)),
        (Affinity::Real, WireValue::Integer { value }) => Value::Double(Some(parse_i64(value)? as f64)),
        (Affinity::Text, WireValue::Null) => Value::String(None),
        (Affinity::Text, WireValue::Text { value }) => Value::String(Some(Box::new(value.clone()))),
        (Affinity::Text, WireValue::Integer { value }) => Value::String(Some(Box::new(value.clone()))),
        (Affinity::Blob, WireValue::Null) => Value::Bytes(None),
        (Affinity::Blob, WireValue::Blob { base64 }) => Value::Bytes(Some(Box::new(decode_blob(base64)?))),
        (affinity, other) => return Err(mismatch(affinity, other)),
    })
}

impl StmtResult {
    pub fn into_proxy_rows(self) -> Result<Vec<ProxyRow>, DbErr> {
        let names: Vec<String> = self
            .cols
            .iter()
            .enumerate()
            .map(|(i, c)| c.name.clone().unwrap_or_else(|| format!("column{i}")))
            .collect();
        self.rows
            .iter()
            .map(|row| {
                let mut values = BTreeMap::new();
                for ((name, col), value) in names.iter().zip(&self.cols).zip(row) {
                    values.insert(name.clone(), column_value(col.decltype.as_deref(), value)?);
                }
                Ok(ProxyRow::new(values))
            })
            .collect()
    }

    pub fn exec_result(&self) -> ProxyExecResult {
        let last_insert_id = self
            .last_insert_rowid
            .as_deref()
            .and_then(|id| id.parse::<u64>().ok())
            .unwrap_or(0);
        ProxyExecResult::new(last_insert_id, self.affected_row_count)
    }
}
