//! Response definitions
//!
//! The decoded `data` section of a reply.

use super::message::{DATA_CTRL, DATA_TYPE};
use super::{Map, TypedValue};
use crate::error::{Result, RndcError};

pub const RESULT: &str = "result";
pub const TEXT: &str = "text";
pub const ERR: &str = "err";

/// A reply from the nameserver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Result code (0 = success)
    pub result: u32,

    /// Human-readable output
    pub text: Option<String>,

    /// Error message
    pub err: Option<String>,

    /// Any other data fields, in received order
    pub fields: Map,
}

impl Response {
    /// Create a response with just a result code
    pub fn new(result: u32) -> Self {
        Self {
            result,
            text: None,
            err: None,
            fields: Map::new(),
        }
    }

    /// Set the text field
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the err field
    pub fn with_err(mut self, err: impl Into<String>) -> Self {
        self.err = Some(err.into());
        self
    }

    /// True when the server reported success and no error text
    pub fn is_success(&self) -> bool {
        self.result == 0 && self.err.is_none()
    }

    /// Parse from a verified `data` section
    ///
    /// `type` and `_ctrl` are protocol bookkeeping and are dropped.
    pub fn from_data(data: &Map) -> Result<Self> {
        let result = match data.get(RESULT) {
            Some(TypedValue::Integer(n)) => *n,
            // Some servers send the code as decimal text
            Some(TypedValue::Binary(b)) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .ok_or_else(|| {
                    RndcError::MalformedData(format!(
                        "result code {:?} is not a number",
                        String::from_utf8_lossy(b)
                    ))
                })?,
            Some(TypedValue::Map(_)) => {
                return Err(RndcError::MalformedData("result code is a mapping".to_string()));
            }
            None => return Err(RndcError::MalformedData("response has no result code".to_string())),
        };

        let mut response = Response::new(result);
        for (key, value) in data.iter() {
            match key {
                RESULT | DATA_TYPE | DATA_CTRL => {}
                TEXT => response.text = Some(text_field(key, value)?),
                ERR => response.err = Some(text_field(key, value)?),
                _ => {
                    response.fields.insert(key, value.clone());
                }
            }
        }

        Ok(response)
    }

    /// Convert back to a `data` section (without `type`/`_ctrl`)
    pub fn to_data(&self) -> Map {
        let mut data = Map::new().with(RESULT, self.result);
        if let Some(text) = &self.text {
            data.insert(TEXT, text.as_str());
        }
        if let Some(err) = &self.err {
            data.insert(ERR, err.as_str());
        }
        for (key, value) in self.fields.iter() {
            data.insert(key, value.clone());
        }
        data
    }
}

fn text_field(key: &str, value: &TypedValue) -> Result<String> {
    value
        .as_binary()
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .ok_or_else(|| RndcError::MalformedData(format!("response field {:?} is not a string", key)))
}
