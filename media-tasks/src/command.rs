//! Command Builder - resolves profile templates into argument vectors
// Copyright 2025 Francisco F. Pinochet
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.


use crate::error::{MediaTaskError, Result};
use crate::profiles::ProfileRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Value supplied for a `{name}` placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<&Path> for ParamValue {
    fn from(value: &Path) -> Self {
        ParamValue::Text(value.to_string_lossy().into_owned())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

/// Named placeholder values
pub type Parameters = HashMap<String, ParamValue>;

/// Placeholder names supplied by the engine itself, never by the caller
pub const RESERVED_PARAMETERS: [&str; 3] = ["input", "output", "output_pattern"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMETERS.contains(&name)
}

/// True for non-empty `[A-Za-z0-9_]+`
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

enum Segment<'a> {
    Literal(String),
    Placeholder(&'a str),
}

/// Split a token into literal text and `{name}` placeholders.
///
/// `{{` and `}}` are literal braces; a `{` that does not open a valid
/// placeholder is kept as-is.
fn segments(token: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < token.len() {
        let rest = &token[i..];

        if rest.starts_with("{{") {
            literal.push('{');
            i += 2;
            continue;
        }
        if rest.starts_with("}}") {
            literal.push('}');
            i += 2;
            continue;
        }
        if rest.starts_with('{') {
            if let Some(close) = rest[1..].find('}') {
                let name = &rest[1..1 + close];
                if is_identifier(name) {
                    if !literal.is_empty() {
                        out.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    out.push(Segment::Placeholder(name));
                    i += close + 2;
                    continue;
                }
            }
        }

        match rest.chars().next() {
            Some(ch) => {
                literal.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }

    if !literal.is_empty() {
        out.push(Segment::Literal(literal));
    }
    out
}

/// Placeholder names appearing in a token, in order (duplicates kept)
pub fn placeholders(token: &str) -> Vec<&str> {
    segments(token)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Substitute every placeholder of one token, or return the first missing name
fn render_token<'a>(token: &'a str, params: &Parameters) -> std::result::Result<String, &'a str> {
    let mut rendered = String::with_capacity(token.len());
    for segment in segments(token) {
        match segment {
            Segment::Literal(text) => rendered.push_str(&text),
            Segment::Placeholder(name) => match params.get(name) {
                Some(value) => rendered.push_str(&value.to_string()),
                None => return Err(name),
            },
        }
    }
    Ok(rendered)
}

/// Resolve a template into a concrete argument vector.
///
/// Each template token yields exactly one argument, so the result can be
/// handed to a process launcher without any shell in between. Nested format
/// directives inside values (such as `%03d` in `output_pattern`) pass through
/// untouched.
pub fn resolve(profile: &str, template: &[String], params: &Parameters) -> Result<Vec<String>> {
    template
        .iter()
        .map(|token| {
            render_token(token, params).map_err(|name| MediaTaskError::MissingParameter {
                profile: profile.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

/// Builds argument vectors from the capability-filtered catalog
#[derive(Clone)]
pub struct CommandBuilder {
    registry: Arc<ProfileRegistry>,
}

impl CommandBuilder {
    pub fn new(registry: Arc<ProfileRegistry>) -> Self {
        Self { registry }
    }

    /// Look up `profile_key` and substitute `params` into its template
    pub async fn build(&self, profile_key: &str, params: &Parameters) -> Result<Vec<String>> {
        let profile = self.registry.get_profile(profile_key).await?;
        let argv = resolve(&profile.key, &profile.template, params)?;
        debug!(profile = profile_key, args = argv.len(), "Command built");
        Ok(argv)
    }
}
