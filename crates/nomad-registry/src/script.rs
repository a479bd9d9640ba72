//! Portable agent scripts: the code format carried by registered artifacts.
//!
//! A script is a JSON document naming the agent, its initial fields, and a
//! list of instructions per entry point:
//!
//! ```json
//! {
//!   "agent": "greeter",
//!   "mailbox_key": "K7",
//!   "inject_into": "route",
//!   "fields": { "visits": 0 },
//!   "entry_points": {
//!     "init": [
//!       { "op": "incr", "field": "visits" },
//!       { "op": "hop", "to": "$field.route.0", "entry": "greet", "args": ["hi"] }
//!     ],
//!     "greet": [ { "op": "say", "text": "agent({id}) says {arg0}" } ]
//!   }
//! }
//! ```
//!
//! Operands starting with `$` read `$arg.N`, `$field.NAME` or
//! `$field.NAME.N`; anything else is a literal string. Templates replace
//! `{id}`, `{host}`, `{entry}`, `{argN}`, `{NAME}` and `{NAME.N}`; unknown
//! placeholders are left untouched.
//!
//! `hop` and `fail` end an entry point, so validation only accepts them as
//! the last instruction.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nomad_contracts::{
    agent::AgentHeader,
    error::{NomadError, NomadResult},
};
use nomad_core::{AgentContext, Flow, MobileAgent};

// ── Program format ────────────────────────────────────────────────────────────

/// One step of an entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    /// Write a rendered template to the agent's console.
    Say { text: String },
    /// Store an operand in a field.
    Set { field: String, value: String },
    /// Add one to an integer field (missing counts as zero).
    Incr { field: String },
    /// Set the message left for the next agent on the destination node.
    LeaveMessage { text: String },
    /// Say every message found in the inbox on arrival.
    ShowInbox,
    /// End the entry point with a dispatch error.
    Fail { reason: String },
    /// Migrate. Operands are resolved before the hop.
    Hop {
        to: String,
        entry: String,
        #[serde(default)]
        args: Option<Vec<String>>,
    },
}

impl Instruction {
    fn is_terminal(&self) -> bool {
        matches!(self, Instruction::Hop { .. } | Instruction::Fail { .. })
    }
}

/// A parsed and validated agent script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProgram {
    pub agent: String,
    #[serde(default)]
    pub mailbox_key: Option<String>,
    #[serde(default)]
    pub outgoing_message: Option<String>,
    /// Field that receives the injection arguments as a string array.
    #[serde(default)]
    pub inject_into: Option<String>,
    #[serde(default)]
    pub fields: Map<String, Value>,
    pub entry_points: BTreeMap<String, Vec<Instruction>>,
}

impl AgentProgram {
    /// Parse `blob` as the script for artifact `name` and validate it.
    pub fn parse(name: &str, blob: &[u8]) -> NomadResult<Self> {
        let invalid = |reason: String| NomadError::InvalidArtifact {
            code_identity: name.to_string(),
            reason,
        };

        let program: AgentProgram =
            serde_json::from_slice(blob).map_err(|e| invalid(format!("not an agent script: {}", e)))?;

        if program.agent != name {
            return Err(invalid(format!(
                "script declares agent '{}' but was shipped as '{}'",
                program.agent, name
            )));
        }
        if program.entry_points.is_empty() {
            return Err(invalid("script has no entry points".to_string()));
        }
        if matches!(program.inject_into.as_deref(), Some("")) {
            return Err(invalid("inject_into names an empty field".to_string()));
        }
        for (entry, steps) in &program.entry_points {
            let last = steps.len().saturating_sub(1);
            if let Some(pos) = steps.iter().position(Instruction::is_terminal) {
                if pos != last {
                    return Err(invalid(format!(
                        "entry point '{}': instruction {} ends the entry point but is not last",
                        entry, pos
                    )));
                }
            }
        }
        Ok(program)
    }

    /// Header and initial fields of a freshly injected agent.
    pub fn instantiate(&self, args: Vec<String>) -> (AgentHeader, Value) {
        let mut header = AgentHeader::injected(self.agent.as_str());
        header.mailbox_key = self.mailbox_key.clone();
        header.outgoing_message = self.outgoing_message.clone();

        let mut fields = self.fields.clone();
        if let Some(field) = &self.inject_into {
            fields.insert(
                field.clone(),
                Value::Array(args.into_iter().map(Value::String).collect()),
            );
        }
        (header, Value::Object(fields))
    }
}

// ── Script agent ──────────────────────────────────────────────────────────────

/// An agent running registered script code.
pub struct ScriptAgent {
    program: Arc<AgentProgram>,
    fields: Map<String, Value>,
}

impl ScriptAgent {
    /// Rebuild a script agent from its JSON body.
    pub fn restore(program: Arc<AgentProgram>, body: Value) -> NomadResult<Self> {
        match body {
            Value::Object(fields) => Ok(Self { program, fields }),
            other => Err(NomadError::Reconstruction {
                reason: format!(
                    "state of script agent '{}' must be an object, got {}",
                    program.agent,
                    kind_of(&other)
                ),
            }),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    fn operand(&self, entry: &str, operand: &str, args: &[String]) -> NomadResult<Value> {
        let Some(path) = operand.strip_prefix('$') else {
            return Ok(Value::String(operand.to_string()));
        };
        let missing = || NomadError::dispatch(entry, format!("operand '{}' has no value", operand));

        let mut parts = path.split('.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("arg"), Some(index), None) => index
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .map(|s| Value::String(s.clone()))
                .ok_or_else(missing),
            (Some("field"), Some(name), index) => {
                let value = self.fields.get(name).ok_or_else(missing)?;
                match index {
                    None => Ok(value.clone()),
                    Some(i) => i
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| value.get(i))
                        .cloned()
                        .ok_or_else(missing),
                }
            }
            _ => Err(NomadError::dispatch(entry, format!("malformed operand '{}'", operand))),
        }
    }

    fn operand_text(&self, entry: &str, operand: &str, args: &[String]) -> NomadResult<String> {
        self.operand(entry, operand, args).map(|v| display(&v))
    }

    fn render(&self, template: &str, ctx: &AgentContext, args: &[String]) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let key = &after[..close];
            match self.placeholder(key, ctx, args) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(key);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        out.push_str(rest);
        out
    }

    fn placeholder(&self, key: &str, ctx: &AgentContext, args: &[String]) -> Option<String> {
        match key {
            "id" => Some(ctx.id().map_or_else(|| "unassigned".to_string(), |id| id.to_string())),
            "host" => Some(ctx.host_name().to_string()),
            "entry" => Some(ctx.entry_point().to_string()),
            _ => {
                if let Some(index) = key.strip_prefix("arg") {
                    if let Ok(i) = index.parse::<usize>() {
                        return args.get(i).cloned();
                    }
                }
                let (name, index) = match key.split_once('.') {
                    Some((name, index)) => (name, Some(index)),
                    None => (key, None),
                };
                let value = self.fields.get(name)?;
                match index {
                    None => Some(display(value)),
                    Some(i) => value.get(i.parse::<usize>().ok()?).map(display),
                }
            }
        }
    }
}

impl MobileAgent for ScriptAgent {
    fn code_identity(&self) -> &str {
        &self.program.agent
    }

    fn has_entry_point(&self, entry_point: &str) -> bool {
        self.program.entry_points.contains_key(entry_point)
    }

    fn invoke(
        &mut self,
        entry_point: &str,
        args: Option<Vec<String>>,
        ctx: &mut AgentContext,
    ) -> NomadResult<Flow> {
        let program = Arc::clone(&self.program);
        let steps = program.entry_points.get(entry_point).ok_or_else(|| {
            NomadError::dispatch(entry_point, format!("'{}' has no such entry point", program.agent))
        })?;
        let args = args.unwrap_or_default();

        for step in steps {
            match step {
                Instruction::Say { text } => ctx.say(self.render(text, ctx, &args)),
                Instruction::Set { field, value } => {
                    let value = self.operand(entry_point, value, &args)?;
                    self.fields.insert(field.clone(), value);
                }
                Instruction::Incr { field } => {
                    let current = match self.fields.get(field) {
                        None | Some(Value::Null) => 0,
                        Some(v) => v.as_i64().ok_or_else(|| {
                            NomadError::dispatch(
                                entry_point,
                                format!("field '{}' is not an integer", field),
                            )
                        })?,
                    };
                    self.fields.insert(field.clone(), Value::from(current + 1));
                }
                Instruction::LeaveMessage { text } => {
                    let message = self.render(text, ctx, &args);
                    ctx.set_outgoing_message(message);
                }
                Instruction::ShowInbox => {
                    for message in ctx.inbox() {
                        ctx.say(format!("Message from agent {}", message));
                    }
                }
                Instruction::Fail { reason } => {
                    return Err(NomadError::dispatch(entry_point, self.render(reason, ctx, &args)));
                }
                Instruction::Hop { to, entry, args: hop_args } => {
                    let destination = self.operand_text(entry_point, to, &args)?;
                    let hop_args = hop_args
                        .as_ref()
                        .map(|list| {
                            list.iter()
                                .map(|o| self.operand_text(entry_point, o, &args))
                                .collect::<NomadResult<Vec<_>>>()
                        })
                        .transpose()?;
                    return Ok(ctx.hop(&self.fields, &destination, entry, hop_args)?.into());
                }
            }
        }
        Ok(Flow::Finished)
    }

    fn snapshot(&self) -> NomadResult<Value> {
        Ok(Value::Object(self.fields.clone()))
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
