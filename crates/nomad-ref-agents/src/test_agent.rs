//! `TestAgent`: visits two destinations and reads the mailbox on the way.
//!
//!   init ──hop(destination[0], "step", ["Hello!"])──▶ step
//!   step ──hop(destination[1], "jump", ["Oi!"])────▶ jump
//!
//! Every TestAgent shares the mailbox key `K101`, so a second TestAgent
//! touring the same nodes reads what the first one left behind.

use serde::{Deserialize, Serialize};

use nomad_contracts::{
    agent::AgentHeader,
    error::{NomadError, NomadResult},
};
use nomad_core::{AgentContext, Dispatch, DispatchTable, Flow};

pub const MAILBOX_KEY: &str = "K101";
pub const INITIAL_MESSAGE: &str = "Initial message from TestAgent";
pub const MOVE_AHEAD_MESSAGE: &str = "** Dude! This is a Move Ahead message **";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestAgent {
    hop_count: usize,
    destination: Vec<String>,
}

impl TestAgent {
    pub fn hop_count(&self) -> usize {
        self.hop_count
    }

    fn destination(&self, entry_point: &str, index: usize) -> NomadResult<String> {
        self.destination.get(index).cloned().ok_or_else(|| {
            NomadError::dispatch(entry_point, format!("no destination #{} to hop to", index))
        })
    }

    fn label(ctx: &AgentContext) -> String {
        ctx.id().map_or_else(|| "unassigned".to_string(), |id| id.to_string())
    }

    fn read_messages(ctx: &AgentContext) {
        if ctx.inbox().is_empty() {
            return;
        }
        ctx.say("Reading messages from other agents:");
        for message in ctx.inbox() {
            ctx.say(format!("Message from agent {}", message));
        }
    }

    fn init(&mut self, ctx: &mut AgentContext, _args: Option<Vec<String>>) -> NomadResult<Flow> {
        let next = self.destination("init", 0)?;
        ctx.say(format!(
            "agent({}) invoked init: hop count = {}, next dest = {}",
            Self::label(ctx),
            self.hop_count,
            next
        ));
        self.hop_count += 1;
        Ok(ctx.hop(&*self, &next, "step", Some(vec!["Hello!".to_string()]))?.into())
    }

    fn step(&mut self, ctx: &mut AgentContext, args: Option<Vec<String>>) -> NomadResult<Flow> {
        let next = self.destination("step", 1)?;
        let message = first_arg(&args);
        ctx.say(format!(
            "agent({}) invoked step: hop count = {}, next dest = {}, message = {}",
            Self::label(ctx),
            self.hop_count,
            next,
            message
        ));
        Self::read_messages(ctx);

        ctx.set_outgoing_message(MOVE_AHEAD_MESSAGE);
        self.hop_count += 1;
        Ok(ctx.hop(&*self, &next, "jump", Some(vec!["Oi!".to_string()]))?.into())
    }

    fn jump(&mut self, ctx: &mut AgentContext, args: Option<Vec<String>>) -> NomadResult<Flow> {
        ctx.say(format!(
            "agent({}) invoked jump: hop count = {}, message = {}",
            Self::label(ctx),
            self.hop_count,
            first_arg(&args)
        ));
        Self::read_messages(ctx);
        Ok(Flow::Finished)
    }
}

fn first_arg(args: &Option<Vec<String>>) -> &str {
    args.as_deref().and_then(<[String]>::first).map_or("", String::as_str)
}

impl Dispatch for TestAgent {
    const CODE_IDENTITY: &'static str = "TestAgent";

    fn dispatch_table() -> DispatchTable<Self> {
        DispatchTable::new()
            .entry("init", Self::init)
            .entry("step", Self::step)
            .entry("jump", Self::jump)
    }

    fn from_injection(args: Vec<String>, header: &mut AgentHeader) -> NomadResult<Self> {
        header.mailbox_key = Some(MAILBOX_KEY.to_string());
        header.outgoing_message = Some(INITIAL_MESSAGE.to_string());
        Ok(Self { hop_count: 0, destination: args })
    }
}
