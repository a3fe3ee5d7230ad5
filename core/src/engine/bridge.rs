//! Bridge engine — drives an external microsimulation process over a
//! newline-delimited JSON protocol on its stdin/stdout.
//!
//! PROTOCOL (one JSON object per line, one response per request):
//!   -> {"op":"open","dataset":null}
//!   <- {"ok":true}
//!   -> {"op":"calculate","variable":"gov_balance","year":2026}
//!   <- {"values":[...]}
//!   -> {"op":"set_input","variable":"employment_income","year":2026,"values":[...]}
//!   <- {"ok":true}
//!   -> {"op":"quit"}
//!
//! Any request may be answered with {"error":"..."}; the message is handed
//! back to the caller untouched as `CapError::Engine`.
//!
//! RULE: one process per simulation. Baseline and reformed runs never
//! share engine state.

use crate::{
    error::{CapError, CapResult},
    simulation::{Microsimulation, SimulationBackend, Variable},
    types::Year,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest<'a> {
    Open {
        dataset: Option<&'a str>,
    },
    Calculate {
        variable: Variable,
        year:     Year,
    },
    SetInput {
        variable: Variable,
        year:     Year,
        values:   &'a [f64],
    },
    Quit,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Error { error: String },
    Values { values: Vec<f64> },
    Ack { ok: bool },
}

/// Request/response client over any line-oriented stream pair.
pub struct BridgeClient<R, W> {
    reader: R,
    writer: W,
    line:   String,
}

impl<R: BufRead, W: Write> BridgeClient<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer, line: String::new() }
    }

    fn round_trip(&mut self, request: &BridgeRequest<'_>) -> CapResult<BridgeResponse> {
        let json = serde_json::to_string(request)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;

        self.line.clear();
        let bytes_read = self.reader.read_line(&mut self.line)?;
        if bytes_read == 0 {
            return Err(CapError::Bridge("engine closed its output stream".into()));
        }
        let response: BridgeResponse = serde_json::from_str(self.line.trim_end())
            .map_err(|e| CapError::Bridge(format!("malformed response '{}': {e}", self.line.trim_end())))?;
        match response {
            BridgeResponse::Error { error } => Err(CapError::Engine(error)),
            other => Ok(other),
        }
    }

    fn expect_ack(&mut self, request: &BridgeRequest<'_>) -> CapResult<()> {
        match self.round_trip(request)? {
            BridgeResponse::Ack { ok: true } => Ok(()),
            BridgeResponse::Ack { ok: false } => {
                Err(CapError::Bridge("engine refused the request without a message".into()))
            }
            _ => Err(CapError::Bridge("expected an acknowledgement, got values".into())),
        }
    }

    pub fn open(&mut self, dataset: Option<&str>) -> CapResult<()> {
        self.expect_ack(&BridgeRequest::Open { dataset })
    }

    pub fn calculate(&mut self, variable: Variable, year: Year) -> CapResult<Vec<f64>> {
        match self.round_trip(&BridgeRequest::Calculate { variable, year })? {
            BridgeResponse::Values { values } => Ok(values),
            _ => Err(CapError::Bridge(format!("expected values for {variable}"))),
        }
    }

    pub fn set_input(&mut self, variable: Variable, year: Year, values: &[f64]) -> CapResult<()> {
        self.expect_ack(&BridgeRequest::SetInput { variable, year, values })
    }

    /// Ask the engine to exit. No response is read.
    pub fn quit(&mut self) -> CapResult<()> {
        let json = serde_json::to_string(&BridgeRequest::Quit)?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// How to start the engine process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCommand {
    pub program: String,
    #[serde(default)]
    pub args:    Vec<String>,
    /// Dataset path passed to the engine on `open`; None uses its default.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

pub struct BridgeBackend {
    command: BridgeCommand,
}

impl BridgeBackend {
    pub fn new(command: BridgeCommand) -> Self {
        Self { command }
    }
}

impl SimulationBackend for BridgeBackend {
    fn name(&self) -> &'static str { "bridge" }

    fn simulation(&self) -> CapResult<Box<dyn Microsimulation>> {
        Ok(Box::new(BridgeSimulation::spawn(&self.command)?))
    }
}

/// One engine process and its protocol client.
pub struct BridgeSimulation {
    child:  Child,
    client: Option<BridgeClient<BufReader<ChildStdout>, ChildStdin>>,
}

impl BridgeSimulation {
    pub fn spawn(command: &BridgeCommand) -> CapResult<Self> {
        log::debug!("spawning engine: {} {:?}", command.program, command.args);
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CapError::Bridge(format!("cannot start '{}': {e}", command.program)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CapError::Bridge("engine stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CapError::Bridge("engine stdout unavailable".into()))?;

        let mut sim = Self {
            child,
            client: Some(BridgeClient::new(BufReader::new(stdout), stdin)),
        };
        let dataset = command.dataset.as_ref().map(|p| p.to_string_lossy().into_owned());
        if let Err(e) = sim.client()?.open(dataset.as_deref()) {
            // The engine never acknowledged, so it may not honour `quit`.
            sim.terminate();
            return Err(e);
        }
        Ok(sim)
    }

    /// Kill the engine and reap it. Drop then finds nothing left to do.
    fn terminate(&mut self) {
        self.client = None;
        if let Err(e) = self.child.kill() {
            log::warn!("engine kill failed: {e}");
        }
        if let Err(e) = self.child.wait() {
            log::warn!("engine process wait failed: {e}");
        }
    }

    fn client(&mut self) -> CapResult<&mut BridgeClient<BufReader<ChildStdout>, ChildStdin>> {
        self.client
            .as_mut()
            .ok_or_else(|| CapError::Bridge("engine connection already closed".into()))
    }
}

impl Microsimulation for BridgeSimulation {
    fn calculate(&mut self, variable: Variable, year: Year) -> CapResult<Vec<f64>> {
        self.client()?.calculate(variable, year)
    }

    fn set_input(&mut self, variable: Variable, year: Year, values: Vec<f64>) -> CapResult<()> {
        self.client()?.set_input(variable, year, &values)
    }
}

impl Drop for BridgeSimulation {
    fn drop(&mut self) {
        if let Some(mut client) = self.client.take() {
            if let Err(e) = client.quit() {
                log::warn!("engine quit failed: {e}");
            }
            // Dropping the client closes stdin so the engine sees EOF.
        }
        if let Err(e) = self.child.wait() {
            log::warn!("engine process wait failed: {e}");
        }
    }
}
