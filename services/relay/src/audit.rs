//! Traffic audit log for the proxy.
//!
//! Every completed write is appended to a file as one block: a separator
//! line stamped with the local wall-clock time, then the raw bytes. Bytes
//! written towards the backend go to the request log, bytes written back to
//! the client go to the response log.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::debug;

use crate::reactor::{FlowSide, WriteHook};

const SEPARATOR: &str = "--------------------";

/// Append-only request/response logs. Either side may be disabled.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    request_log: Option<PathBuf>,
    response_log: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(request_log: Option<PathBuf>, response_log: Option<PathBuf>) -> Self {
        Self {
            request_log,
            response_log,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.request_log.is_some() || self.response_log.is_some()
    }

    fn path_for(&self, flow: FlowSide) -> Option<&Path> {
        match flow {
            FlowSide::ClientToServer => self.request_log.as_deref(),
            FlowSide::ServerToClient => self.response_log.as_deref(),
        }
    }
}

/// Format one audit block header for the current time.
fn block_header() -> String {
    format!(
        "\n{SEPARATOR}{}{SEPARATOR}--\n",
        Local::now().format("%H:%M:%S%.3f")
    )
}

fn append_block(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut block = block_header().into_bytes();
    block.extend_from_slice(bytes);
    file.write_all(&block)
}

impl WriteHook for AuditLog {
    fn on_write(&self, flow: FlowSide, bytes: &[u8]) {
        let Some(path) = self.path_for(flow) else {
            return;
        };
        if let Err(e) = append_block(path, bytes) {
            debug!(path = %path.display(), flow = %flow, error = %e, "Audit write failed");
        }
    }
}
