// Copyright (c) 2026 Mirror Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Sync engine invocation.
//!
//! The engine is an opaque JVM program. The orchestrator only decides its
//! command line: fixed resource limits, the entry point, the client role, the
//! local data port and the two sides of the sync.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable used to launch the engine
    #[serde(default = "default_program")]
    pub program: String,

    /// Resource/diagnostic flags placed before the classpath
    #[serde(default = "default_jvm_args")]
    pub jvm_args: Vec<String>,

    #[serde(default = "default_classpath")]
    pub classpath: String,

    #[serde(default = "default_main_class")]
    pub main_class: String,

    /// Connection role marker passed to the engine
    #[serde(default = "default_role")]
    pub role: String,

    /// Host the engine dials; the data channel is always forwarded locally
    #[serde(default = "default_host")]
    pub host: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            jvm_args: default_jvm_args(),
            classpath: default_classpath(),
            main_class: default_main_class(),
            role: default_role(),
            host: default_host(),
        }
    }
}

impl EngineConfig {
    /// Build the full command line for one session.
    pub fn invocation(&self, port: u16, local_path: &str, remote_path: &str) -> EngineInvocation {
        let mut args = self.jvm_args.clone();
        args.extend([
            "-cp".to_string(),
            self.classpath.clone(),
            self.main_class.clone(),
            self.role.clone(),
            "-h".to_string(),
            self.host.clone(),
            "-p".to_string(),
            port.to_string(),
            "-l".to_string(),
            local_path.to_string(),
            "-r".to_string(),
            remote_path.to_string(),
        ]);

        EngineInvocation {
            program: self.program.clone(),
            args,
        }
    }
}

/// A resolved engine command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl fmt::Display for EngineInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn default_program() -> String {
    "java".to_string()
}

fn default_jvm_args() -> Vec<String> {
    vec!["-Xmx2G".to_string(), "-XX:+HeapDumpOnOutOfMemoryError".to_string()]
}

fn default_classpath() -> String {
    "/mirror/mirror-all.jar".to_string()
}

fn default_main_class() -> String {
    "mirror.Mirror".to_string()
}

fn default_role() -> String {
    "client".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}
