//! Script evaluation in a fresh, allow-list environment.
//!
//! Every run gets its own Lua state. The chunk's environment is a new table
//! filled only from the caller's [`Bindings`]; the state's own globals
//! (`os`, `io`, `require`, `load`, timers, the global table) are never
//! exposed. An instruction-count hook aborts runaway scripts.

use crate::bindings::{Binding, Bindings, HostFn, PRELUDE};
use crate::error::{SandboxError, SandboxResult};
use mlua::{
    DeserializeOptions, HookTriggers, Lua, LuaSerdeExt, MultiValue, SerializeOptions, Table,
    Value as LuaValue,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default instruction budget per run.
pub const DEFAULT_MAX_INSTRUCTIONS: u32 = 1_000_000;

/// Default cap on captured `print` output.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 32_768;

/// Default memory cap per run (16 MB).
pub const DEFAULT_MAX_MEMORY: usize = 16 * 1024 * 1024;

/// Resource limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxLimits {
    pub max_instructions: u32,
    pub max_output_bytes: usize,
    pub max_memory: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_memory: DEFAULT_MAX_MEMORY,
        }
    }
}

/// Completion value plus whatever the script printed.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutput {
    pub value: Value,
    pub output: Vec<String>,
}

#[derive(Default)]
struct OutputBuffer {
    lines: Vec<String>,
    size: usize,
}

/// Evaluates scripts against explicit bindings.
#[derive(Debug, Clone, Default)]
pub struct EvalSandbox {
    limits: SandboxLimits,
}

impl EvalSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> SandboxLimits {
        self.limits
    }

    /// Runs `code` as a script body and returns its completion value.
    pub fn run(&self, code: &str, bindings: &Bindings) -> SandboxResult<Value> {
        self.run_captured(code, bindings).map(|out| out.value)
    }

    /// Like [`run`](Self::run), also returning captured `print` output.
    pub fn run_captured(&self, code: &str, bindings: &Bindings) -> SandboxResult<EvalOutput> {
        let lua = Lua::new();
        lua.set_memory_limit(self.limits.max_memory)
            .map_err(|e| SandboxError::from_lua(&e))?;

        let output = Arc::new(Mutex::new(OutputBuffer::default()));
        let env = self
            .build_env(&lua, bindings, Arc::clone(&output))
            .map_err(|e| SandboxError::from_lua(&e))?;

        let chunk = lua.load(code).set_name("=script").set_environment(env);

        let limit = self.limits.max_instructions;
        let exceeded = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exceeded);
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(limit),
            move |lua, _debug| {
                // From here on every instruction raises, so `pcall` cannot
                // swallow the error and keep going.
                flag.store(true, Ordering::Relaxed);
                lua.set_hook(
                    HookTriggers::new().every_nth_instruction(1),
                    move |_lua, _debug| Err(budget_exceeded(limit)),
                );
                Err(budget_exceeded(limit))
            },
        );
        let result: mlua::Result<LuaValue> = chunk.eval();
        lua.remove_hook();

        if exceeded.load(Ordering::Relaxed) {
            debug!("Script exceeded {} instructions", limit);
            return Err(SandboxError::Eval(budget_message(limit)));
        }
        let value = result.map_err(|e| {
            let err = SandboxError::from_lua(&e);
            debug!("Script failed: {}", err);
            err
        })?;
        let value = from_lua(&lua, value).map_err(|e| SandboxError::from_lua(&e))?;

        let output = std::mem::take(
            &mut output
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .lines,
        );
        Ok(EvalOutput { value, output })
    }

    fn build_env(
        &self,
        lua: &Lua,
        bindings: &Bindings,
        output: Arc<Mutex<OutputBuffer>>,
    ) -> mlua::Result<Table> {
        let env = lua.create_table()?;

        if bindings.prelude() {
            let globals = lua.globals();
            for name in PRELUDE {
                let value: LuaValue = globals.get(*name)?;
                if !value.is_nil() {
                    env.set(*name, value)?;
                }
            }
        }

        if bindings.print() {
            let max = self.limits.max_output_bytes;
            let print = lua.create_function(move |_, args: MultiValue| {
                let line = args.iter().map(display).collect::<Vec<_>>().join("\t");
                let mut buf = output.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                buf.size += line.len() + 1;
                if buf.size <= max {
                    buf.lines.push(line);
                }
                Ok(())
            })?;
            env.set("print", print)?;
        }

        // Explicit bindings win over prelude names.
        for (name, binding) in bindings.iter() {
            match binding {
                Binding::Value(value) => env.set(name.as_str(), to_lua(lua, value)?)?,
                Binding::Function(f) => env.set(name.as_str(), host_function(lua, Arc::clone(f))?)?,
            }
        }

        Ok(env)
    }
}

fn budget_message(limit: u32) -> String {
    format!("instruction limit exceeded ({limit})")
}

fn budget_exceeded(limit: u32) -> mlua::Error {
    mlua::Error::RuntimeError(budget_message(limit))
}

fn host_function(lua: &Lua, f: HostFn) -> mlua::Result<mlua::Function> {
    lua.create_function(move |lua, args: MultiValue| {
        let args = args
            .into_iter()
            .map(|arg| from_lua(lua, arg))
            .collect::<mlua::Result<Vec<_>>>()?;
        let result = f(args).map_err(mlua::Error::RuntimeError)?;
        to_lua(lua, &result)
    })
}

fn to_lua(lua: &Lua, value: &Value) -> mlua::Result<LuaValue> {
    lua.to_value_with(
        value,
        SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false),
    )
}

fn from_lua(lua: &Lua, value: LuaValue) -> mlua::Result<Value> {
    lua.from_value_with(
        value,
        DeserializeOptions::new()
            .deny_unsupported_types(false)
            .deny_recursive_tables(false),
    )
}

fn display(value: &LuaValue) -> String {
    match value {
        LuaValue::Nil => "nil".to_string(),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Integer(i) => i.to_string(),
        LuaValue::Number(n) => n.to_string(),
        LuaValue::String(s) => s.to_string_lossy().to_string(),
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_scalars() {
        let lua = Lua::new();
        let s = LuaValue::String(lua.create_string("hi").unwrap());
        assert_eq!(display(&s), "hi");
        assert_eq!(display(&LuaValue::Integer(3)), "3");
        assert_eq!(display(&LuaValue::Boolean(false)), "false");
        assert_eq!(display(&LuaValue::Nil), "nil");
    }

    #[test]
    fn json_null_binds_as_nil() {
        let lua = Lua::new();
        assert!(to_lua(&lua, &Value::Null).unwrap().is_nil());
    }
}
