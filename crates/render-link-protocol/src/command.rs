use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named remote command with JSON parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub params: Map<String, Value>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// What a render loop does with an in-flight render when a batch arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderLoopCancel {
    /// Let the current render finish before applying the batch.
    #[default]
    Never,
    /// Cancel the current render, apply the batch, and continue.
    Cancel,
    /// Cancel the current render and restart progressive refinement from scratch.
    CancelAndRestart,
}

/// The execution context a batch runs against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateData {
    /// Generic session state, optionally scoped and primed with state commands.
    Session {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope_name: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        state_commands: Vec<Command>,
    },
    /// Execute inside a named render loop. Required for render acknowledgements.
    RenderLoop {
        render_loop_name: String,
        #[serde(default)]
        cancel: RenderLoopCancel,
        #[serde(default)]
        continue_on_error: bool,
    },
}

impl StateData {
    pub fn scoped(scope_name: impl Into<String>) -> Self {
        Self::Session {
            scope_name: Some(scope_name.into()),
            state_commands: Vec::new(),
        }
    }

    pub fn render_loop(render_loop_name: impl Into<String>) -> Self {
        Self::RenderLoop {
            render_loop_name: render_loop_name.into(),
            cancel: RenderLoopCancel::default(),
            continue_on_error: true,
        }
    }

    /// Name of the render loop this state targets, if any.
    pub fn render_loop_name(&self) -> Option<&str> {
        match self {
            Self::RenderLoop {
                render_loop_name, ..
            } => Some(render_loop_name),
            Self::Session { .. } => None,
        }
    }
}

impl Default for StateData {
    fn default() -> Self {
        Self::Session {
            scope_name: None,
            state_commands: Vec::new(),
        }
    }
}
