//! ONNX Runtime session wrapper.
//!
//! [`OrtInfer`] owns one or more sessions for a single exported graph and runs
//! named inputs through them. Sessions are guarded by a mutex each and picked
//! round-robin, so a shared `OrtInfer` can serve concurrent requests while every
//! individual session only ever executes one call at a time.

mod ort_infer_config;
mod tensor;

pub use tensor::{OrtOutputs, bool_input, f32_input, f32_view, i64_input};

use crate::core::config::OrtSessionConfig;
use crate::core::errors::OCRError;
use ort::session::{Session, SessionInputValue, SessionInputs};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Named inputs for a single graph invocation.
///
/// Values may borrow caller-owned buffers for `'v`.
pub type NamedInputs<'v> = Vec<(Cow<'static, str>, SessionInputValue<'v>)>;

/// Inference engine for one ONNX graph.
pub struct OrtInfer {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    model_path: PathBuf,
    model_name: String,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl std::fmt::Debug for OrtInfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtInfer")
            .field("model_name", &self.model_name)
            .field("model_path", &self.model_path)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl OrtInfer {
    /// Loads a graph with the given session options.
    ///
    /// `session_pool_size` sessions are created for the same file; values below
    /// one are treated as one.
    pub fn from_config(
        config: &OrtSessionConfig,
        model_path: impl AsRef<Path>,
        session_pool_size: usize,
        model_name: &str,
    ) -> Result<Self, OCRError> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(OCRError::missing_model(model_path));
        }

        let pool_size = session_pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(Mutex::new(load_session(model_path, config)?));
        }

        let (input_names, output_names) = {
            let first = sessions[0].lock().map_err(|_| OCRError::InvalidInput {
                message: format!("Model '{}': session lock poisoned", model_name),
            })?;
            (
                first
                    .inputs()
                    .iter()
                    .map(|i| i.name().to_string())
                    .collect::<Vec<_>>(),
                first
                    .outputs()
                    .iter()
                    .map(|o| o.name().to_string())
                    .collect::<Vec<_>>(),
            )
        };

        tracing::debug!(
            model = model_name,
            path = %model_path.display(),
            inputs = input_names.len(),
            outputs = output_names.len(),
            pool_size,
            "ONNX session loaded"
        );

        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            model_path: model_path.to_path_buf(),
            model_name: model_name.to_string(),
            input_names,
            output_names,
        })
    }

    /// Returns the model name associated with this inference engine.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Input names declared by the graph, in declaration order.
    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    /// Output names declared by the graph, in declaration order.
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    /// Runs the graph and copies every f32 output out of the session.
    ///
    /// `input_shape` is the shape of the primary input, recorded in errors.
    pub fn run(
        &self,
        inputs: NamedInputs<'_>,
        input_shape: &[usize],
        context: &str,
    ) -> Result<OrtOutputs, OCRError> {
        self.run_selected(inputs, input_shape, context, |_| true)
    }

    /// Runs the graph and copies out only the outputs `keep` accepts.
    ///
    /// Skipped outputs are never read, so their shapes and contents are not
    /// checked.
    pub fn run_selected<F>(
        &self,
        inputs: NamedInputs<'_>,
        input_shape: &[usize],
        context: &str,
        keep: F,
    ) -> Result<OrtOutputs, OCRError>
    where
        F: Fn(&str) -> bool,
    {
        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session_guard = self.sessions[idx]
            .lock()
            .map_err(|_| OCRError::InvalidInput {
                message: format!(
                    "Model '{}': Failed to acquire session lock for session {}/{}",
                    self.model_name,
                    idx,
                    self.sessions.len()
                ),
            })?;

        let outputs = session_guard
            .run(SessionInputs::<'_, '_, 0>::ValueMap(inputs))
            .map_err(|e| {
                OCRError::model_inference(
                    &self.model_name,
                    "forward_pass",
                    input_shape,
                    context,
                    e,
                )
            })?;

        let selected: Vec<&str> = self
            .output_names
            .iter()
            .map(String::as_str)
            .filter(|name| keep(name))
            .collect();
        OrtOutputs::extract(&self.model_name, &selected, &outputs, input_shape)
    }
}

/// Creates a session for `path` with `config` applied.
pub fn load_session(path: &Path, config: &OrtSessionConfig) -> Result<Session, OCRError> {
    let builder = Session::builder()?;
    let builder = OrtInfer::apply_ort_config(builder, config)?;
    builder
        .commit_from_file(path)
        .map_err(|e| OCRError::ModelLoad {
            model_path: path.display().to_string(),
            reason: "ONNX Runtime rejected the graph".to_string(),
            suggestion: "; check that the file is a complete ONNX export".to_string(),
            source: Some(Box::new(e)),
        })
}
