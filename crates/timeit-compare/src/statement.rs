//! Statements under test and the environment they execute in.

use std::{
    any::Any,
    cell::RefCell,
    collections::HashMap,
    fmt,
    hint::black_box,
    io,
    process::{Command, ExitStatus, Stdio},
    rc::Rc,
    sync::Arc,
};

/// Error executing a statement or its setup.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum ExecutionError {
    /// Invocable statement panicked.
    #[error("statement panicked: {message}")]
    Panic {
        /// Panic message.
        message: String,
    },
    /// Source statement exited with a non-zero status.
    #[error("`{program}` exited with {status}")]
    Exit {
        /// Interpreter program.
        program: String,
        /// Exit status of the interpreter.
        status: ExitStatus,
    },
    /// Interpreter could not be spawned.
    #[error("failed spawning `{program}`: {source}")]
    Spawn {
        /// Interpreter program.
        program: String,
        /// I/O error that occurred.
        #[source]
        source: Arc<io::Error>,
    },
    /// Measurements for the statement were interrupted by the user before they were complete.
    #[error("interrupted by user")]
    Interrupted,
}

impl ExecutionError {
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(&message) = payload.downcast_ref::<&str>() {
            message.to_owned()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "Box<dyn Any>".to_owned()
        };
        Self::Panic { message }
    }

    /// Returns a short marker for this error used in the report table.
    pub fn marker(&self) -> String {
        match self {
            Self::Panic { .. } => "Panic".to_owned(),
            Self::Exit { status, .. } => match status.code() {
                Some(code) => format!("Exit({code})"),
                None => "Killed".to_owned(),
            },
            Self::Spawn { .. } => "Spawn".to_owned(),
            Self::Interrupted => "Interrupted".to_owned(),
        }
    }
}

/// Key–value environment in which a statement and its setup execute.
///
/// Values may have arbitrary types; string values are additionally exported as environment variables
/// by [`ShellInterpreter`].
#[derive(Default)]
pub struct Namespace {
    vars: HashMap<String, Box<dyn Any>>,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.vars.keys().collect();
        names.sort_unstable();
        formatter
            .debug_struct("Namespace")
            .field("vars", &names)
            .finish()
    }
}

/// Namespace that may be explicitly shared among several timers.
pub type SharedNamespace = Rc<RefCell<Namespace>>;

impl Namespace {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps this namespace so that it can be shared among timers.
    pub fn into_shared(self) -> SharedNamespace {
        Rc::new(RefCell::new(self))
    }

    /// Inserts a value into the namespace, replacing the previous value with the same name.
    pub fn insert<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.vars.insert(name.into(), Box::new(value));
    }

    /// Inserts a string variable. Such variables are exported to source statements
    /// executed by a [`ShellInterpreter`].
    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.insert(name, value.into());
    }

    /// Gets a reference to a value. Returns `None` if the value is missing or has another type.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.vars.get(name)?.downcast_ref()
    }

    /// Gets a mutable reference to a value. Returns `None` if the value is missing or has another type.
    pub fn get_mut<T: Any>(&mut self, name: &str) -> Option<&mut T> {
        self.vars.get_mut(name)?.downcast_mut()
    }

    /// Removes a value from the namespace. Returns `true` if the value was present.
    pub fn remove(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    /// Checks whether the namespace contains a value with the specified name.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns the number of values in the namespace.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Checks whether the namespace is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates over string variables in the namespace.
    pub fn string_vars(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.vars.iter().filter_map(|(name, value)| {
            let value = value.downcast_ref::<String>()?;
            Some((name.as_str(), value.as_str()))
        })
    }
}

/// Executes source statements.
pub trait Interpreter: fmt::Debug {
    /// Executes a single source statement in the provided namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement failed; the timer for the statement will be excluded
    /// from the remaining trials.
    fn execute(&mut self, code: &str, namespace: &mut Namespace) -> Result<(), ExecutionError>;
}

/// [`Interpreter`] spawning a shell for each source statement. String variables from the namespace
/// are exported as environment variables; the standard streams of the shell are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellInterpreter {
    program: String,
    args: Vec<String>,
}

/// Uses `sh -c` (or `cmd /C` on Windows).
impl Default for ShellInterpreter {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", ["/C"])
        } else {
            Self::new("sh", ["-c"])
        }
    }
}

impl ShellInterpreter {
    /// Creates an interpreter with the specified program and args preceding the statement code.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a whitespace-separated command, such as `bash -c`. Returns `None` if the command
    /// is empty.
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    /// Returns the interpreter program.
    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Interpreter for ShellInterpreter {
    fn execute(&mut self, code: &str, namespace: &mut Namespace) -> Result<(), ExecutionError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(code)
            .envs(namespace.string_vars())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| ExecutionError::Spawn {
                program: self.program.clone(),
                source: Arc::new(err),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ExecutionError::Exit {
                program: self.program.clone(),
                status,
            })
        }
    }
}

type InvocableFn = Rc<RefCell<dyn FnMut(&mut Namespace)>>;

/// Unit of code under measurement.
///
/// Cloning an invocable statement shares the underlying function among the clones.
#[derive(Clone)]
pub enum Statement {
    /// Source code executed by an [`Interpreter`].
    Source {
        /// Code of the statement.
        code: String,
        /// Label used instead of the code in reports.
        label: Option<String>,
    },
    /// Function invoked directly.
    Invocable {
        /// Function to invoke.
        func: InvocableFn,
        /// Name of the function.
        name: String,
    },
}

impl fmt::Debug for Statement {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source { code, label } => formatter
                .debug_struct("Source")
                .field("code", code)
                .field("label", label)
                .finish(),
            Self::Invocable { name, .. } => formatter
                .debug_struct("Invocable")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

impl From<&str> for Statement {
    fn from(code: &str) -> Self {
        Self::source(code)
    }
}

impl From<String> for Statement {
    fn from(code: String) -> Self {
        Self::source(code)
    }
}

impl Statement {
    /// Creates a source statement.
    pub fn source(code: impl Into<String>) -> Self {
        Self::Source {
            code: code.into(),
            label: None,
        }
    }

    /// Creates an invocable statement with access to the timer namespace. The output of the function
    /// is passed through [`black_box`].
    pub fn invocable<T>(
        name: impl Into<String>,
        mut func: impl FnMut(&mut Namespace) -> T + 'static,
    ) -> Self {
        Self::Invocable {
            func: Rc::new(RefCell::new(move |namespace: &mut Namespace| {
                black_box(func(namespace));
            })),
            name: name.into(),
        }
    }

    /// Creates an invocable statement that doesn't use the namespace.
    pub fn from_fn<T>(name: impl Into<String>, mut func: impl FnMut() -> T + 'static) -> Self {
        Self::invocable(name, move |_| func())
    }

    /// Sets a label for a source statement. For invocable statements, replaces the name.
    #[must_use]
    pub fn with_label(mut self, new_label: impl Into<String>) -> Self {
        match &mut self {
            Self::Source { label, .. } => *label = Some(new_label.into()),
            Self::Invocable { name, .. } => *name = new_label.into(),
        }
        self
    }

    /// Returns the label for this statement used in reports.
    pub fn label(&self) -> String {
        match self {
            Self::Source {
                label: Some(label), ..
            } => label.clone(),
            Self::Source { code, label: None } => code
                .chars()
                .map(|ch| match ch {
                    '"' | '\'' => ch.to_string(),
                    _ => ch.escape_debug().to_string(),
                })
                .collect(),
            Self::Invocable { name, .. } => format!("{name}()"),
        }
    }

    /// Executes the statement once. Panics in invocable statements are propagated; they are caught
    /// by the caller for the entire timed call.
    pub(crate) fn execute(
        &mut self,
        namespace: &mut Namespace,
        interpreter: &mut dyn Interpreter,
    ) -> Result<(), ExecutionError> {
        match self {
            Self::Source { code, .. } => interpreter.execute(code, namespace),
            Self::Invocable { func, .. } => {
                let mut func = func.borrow_mut();
                (*func)(namespace);
                Ok(())
            }
        }
    }
}
