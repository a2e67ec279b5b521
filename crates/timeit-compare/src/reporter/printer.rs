//! Printers producing human-readable output.

use std::{
    fmt, io, ops,
    sync::{Arc, Mutex},
};

use anes::{Attribute, Color, ResetAttributes, SetAttribute, SetBackgroundColor, SetForegroundColor};

use super::{progress_bar, Logger, Progress, ProgressSink};

/// Length of the progress bar in chars.
const PROGRESS_BAR_LENGTH: usize = 12;

#[derive(Debug)]
struct Styled<'a, W: io::Write>(&'a mut LinePrinter<W>);

impl<W: io::Write> ops::Deref for Styled<'_, W> {
    type Target = LinePrinter<W>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<W: io::Write> ops::DerefMut for Styled<'_, W> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<W: io::Write> Drop for Styled<'_, W> {
    fn drop(&mut self) {
        if self.0.style_nesting > 0 {
            self.0.style_nesting -= 1;
            if self.0.style_nesting == 0 {
                self.0.print(format_args!("{ResetAttributes}"));
            }
        }
    }
}

#[derive(Debug)]
struct LinePrinter<W> {
    inner: W,
    styling: bool,
    style_nesting: usize,
}

impl<W: io::Write> LinePrinter<W> {
    fn borrow(&mut self) -> Styled<'_, W> {
        if self.styling {
            self.style_nesting += 1;
        }
        Styled(self)
    }

    fn print(&mut self, args: fmt::Arguments<'_>) {
        self.inner
            .write_fmt(args)
            .expect("I/O error writing to stderr");
    }

    fn print_str(&mut self, s: &str) {
        self.inner
            .write_all(s.as_bytes())
            .expect("I/O error writing to stderr");
    }

    fn fg(&mut self, color: Color) -> Styled<'_, W> {
        if self.styling {
            self.print(format_args!("{}", SetForegroundColor(color)));
        }
        self.borrow()
    }

    fn bg(&mut self, color: Color) -> Styled<'_, W> {
        if self.styling {
            self.print(format_args!("{}", SetBackgroundColor(color)));
        }
        self.borrow()
    }

    fn bold(&mut self) -> Styled<'_, W> {
        if self.styling {
            self.print(format_args!("{}", SetAttribute(Attribute::Bold)));
        }
        self.borrow()
    }

    fn print_tagged(&mut self, tag: &str, color: Color, args: fmt::Arguments<'_>) {
        self.bold().bg(color).fg(Color::White).print_str(tag);
        self.print(format_args!(" {args}\n"));
    }
}

/// Verbosity of a [`PrintingLogger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Only errors are printed.
    Quiet,
    /// Errors and warnings are printed.
    #[default]
    Normal,
    /// All messages including debug info are printed.
    Verbose,
}

/// [`Logger`] printing messages to stderr, optionally with ANSI styling.
#[derive(Debug)]
pub struct PrintingLogger<W = io::Stderr> {
    verbosity: Verbosity,
    line_printer: Arc<Mutex<LinePrinter<W>>>,
}

impl<W> Clone for PrintingLogger<W> {
    fn clone(&self) -> Self {
        Self {
            verbosity: self.verbosity,
            line_printer: self.line_printer.clone(),
        }
    }
}

impl PrintingLogger {
    /// Creates a logger printing to stderr.
    pub fn new(styling: bool, verbosity: Verbosity) -> Self {
        Self::from_writer(io::stderr(), styling, verbosity)
    }
}

impl<W: io::Write> PrintingLogger<W> {
    fn from_writer(inner: W, styling: bool, verbosity: Verbosity) -> Self {
        let line_printer = LinePrinter {
            inner,
            styling,
            style_nesting: 0,
        };
        Self {
            verbosity,
            line_printer: Arc::new(Mutex::new(line_printer)),
        }
    }

    fn lock_printer(&self) -> impl ops::DerefMut<Target = LinePrinter<W>> + '_ {
        self.line_printer.lock().expect("line printer is poisoned")
    }
}

impl<W: io::Write + Send + fmt::Debug> Logger for PrintingLogger<W> {
    fn debug(&self, debug_info: &dyn fmt::Display) {
        if self.verbosity < Verbosity::Verbose {
            return;
        }
        self.lock_printer()
            .print_tagged("DEBUG:", Color::DarkMagenta, format_args!("{debug_info}"));
    }

    fn warning(&self, warning: &dyn fmt::Display) {
        if self.verbosity < Verbosity::Normal {
            return;
        }
        self.lock_printer()
            .print_tagged(" WARN:", Color::Yellow, format_args!("{warning}"));
    }

    fn error(&self, error: &dyn fmt::Display) {
        self.lock_printer()
            .print_tagged("ERROR:", Color::Red, format_args!("{error}"));
    }
}

/// [`ProgressSink`] printing a single-line progress bar, by default to stdout.
///
/// The line looks like `|██████▍     | 8/15 completed, 1/3 error`; it is rewritten in place
/// on each update.
#[derive(Debug)]
pub struct ProgressPrinter<W = io::Stdout> {
    inner: W,
}

impl ProgressPrinter {
    /// Creates a printer writing to stdout.
    pub fn stdout() -> Self {
        Self {
            inner: io::stdout(),
        }
    }
}

impl<W: io::Write> ProgressPrinter<W> {
    /// Creates a printer writing to the specified writer.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    // Progress output is best-effort; I/O errors are ignored.
    fn write(&mut self, args: fmt::Arguments<'_>) {
        self.inner.write_fmt(args).ok();
        self.inner.flush().ok();
    }

    fn write_line(&mut self, progress: Progress) {
        let bar = progress_bar(progress.fraction(), PROGRESS_BAR_LENGTH);
        let Progress {
            completed, total, ..
        } = progress;
        if progress.errors > 0 {
            let Progress { errors, timers, .. } = progress;
            self.write(format_args!(
                "\r|{bar}| {completed}/{total} completed, {errors}/{timers} error"
            ));
        } else {
            self.write(format_args!("\r|{bar}| {completed}/{total} completed"));
        }
    }
}

impl<W: io::Write + fmt::Debug> ProgressSink for ProgressPrinter<W> {
    fn start(&mut self, progress: Progress) {
        self.write(format_args!("timing now...\n"));
        self.write_line(progress);
    }

    fn update(&mut self, progress: Progress) {
        self.write_line(progress);
    }

    fn finish(&mut self, _progress: Progress) {
        self.write(format_args!("\n"));
    }
}
