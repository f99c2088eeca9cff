//! Progress reporting.

/// Sink for pipeline narration and replayed job logs.
///
/// The pipeline never prints directly; the CLI binds this to stderr and
/// tests collect the lines for assertions.
pub trait Reporter {
    fn debug(&mut self, message: &str);
    fn info(&mut self, message: &str);
    fn warn(&mut self, message: &str);
    fn error(&mut self, message: &str);
}
