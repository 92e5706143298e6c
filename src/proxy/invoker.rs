//! Calls through to the real target while capturing its output.

use crate::error::{CacheError, Result};
use crate::output::OutputSink;
use crate::store::Bundle;
use crate::value::{Target, Value};

/// Calls `operation` on `target` and returns its output and value as one
/// bundle.
///
/// Nothing the call emits, including output of nested proxied calls, reaches
/// `sink`'s enclosing scope. If the call fails the captured output is
/// discarded along with the capture scope.
pub(crate) fn catch(
    target: &dyn Target,
    operation: &str,
    args: &[Value],
    sink: &mut OutputSink,
) -> Result<Bundle> {
    let mut capture = sink.capture();
    let value = target
        .call(operation, args, &mut capture)
        .map_err(CacheError::from_target)?;
    let output = capture.finish();
    Ok(Bundle { output, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DispatchTarget;

    fn target() -> DispatchTarget {
        DispatchTarget::builder()
            .operation("hello", |_, sink| {
                sink.emit("hi")?;
                Ok(Value::from(42))
            })
            .operation("broken", |_, sink| {
                sink.emit("partial")?;
                anyhow::bail!("template missing")
            })
            .build()
    }

    #[test]
    fn test_catch_bundles_output_and_value() {
        let mut sink = OutputSink::buffer();

        let bundle = catch(&target(), "hello", &[], &mut sink).unwrap();

        assert_eq!(bundle, Bundle::new("hi", 42));
        assert_eq!(sink.contents(), "", "Captured output must not leak");
    }

    #[test]
    fn test_catch_failure_discards_output() {
        let mut sink = OutputSink::buffer();

        let err = catch(&target(), "broken", &[], &mut sink).unwrap_err();

        assert!(matches!(err, CacheError::Target(_)));
        assert_eq!(err.to_string(), "template missing");
        assert_eq!(sink.contents(), "");
        assert_eq!(sink.depth(), 0);
    }

    #[test]
    fn test_catch_inside_outer_capture() {
        let mut sink = OutputSink::buffer();
        let mut outer = sink.capture();
        outer.emit("[").unwrap();

        let bundle = catch(&target(), "hello", &[], &mut outer).unwrap();
        outer.emit("]").unwrap();

        assert_eq!(bundle.output, "hi");
        assert_eq!(outer.finish(), "[]");
    }
}
