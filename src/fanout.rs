// src/fanout.rs

//! Byte sink that replicates every call to an ordered list of sinks.
//!
//! During launch the child's stdout and stderr are each wired through one
//! [`FanOutWriter`], so the control directory's `log` file sees everything
//! while the `output` file (capture mode) gets its own copy.
//!
//! There is no cross-sink atomicity: if sink 0 accepted a chunk and sink 1
//! failed, the two are left inconsistent.

use std::fmt;
use std::io::{self, Write};

use crate::errors::DurableTaskError;
use crate::types::FanOutPolicy;

/// Replicates `write`, `flush` and `close` across sinks in list order.
pub struct FanOutWriter {
    sinks: Vec<Box<dyn Write + Send>>,
    policy: FanOutPolicy,
}

impl fmt::Debug for FanOutWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOutWriter")
            .field("sinks", &self.sinks.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl FanOutWriter {
    pub fn new(sinks: Vec<Box<dyn Write + Send>>, policy: FanOutPolicy) -> Self {
        Self { sinks, policy }
    }

    pub fn policy(&self) -> FanOutPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Write the whole buffer to every sink.
    pub fn write_chunk(&mut self, buf: &[u8]) -> Result<(), DurableTaskError> {
        self.apply(|sink| sink.write_all(buf))
    }

    pub fn flush_all(&mut self) -> Result<(), DurableTaskError> {
        self.apply(|sink| sink.flush())
    }

    /// Flush every sink, then drop them all. Later writes are no-ops.
    ///
    /// Sinks are dropped even when a flush failed.
    pub fn close(&mut self) -> Result<(), DurableTaskError> {
        let res = self.flush_all();
        self.sinks.clear();
        res
    }

    fn apply<F>(&mut self, mut op: F) -> Result<(), DurableTaskError>
    where
        F: FnMut(&mut Box<dyn Write + Send>) -> io::Result<()>,
    {
        let mut first_err = None;

        for (idx, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(source) = op(sink) {
                let err = DurableTaskError::Stream { sink: idx, source };
                match self.policy {
                    FanOutPolicy::FailFast => return Err(err),
                    FanOutPolicy::BestEffort => {
                        first_err.get_or_insert(err);
                    }
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Write for FanOutWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_chunk(buf).map_err(into_io)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_all().map_err(into_io)
    }
}

fn into_io(err: DurableTaskError) -> io::Error {
    match err {
        DurableTaskError::Stream { source, .. } => source,
        other => io::Error::other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder {
        bytes: Arc<Mutex<Vec<u8>>>,
        flushes: Arc<Mutex<usize>>,
        fail: bool,
    }

    impl Write for Recorder {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::other("sink broke"));
            }
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::other("sink broke"));
            }
            *self.flushes.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn failing() -> Recorder {
        Recorder {
            fail: true,
            ..Default::default()
        }
    }

    #[test]
    fn every_sink_sees_every_write() {
        let (a, b) = (Recorder::default(), Recorder::default());
        let mut w = FanOutWriter::new(
            vec![Box::new(a.clone()), Box::new(b.clone())],
            FanOutPolicy::FailFast,
        );

        w.write_all(b"hello ").unwrap();
        w.write_all(b"world").unwrap();
        w.flush().unwrap();

        assert_eq!(&*a.bytes.lock().unwrap(), b"hello world");
        assert_eq!(&*b.bytes.lock().unwrap(), b"hello world");
        assert_eq!(*b.flushes.lock().unwrap(), 1);
    }

    #[test]
    fn fail_fast_skips_sinks_after_the_failure() {
        let (first, last) = (Recorder::default(), Recorder::default());
        let mut w = FanOutWriter::new(
            vec![Box::new(first.clone()), Box::new(failing()), Box::new(last.clone())],
            FanOutPolicy::FailFast,
        );

        let err = w.write_chunk(b"x").unwrap_err();
        assert!(matches!(err, DurableTaskError::Stream { sink: 1, .. }));
        assert_eq!(&*first.bytes.lock().unwrap(), b"x");
        assert!(last.bytes.lock().unwrap().is_empty());
    }

    #[test]
    fn best_effort_reaches_all_sinks_and_reports_first_error() {
        let last = Recorder::default();
        let mut w = FanOutWriter::new(
            vec![Box::new(failing()), Box::new(failing()), Box::new(last.clone())],
            FanOutPolicy::BestEffort,
        );

        let err = w.write_chunk(b"x").unwrap_err();
        assert!(matches!(err, DurableTaskError::Stream { sink: 0, .. }));
        assert_eq!(&*last.bytes.lock().unwrap(), b"x");
    }

    #[test]
    fn close_flushes_then_detaches() {
        let a = Recorder::default();
        let mut w = FanOutWriter::new(vec![Box::new(a.clone())], FanOutPolicy::FailFast);

        w.write_all(b"tail").unwrap();
        w.close().unwrap();
        w.write_all(b"ignored").unwrap();

        assert!(w.is_empty());
        assert_eq!(*a.flushes.lock().unwrap(), 1);
        assert_eq!(&*a.bytes.lock().unwrap(), b"tail");
    }
}
