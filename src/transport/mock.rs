//! A scripted [`Transport`] for exercising the boot protocol without a device.

use std::collections::VecDeque;
use std::io;

use super::Transport;

/// Plays back a fixed sequence of line reads and records everything written.
///
/// An empty entry in the script stands for a read that timed out. Once the
/// script is exhausted every further read times out as well.
#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    script: VecDeque<Vec<u8>>,
    /// Every `write_all` call, in order.
    pub writes: Vec<Vec<u8>>,
    pub flushes: usize,
    /// Number of `read_line` calls, timeouts included.
    pub reads: usize,
    /// Fail the n-th `write_all` call (0 based) with a broken pipe.
    pub fail_write_at: Option<usize>,
}

impl MockTransport {
    pub fn with_script<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[u8]>,
    {
        MockTransport {
            script: lines.into_iter().map(|l| l.as_ref().to_vec()).collect(),
            ..Default::default()
        }
    }

    /// Everything written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// How many times `needle` appears in the concatenated output.
    pub fn count(&self, needle: &[u8]) -> usize {
        self.written().windows(needle.len()).filter(|w| *w == needle).count()
    }

    /// Script lines not consumed yet.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_write_at == Some(self.writes.len()) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.reads += 1;
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
