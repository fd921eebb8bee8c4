//! While the step progress bar is drawn, a log line written over it would leave the tail of the
//! bar on screen. The encoder here erases the line first.

use log::Record;
use log4rs::encode::{Encode, Write};

// Erase the whole line, then carriage return.
const CLEAR_LINE: &[u8] = b"\x1B[2K\r";

#[derive(Debug)]
pub(in crate::log) struct LineClearingEncoder {
    inner: Box<dyn Encode>,
}

impl LineClearingEncoder {
    pub(in crate::log) fn new(inner: Box<dyn Encode>) -> Self {
        Self { inner }
    }
}

impl Encode for LineClearingEncoder {
    fn encode(&self, w: &mut dyn Write, record: &Record) -> anyhow::Result<()> {
        w.write_all(CLEAR_LINE)?;
        self.inner.encode(w, record)
    }
}
