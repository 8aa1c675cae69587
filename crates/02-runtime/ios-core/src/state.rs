//! Save-state cursor shared by every device.
//!
//! A single `do_*` call both saves and restores a field depending on the
//! wrapper's mode, so devices describe their persisted layout exactly once.

use thiserror::Error;

/// Direction of a save-state pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateMode {
    /// Restoring fields from a previously written buffer.
    Read,
    /// Appending fields to the buffer.
    Write,
    /// Only counting how many bytes a write pass would produce.
    Measure,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("save state truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

pub struct StateWrap {
    mode: StateMode,
    buffer: Vec<u8>,
    cursor: usize,
    error: Option<StateError>,
}

impl StateWrap {
    pub fn for_write() -> Self {
        Self::with_mode(StateMode::Write, Vec::new())
    }

    pub fn for_read(buffer: Vec<u8>) -> Self {
        Self::with_mode(StateMode::Read, buffer)
    }

    pub fn for_measure() -> Self {
        Self::with_mode(StateMode::Measure, Vec::new())
    }

    fn with_mode(mode: StateMode, buffer: Vec<u8>) -> Self {
        Self {
            mode,
            buffer,
            cursor: 0,
            error: None,
        }
    }

    pub fn mode(&self) -> StateMode {
        self.mode
    }

    pub fn is_read_mode(&self) -> bool {
        self.mode == StateMode::Read
    }

    /// Saves or restores raw bytes in place.
    ///
    /// A truncated read latches an error and switches to measuring, so the
    /// remaining fields keep their current values.
    pub fn do_bytes(&mut self, data: &mut [u8]) {
        match self.mode {
            StateMode::Write => self.buffer.extend_from_slice(data),
            StateMode::Measure => {}
            StateMode::Read => {
                let available = self.buffer.len().saturating_sub(self.cursor);
                if available < data.len() {
                    log::error!(
                        "save state truncated at offset {}: wanted {} bytes",
                        self.cursor,
                        data.len()
                    );
                    self.error = Some(StateError::Truncated {
                        offset: self.cursor,
                        needed: data.len(),
                        available,
                    });
                    self.mode = StateMode::Measure;
                    return;
                }
                data.copy_from_slice(&self.buffer[self.cursor..self.cursor + data.len()]);
            }
        }
        self.cursor += data.len();
    }

    pub fn do_u32(&mut self, value: &mut u32) {
        let mut raw = value.to_be_bytes();
        self.do_bytes(&mut raw);
        *value = u32::from_be_bytes(raw);
    }

    pub fn do_u64(&mut self, value: &mut u64) {
        let mut raw = value.to_be_bytes();
        self.do_bytes(&mut raw);
        *value = u64::from_be_bytes(raw);
    }

    pub fn do_bool(&mut self, value: &mut bool) {
        let mut raw = [u8::from(*value)];
        self.do_bytes(&mut raw);
        *value = raw[0] != 0;
    }

    /// Bytes processed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Ends the pass, returning the written buffer.
    pub fn finish(self) -> Result<Vec<u8>, StateError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buffer),
        }
    }
}
