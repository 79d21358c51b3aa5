#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(rust_2018_idioms, unused_lifetimes, missing_debug_implementations)]

//! Crate for a writer that prefixes every line with a formatted
//! timestamp. Will work even when a write contains multiple lines or
//! incomplete lines between writes.
//!
//! ```
//! use timestamp_writer::TimestampWriter;
//!
//! let mut buffer = Vec::new();
//! let mut writer = TimestampWriter::new(&mut buffer).with_time_format("-".to_owned());
//!
//! writer.write(b"first\nsec")?;
//! writer.write(b"ond")?;
//! writer.close()?;
//!
//! assert_eq!("- first\n- second\n", String::from_utf8_lossy(&buffer));
//! # Ok::<(), timestamp_writer::WriteError>(())
//! ```

use std::{
    fmt,
    io::{
        self,
        Write,
    },
};

use time::{
    format_description,
    OffsetDateTime,
    UtcOffset,
};

/// Timestamp pattern used until the owner configures another one, in
/// the syntax of [`time::format_description`].
pub const DEFAULT_TIME_FORMAT: &str =
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]";

/// Scans lines and prefixes each one with a formatted timestamp. Will
/// work even when a write contains multiple lines or incomplete lines
/// between writes: the prefix goes before the first byte of every
/// line, never before the continuation of a line started by an
/// earlier write.
#[derive(Debug)]
pub struct TimestampWriter<W: Write> {
    /// Pattern the timestamp is rendered with, in the syntax of
    /// [`time::format_description`]. Read fresh for every prefix, so
    /// changing it mid-stream affects only the lines that follow. A
    /// pattern that fails to parse is emitted literally instead.
    pub time_format: String,

    /// Offset the timestamp is rendered in. Read fresh for every
    /// prefix.
    pub time_zone: UtcOffset,

    writer: W,

    at_line_start: bool,
}

/// Returned when the destination writer fails. Carries the number of
/// bytes the destination accepted before failing, so callers keep
/// exact accounting even across a partial write; the destination's
/// error is transported unmodified as the source.
#[derive(Debug, thiserror::Error)]
#[error("write to destination failed after {written} bytes")]
pub struct WriteError {
    /// Bytes the destination accepted before the failure.
    pub written: usize,

    /// The destination's error, unmodified.
    #[source]
    pub source: io::Error,
}

/// Value accepted by the print helpers. Strings count as text, which
/// controls the separating space [`TimestampWriter::print`] inserts
/// between adjacent operands.
pub trait Operand: fmt::Display {
    /// Whether the operand renders as plain text.
    fn is_text(&self) -> bool {
        false
    }
}

impl Operand for str {
    fn is_text(&self) -> bool {
        true
    }
}

impl Operand for String {
    fn is_text(&self) -> bool {
        true
    }
}

impl<T: Operand + ?Sized> Operand for &T {
    fn is_text(&self) -> bool {
        (**self).is_text()
    }
}

macro_rules! impl_operand {
    ($($ty:ty),* $(,)?) => {
        $(impl Operand for $ty {})*
    };
}

impl_operand!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
);

impl<W: Write> TimestampWriter<W> {
    /// Create a new [`TimestampWriter`] writing prefixed lines to
    /// `writer`. Starts with [`DEFAULT_TIME_FORMAT`] and the local
    /// offset, or UTC when the local offset cannot be determined.
    pub fn new(writer: W) -> Self {
        Self {
            time_format: DEFAULT_TIME_FORMAT.to_owned(),
            time_zone: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            writer,

            at_line_start: true,
        }
    }

    /// Set a new timestamp pattern for [`TimestampWriter`].
    #[must_use]
    pub fn with_time_format(self, time_format: String) -> Self {
        Self {
            time_format,
            ..self
        }
    }

    /// Set a new timestamp offset for [`TimestampWriter`].
    #[must_use]
    pub fn with_time_zone(self, time_zone: UtcOffset) -> Self {
        Self {
            time_zone,
            ..self
        }
    }

    /// Write `buf` to the destination, inserting a timestamp prefix
    /// before every byte that starts a line. Returns the number of
    /// bytes the destination accepted, inserted prefix bytes included.
    /// Writing an empty buffer does nothing.
    ///
    /// # Errors
    ///
    /// Stops at the first destination error without attempting the
    /// remaining lines. The returned [`WriteError`] carries the byte
    /// count accepted up to that point.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, WriteError> {
        let mut written = 0;

        for segment in buf.split_inclusive(|byte| *byte == b'\n') {
            if self.at_line_start {
                let prefix = format!("{} ", self.prefix());
                self.emit(prefix.as_bytes(), &mut written)?;
            }

            self.emit(segment, &mut written)?;
        }

        Ok(written)
    }

    /// Format `operands` with a space between every pair, append a
    /// newline and write the result through
    /// [`TimestampWriter::write`]. Returns the number of bytes the
    /// destination accepted.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying write.
    pub fn println(&mut self, operands: &[&dyn Operand]) -> Result<usize, WriteError> {
        let mut rendered = String::new();

        for (index, operand) in operands.iter().enumerate() {
            if index > 0 {
                rendered.push(' ');
            }

            rendered.push_str(&operand.to_string());
        }

        rendered.push('\n');

        self.write(rendered.as_bytes())
    }

    /// Format `operands` and write the result through
    /// [`TimestampWriter::write`]. A space goes between two adjacent
    /// operands only when neither of them is text. Returns the number
    /// of bytes the destination accepted.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying write.
    pub fn print(&mut self, operands: &[&dyn Operand]) -> Result<usize, WriteError> {
        let mut rendered = String::new();

        for (index, operand) in operands.iter().enumerate() {
            if index > 0 && !operand.is_text() && !operands[index - 1].is_text() {
                rendered.push(' ');
            }

            rendered.push_str(&operand.to_string());
        }

        self.write(rendered.as_bytes())
    }

    /// Format `arguments` (built with [`std::format_args!`]) and write
    /// the result through [`TimestampWriter::write`]. Returns the
    /// number of bytes the destination accepted.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying write.
    pub fn printf(&mut self, arguments: fmt::Arguments<'_>) -> Result<usize, WriteError> {
        self.write(arguments.to_string().as_bytes())
    }

    /// Terminate the current line. Writes a single newline when the
    /// stream stopped mid-line, leaving the destination
    /// newline-terminated, and does nothing otherwise. The newline is
    /// a continuation of the open line and gets no prefix.
    ///
    /// # Errors
    ///
    /// Propagates the error of the underlying write.
    pub fn close(&mut self) -> Result<(), WriteError> {
        if self.at_line_start {
            return Ok(());
        }

        self.write(b"\n")?;

        Ok(())
    }

    /// Drive the destination until all of `buf` is accepted, keeping
    /// `written` and the line-start state in sync with every byte the
    /// destination takes.
    fn emit(&mut self, buf: &[u8], written: &mut usize) -> Result<(), WriteError> {
        let mut accepted = 0;

        let result = loop {
            if accepted == buf.len() {
                break Ok(());
            }

            match self.writer.write(&buf[accepted..]) {
                Ok(0) => {
                    break Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "destination accepted no bytes",
                    ))
                }
                Ok(count) => accepted += count,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => break Err(error),
            }
        };

        *written += accepted;

        if accepted > 0 {
            self.at_line_start = buf[accepted - 1] == b'\n';
        }

        result.map_err(|source| WriteError {
            written: *written,
            source,
        })
    }

    /// Render the current time in the configured pattern and offset.
    /// A pattern that does not parse, or a time that does not format,
    /// degrades to the pattern itself so the prefix never errors.
    fn prefix(&self) -> String {
        let now = OffsetDateTime::now_utc().to_offset(self.time_zone);

        format_description::parse(&self.time_format)
            .ok()
            .and_then(|description| now.format(&description).ok())
            .unwrap_or_else(|| self.time_format.clone())
    }
}
