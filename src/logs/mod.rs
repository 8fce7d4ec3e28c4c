// Logs module - Append-only daemon log and tail reading

mod reader;
mod sink;

pub use reader::read_last_lines;
pub use sink::LogSink;
