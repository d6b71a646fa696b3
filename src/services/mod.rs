pub mod extractor;
pub mod report_writer;

pub use extractor::extract;
pub use report_writer::ReportWriter;
