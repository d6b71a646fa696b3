pub mod loaders;
pub mod mark;
pub mod result;
pub mod student;
pub mod subject;

pub use loaders::{load_roster, load_subject_info};
pub use mark::{MarkToken, SubjectCode};
pub use result::{MarkMap, ResultRecord, ResultStatus};
pub use student::StudentRecord;
pub use subject::{GradeBand, SubjectDetail, SubjectInfo};
