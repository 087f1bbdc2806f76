pub mod errors;
pub mod space;
pub mod design;
pub mod history;
pub mod options;
pub mod report;

pub use errors::*;
pub use space::*;
pub use design::*;
pub use history::*;
pub use options::*;
pub use report::*;
