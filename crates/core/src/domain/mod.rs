pub mod approval;
pub mod circuit;
pub mod comment;
pub mod document;
pub mod request;
pub mod workflow_type;
