use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowTypeId(pub String);

/// A category of request, e.g. `CREDIT` or `COURRIER`. The code is unique
/// and immutable once requests reference it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowType {
    pub id: WorkflowTypeId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}
