use serde::{Deserialize, Serialize};

use crate::ids::StorageRootId;

/// A registered filesystem directory the scanner is permitted to walk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageRoot {
    pub id: StorageRootId,
    pub display_name: String,
    pub path: String,
    pub is_default: bool,
}
