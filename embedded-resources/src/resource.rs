// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

/// Describes a file to embed and the name it is looked up by.
///
/// Instances are typically produced from a manifest. See
/// [crate::manifest::parse_manifest].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceSpec {
    /// Filesystem path of the file whose content is embedded.
    pub source_path: PathBuf,

    /// Name a runtime consumer uses to retrieve the resource.
    pub logical_name: String,
}

impl ResourceSpec {
    /// Create a new instance from a path and logical name.
    pub fn new(source_path: impl AsRef<Path>, logical_name: impl ToString) -> Self {
        Self {
            source_path: source_path.as_ref().to_path_buf(),
            logical_name: logical_name.to_string(),
        }
    }
}

impl<P: AsRef<Path>, N: ToString> From<(P, N)> for ResourceSpec {
    fn from((path, name): (P, N)) -> Self {
        Self::new(path, name)
    }
}
