// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of resource list manifests.

A manifest lists one resource per line as `path : logical-name`. Paths
are relative to a root directory; a leading `/` is allowed and refers to
that root, not the filesystem root. Blank lines and lines beginning with
`#` are ignored.
*/

use {
    crate::{
        error::{PackError, Result},
        resource::ResourceSpec,
    },
    std::path::Path,
};

/// Parse manifest text into resources rooted at `root`.
pub fn parse_manifest(text: &str, root: &Path) -> Result<Vec<ResourceSpec>> {
    let mut resources = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (path, name) = trimmed
            .split_once(':')
            .ok_or(PackError::ManifestSyntax {
                line: line_number,
                message: "expected 'path : name'",
            })?;

        let path = path.trim().trim_start_matches(|c: char| c == '/' || c == '\\');
        let name = name.trim();

        if path.is_empty() {
            return Err(PackError::ManifestSyntax {
                line: line_number,
                message: "missing resource path",
            });
        }
        if name.is_empty() {
            return Err(PackError::ManifestSyntax {
                line: line_number,
                message: "missing logical name",
            });
        }

        resources.push(ResourceSpec::new(root.join(path), name));
    }

    Ok(resources)
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path, root: &Path) -> Result<Vec<ResourceSpec>> {
    let text = std::fs::read_to_string(path).map_err(|source| PackError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;

    parse_manifest(&text, root)
}
