// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Embedded resource bundles

This crate packs an ordered list of files into a generated source file
that a program can compile in and query by *logical name* at run time,
without touching the filesystem.

Each file is compressed with zlib and *framed*: prefixed with its
decompressed length as a 4 byte big-endian integer. The framed payloads
are rendered as byte array literals, followed by a table of
`(name, stored size, data)` records in input order and a final record
count. A consumer looks a name up in the table, reads the size header,
allocates a buffer of exactly that size and inflates the remaining
`stored size - 4` bytes into it. [decode_framed_payload] implements that
last step.

```no_run
use embedded_resources::{pack, ResourceSpec};
use std::path::Path;

let resources = vec![
    ResourceSpec::new("resources/fonts/a.ttf", "fonts/a.ttf"),
    ResourceSpec::new("resources/icons/b.png", "icons/b.png"),
];

let bundle = pack(&resources, Path::new("gen/EmbeddedResources_bundle.cpp"))?;
assert_eq!(bundle.count(), 2);
# Ok::<(), embedded_resources::PackError>(())
```

Output syntax is pluggable via [BundleEmitter]. C++ ([CppEmitter]) and
Rust ([RustEmitter]) are provided.
*/

pub mod config;
pub mod emitter;
mod error;
pub mod framing;
pub mod manifest;
pub mod packer;
mod resource;

pub use crate::{
    config::{OutputFormat, PackerSettings},
    emitter::{write_bundle, BundleEmitter, CppEmitter, RustEmitter},
    error::{PackError, Result},
    framing::{decode_framed_payload, Bundle, PackedEntry},
    manifest::{parse_manifest, read_manifest},
    packer::{pack, pack_to_writer, Packer},
    resource::ResourceSpec,
};
