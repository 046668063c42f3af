// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Rendering of packed bundles as source code.

A bundle is rendered as a sequence of per-entry byte arrays holding
framed payloads, followed by a table of `(name, size, data)` records in
bundle order, followed by the number of records. Each [BundleEmitter]
implementation renders this structure in the syntax of one target
language.
*/

use {
    crate::framing::{Bundle, PackedEntry},
    std::io::Write,
};

/// Number of byte literals rendered per line.
pub const BYTES_PER_LINE: usize = 16;

/// First line of every generated file.
pub const AUTOGENERATED_MARKER: &str = "// AUTOGENERATED FILE";

/// Namespace generated C++ code is placed in by default.
pub const DEFAULT_CPP_NAMESPACE: &str = "OsmAnd";

/// Fully qualified C++ type of table records, declared by the runtime's
/// `EmbeddedResources.h` regardless of the namespace definitions go in.
pub const CPP_TABLE_RECORD_TYPE: &str = "OsmAnd::EmbeddedResource";

/// Module generated Rust code is placed in by default.
pub const DEFAULT_RUST_MODULE: &str = "bundled_resources";

/// Renders the pieces of a bundle in some target syntax.
///
/// Methods are invoked by [write_bundle] in declaration order:
/// prologue, each entry, table, count, epilogue.
pub trait BundleEmitter {
    /// Write everything preceding the first entry.
    fn write_prologue(&self, dest: &mut dyn Write) -> std::io::Result<()>;

    /// Write the definitions for a single entry.
    fn write_entry(&self, dest: &mut dyn Write, entry: &PackedEntry) -> std::io::Result<()>;

    /// Write the lookup table referencing every entry.
    fn write_table(&self, dest: &mut dyn Write, entries: &[PackedEntry]) -> std::io::Result<()>;

    /// Write the scalar holding the number of entries.
    fn write_count(&self, dest: &mut dyn Write, count: usize) -> std::io::Result<()>;

    /// Write everything following the count.
    fn write_epilogue(&self, dest: &mut dyn Write) -> std::io::Result<()>;
}

/// Render a complete bundle with an emitter.
pub fn write_bundle(
    emitter: &dyn BundleEmitter,
    bundle: &Bundle,
    dest: &mut dyn Write,
) -> std::io::Result<()> {
    emitter.write_prologue(dest)?;
    for entry in &bundle.entries {
        emitter.write_entry(dest, entry)?;
    }
    emitter.write_table(dest, &bundle.entries)?;
    emitter.write_count(dest, bundle.count())?;
    emitter.write_epilogue(dest)?;

    Ok(())
}

/// Escape a string for use inside a C/C++ double quoted literal.
fn escape_cpp_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());

    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            // Octal escapes stop after 3 digits, unlike \x, so following
            // characters can't be absorbed into the escape.
            c if c.is_control() => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    escaped.push_str(&format!("\\{:03o}", byte));
                }
            }
            _ => escaped.push(c),
        }
    }

    escaped
}

/// Emits C++ source for linking against the `EmbeddedResources` runtime.
///
/// Output for a given bundle is byte-for-byte what the historical Python
/// packer produced, so existing generated files diff cleanly.
#[derive(Clone, Debug)]
pub struct CppEmitter {
    namespace: String,
}

impl Default for CppEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CPP_NAMESPACE)
    }
}

impl CppEmitter {
    pub fn new(namespace: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl BundleEmitter for CppEmitter {
    fn write_prologue(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        writeln!(dest, "{}", AUTOGENERATED_MARKER)?;
        writeln!(dest, "#include \"EmbeddedResources.h\"")?;
        writeln!(dest, "#include \"EmbeddedResources_private.h\"")?;
        writeln!(dest, "namespace {} {{", self.namespace)?;

        Ok(())
    }

    fn write_entry(&self, dest: &mut dyn Write, entry: &PackedEntry) -> std::io::Result<()> {
        let idx = entry.index;

        writeln!(
            dest,
            "\tstatic const QString __bundled_resource_name_{} = \"{}\";",
            idx,
            escape_cpp_string(&entry.logical_name)
        )?;
        writeln!(dest, "\tstatic const uint8_t __bundled_resource_data_{}[] = {{", idx)?;

        let header = entry.size_header();
        write!(
            dest,
            "\t\t0x{:02x}, 0x{:02x}, 0x{:02x}, 0x{:02x},",
            header[0], header[1], header[2], header[3]
        )?;

        // Every value carries a trailing ", " and rows start on a fresh line.
        for (byte_idx, value) in entry.compressed.iter().enumerate() {
            if byte_idx % BYTES_PER_LINE == 0 {
                write!(dest, "\n\t\t")?;
            }
            write!(dest, "0x{:02x}, ", value)?;
        }
        writeln!(dest)?;

        writeln!(dest, "\t}};")?;
        writeln!(
            dest,
            "\tconst size_t __bundled_resource_size_{} = 4 + {};",
            idx,
            entry.compressed.len()
        )?;

        Ok(())
    }

    fn write_table(&self, dest: &mut dyn Write, entries: &[PackedEntry]) -> std::io::Result<()> {
        writeln!(
            dest,
            "\tconst {} __bundled_resources[] = {{",
            CPP_TABLE_RECORD_TYPE
        )?;
        for entry in entries {
            let idx = entry.index;
            writeln!(
                dest,
                "\t\t{{ __bundled_resource_name_{}, __bundled_resource_size_{}, &__bundled_resource_data_{}[0] }},",
                idx, idx, idx
            )?;
        }
        writeln!(dest, "\t}};")?;

        Ok(())
    }

    fn write_count(&self, dest: &mut dyn Write, count: usize) -> std::io::Result<()> {
        writeln!(dest, "\tconst uint32_t __bundled_resources_count = {};", count)
    }

    fn write_epilogue(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        writeln!(dest, "}} /* namespace {} */", self.namespace)
    }
}

/// Emits a self-contained Rust module suitable for `include!()`.
#[derive(Clone, Debug)]
pub struct RustEmitter {
    module: String,
}

impl Default for RustEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_RUST_MODULE)
    }
}

impl RustEmitter {
    pub fn new(module: impl ToString) -> Self {
        Self {
            module: module.to_string(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    fn write_byte_row(dest: &mut dyn Write, row: &[u8]) -> std::io::Result<()> {
        let rendered = row
            .iter()
            .map(|value| format!("0x{:02x}", value))
            .collect::<Vec<_>>()
            .join(", ");

        writeln!(dest, "        {},", rendered)
    }
}

impl BundleEmitter for RustEmitter {
    fn write_prologue(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        writeln!(dest, "{}", AUTOGENERATED_MARKER)?;
        writeln!(dest)?;
        writeln!(dest, "#[allow(dead_code)]")?;
        writeln!(dest, "pub mod {} {{", self.module)?;
        writeln!(dest, "    #[derive(Clone, Copy, Debug)]")?;
        writeln!(dest, "    pub struct EmbeddedResource {{")?;
        writeln!(dest, "        pub name: &'static str,")?;
        writeln!(dest, "        pub size: usize,")?;
        writeln!(dest, "        pub data: &'static [u8],")?;
        writeln!(dest, "    }}")?;

        Ok(())
    }

    fn write_entry(&self, dest: &mut dyn Write, entry: &PackedEntry) -> std::io::Result<()> {
        writeln!(dest)?;
        writeln!(
            dest,
            "    static BUNDLED_RESOURCE_DATA_{}: [u8; 4 + {}] = [",
            entry.index,
            entry.compressed.len()
        )?;
        Self::write_byte_row(dest, &entry.size_header())?;
        for row in entry.compressed.chunks(BYTES_PER_LINE) {
            Self::write_byte_row(dest, row)?;
        }
        writeln!(dest, "    ];")?;

        Ok(())
    }

    fn write_table(&self, dest: &mut dyn Write, entries: &[PackedEntry]) -> std::io::Result<()> {
        writeln!(dest)?;
        writeln!(
            dest,
            "    pub static BUNDLED_RESOURCES: [EmbeddedResource; {}] = [",
            entries.len()
        )?;
        for entry in entries {
            writeln!(dest, "        EmbeddedResource {{")?;
            writeln!(dest, "            name: {:?},", entry.logical_name)?;
            writeln!(dest, "            size: 4 + {},", entry.compressed.len())?;
            writeln!(dest, "            data: &BUNDLED_RESOURCE_DATA_{},", entry.index)?;
            writeln!(dest, "        }},")?;
        }
        writeln!(dest, "    ];")?;

        Ok(())
    }

    fn write_count(&self, dest: &mut dyn Write, count: usize) -> std::io::Result<()> {
        writeln!(dest)?;
        writeln!(dest, "    pub const BUNDLED_RESOURCES_COUNT: u32 = {};", count)
    }

    fn write_epilogue(&self, dest: &mut dyn Write) -> std::io::Result<()> {
        writeln!(dest, "}}")
    }
}
