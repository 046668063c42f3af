// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Packing of resource files into bundles. */

use {
    crate::{
        config::PackerSettings,
        emitter::write_bundle,
        error::{PackError, Result},
        framing::{Bundle, PackedEntry},
        resource::ResourceSpec,
    },
    log::{debug, info},
    rayon::prelude::*,
    std::{
        collections::HashMap,
        io::{BufWriter, Read, Write},
        path::Path,
    },
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Prefix of temporary files created next to the output.
const TEMP_FILE_PREFIX: &str = ".embed-resources-";

/// Ensure logical names are present and unique.
fn validate_names(resources: &[ResourceSpec]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::with_capacity(resources.len());

    for resource in resources {
        if resource.logical_name.is_empty() {
            return Err(PackError::EmptyLogicalName {
                path: resource.source_path.clone(),
            });
        }

        if let Some(first) = seen.insert(&resource.logical_name, &resource.source_path) {
            return Err(PackError::DuplicateLogicalName {
                name: resource.logical_name.clone(),
                first: first.to_path_buf(),
                second: resource.source_path.clone(),
            });
        }
    }

    Ok(())
}

/// Read a resource's content, refusing files too large for the size header.
///
/// The length is checked before any content is read.
fn read_resource(resource: &ResourceSpec) -> Result<Vec<u8>> {
    let unreadable = |source| PackError::SourceUnreadable {
        path: resource.source_path.clone(),
        source,
    };

    let fh = std::fs::File::open(&resource.source_path).map_err(unreadable)?;
    let size = fh.metadata().map_err(unreadable)?.len();

    if size > u64::from(u32::MAX) {
        return Err(PackError::ResourceTooLarge {
            path: resource.source_path.clone(),
            size,
        });
    }

    // The file may grow after the length check; never buffer more than the
    // header can describe plus one byte so growth is still detected.
    let mut data = Vec::with_capacity(size as usize);
    fh.take(u64::from(u32::MAX) + 1)
        .read_to_end(&mut data)
        .map_err(unreadable)?;

    Ok(data)
}

#[cfg(unix)]
fn make_world_readable(file: &std::fs::File) -> std::io::Result<()> {
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn make_world_readable(_file: &std::fs::File) -> std::io::Result<()> {
    Ok(())
}

/// Turns lists of resources into rendered bundles.
#[derive(Clone, Debug, Default)]
pub struct Packer {
    settings: PackerSettings,
}

impl Packer {
    pub fn new(settings: PackerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PackerSettings {
        &self.settings
    }

    /// Read and compress resources into a [Bundle].
    ///
    /// Entries are indexed in input order. When multiple resources fail,
    /// the error for the earliest one is returned.
    pub fn build_bundle(&self, resources: &[ResourceSpec]) -> Result<Bundle> {
        self.settings.validate()?;
        validate_names(resources)?;

        let level = self.settings.compression_level;

        let pack_one = |(index, resource): (usize, &ResourceSpec)| -> Result<PackedEntry> {
            let data = read_resource(resource)?;

            PackedEntry::from_data(
                index,
                &resource.logical_name,
                &resource.source_path,
                &data,
                level,
            )
        };

        let results = if self.settings.parallel {
            resources
                .par_iter()
                .enumerate()
                .map(&pack_one)
                .collect::<Vec<_>>()
        } else {
            resources
                .iter()
                .enumerate()
                .map(&pack_one)
                .collect::<Vec<_>>()
        };

        let entries = results.into_iter().collect::<Result<Vec<_>>>()?;

        for (resource, entry) in resources.iter().zip(entries.iter()) {
            info!(
                "packed '{}' ({} bytes) as '{}' (4+{} bytes)",
                resource.source_path.display(),
                entry.original_size,
                entry.logical_name,
                entry.compressed.len()
            );

            if entry.is_incompressible() {
                debug!(
                    "'{}' did not shrink when compressed ({} -> {} bytes)",
                    entry.logical_name,
                    entry.original_size,
                    entry.compressed.len()
                );
            }
        }

        Ok(Bundle { entries })
    }

    /// Pack resources and render the bundle to a writer.
    pub fn pack_to_writer(
        &self,
        resources: &[ResourceSpec],
        dest: &mut dyn Write,
    ) -> Result<Bundle> {
        let bundle = self.build_bundle(resources)?;
        write_bundle(self.settings.emitter().as_ref(), &bundle, dest)?;

        Ok(bundle)
    }

    /// Pack resources and write the rendered bundle to a file.
    ///
    /// The parent directory is created if missing. Content is staged in a
    /// temporary file next to `output` and renamed into place only once
    /// fully written, so on error `output` is left as it was.
    pub fn pack(&self, resources: &[ResourceSpec], output: &Path) -> Result<Bundle> {
        self.settings.validate()?;

        let parent = match output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        std::fs::create_dir_all(parent).map_err(|source| PackError::OutputTargetUnavailable {
            path: parent.to_path_buf(),
            source,
        })?;

        let output_error = |source| PackError::OutputTargetUnavailable {
            path: output.to_path_buf(),
            source,
        };

        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .tempfile_in(parent)
            .map_err(output_error)?;
        debug!(
            "staging {} in {}",
            output.display(),
            temp.path().display()
        );

        let bundle = self.build_bundle(resources)?;

        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            write_bundle(self.settings.emitter().as_ref(), &bundle, &mut writer)
                .map_err(output_error)?;
            writer.flush().map_err(output_error)?;
        }

        make_world_readable(temp.as_file()).map_err(output_error)?;
        temp.persist(output)
            .map_err(|err| output_error(err.error))?;

        info!(
            "wrote {} resources to {}",
            bundle.count(),
            output.display()
        );

        Ok(bundle)
    }
}

/// Pack resources to a file using default settings.
///
/// See [Packer::pack].
pub fn pack(resources: &[ResourceSpec], output: &Path) -> Result<Bundle> {
    Packer::default().pack(resources, output)
}

/// Pack resources to a writer using default settings.
///
/// See [Packer::pack_to_writer].
pub fn pack_to_writer(resources: &[ResourceSpec], dest: &mut dyn Write) -> Result<Bundle> {
    Packer::default().pack_to_writer(resources, dest)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{config::OutputFormat, framing::decode_framed_payload},
        std::path::PathBuf,
    };

    fn write_file(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;

        Ok(path)
    }

    /// Data that zlib cannot shrink.
    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x2545f491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    #[test]
    fn test_scenario_two_resources() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "fonts/a.ttf", &b"glyph".repeat(200))?;
        let b = write_file(td.path(), "icons/b.png", &noise(50))?;

        let resources = vec![ResourceSpec::new(&a, "a"), ResourceSpec::new(&b, "b")];
        let output = td.path().join("gen").join("bundle.cpp");

        let bundle = pack(&resources, &output)?;

        assert_eq!(bundle.count(), 2);
        assert_eq!(bundle.entries[0].logical_name, "a");
        assert_eq!(bundle.entries[0].original_size, 1000);
        assert_eq!(bundle.entries[1].logical_name, "b");
        assert_eq!(bundle.entries[1].original_size, 50);
        assert!(bundle.entries[1].is_incompressible());

        for entry in &bundle.entries {
            assert_eq!(entry.stored_size(), 4 + entry.compressed.len());
        }

        let rendered = std::fs::read_to_string(&output)?;
        assert!(rendered.starts_with("// AUTOGENERATED FILE\n"));
        assert!(rendered.contains(&format!(
            "__bundled_resource_size_0 = 4 + {};",
            bundle.entries[0].compressed.len()
        )));
        assert!(rendered.contains(&format!(
            "__bundled_resource_size_1 = 4 + {};",
            bundle.entries[1].compressed.len()
        )));
        assert!(rendered.contains("__bundled_resources_count = 2;"));

        Ok(())
    }

    #[test]
    fn test_round_trip_through_bundle() -> Result<()> {
        let td = tempfile::tempdir()?;
        let inputs: Vec<Vec<u8>> = vec![vec![], b"x".to_vec(), noise(4097), vec![0; 100_000]];

        let resources = inputs
            .iter()
            .enumerate()
            .map(|(i, data)| {
                let path = write_file(td.path(), &format!("r{}", i), data)?;
                Ok(ResourceSpec::new(path, format!("r{}", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sink = Vec::new();
        let bundle = pack_to_writer(&resources, &mut sink)?;

        for (entry, data) in bundle.entries.iter().zip(inputs.iter()) {
            assert_eq!(entry.original_size as usize, data.len());
            assert_eq!(&decode_framed_payload(&entry.framed_payload())?, data);
        }

        Ok(())
    }

    #[test]
    fn test_deterministic_output() -> Result<()> {
        let td = tempfile::tempdir()?;
        let resources = (0..8)
            .map(|i| {
                let path = write_file(td.path(), &format!("f{}", i), &noise(i * 1000 + 17))?;
                Ok(ResourceSpec::new(path, format!("f{}", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        let first = td.path().join("first.cpp");
        let second = td.path().join("second.cpp");
        pack(&resources, &first)?;
        Packer::new(PackerSettings::default().parallel(false)).pack(&resources, &second)?;

        assert_eq!(std::fs::read(&first)?, std::fs::read(&second)?);

        Ok(())
    }

    #[test]
    fn test_order_preserved() -> Result<()> {
        let td = tempfile::tempdir()?;
        // Names and sizes deliberately unsorted.
        let specs = [("zz", 5000), ("aa", 10), ("mm", 70000), ("bb", 1)];

        let resources = specs
            .iter()
            .map(|(name, len)| {
                let path = write_file(td.path(), name, &noise(*len))?;
                Ok(ResourceSpec::new(path, name))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut sink = Vec::new();
        let bundle = pack_to_writer(&resources, &mut sink)?;

        for (i, ((name, _), entry)) in specs.iter().zip(bundle.entries.iter()).enumerate() {
            assert_eq!(entry.index, i);
            assert_eq!(&entry.logical_name, name);
        }

        let rendered = String::from_utf8(sink).unwrap();
        let positions = specs
            .iter()
            .map(|(name, _)| rendered.find(&format!("= \"{}\";", name)).unwrap())
            .collect::<Vec<_>>();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        Ok(())
    }

    #[test]
    fn test_count_invariant() -> Result<()> {
        let td = tempfile::tempdir()?;

        for n in [0usize, 1, 5] {
            let resources = (0..n)
                .map(|i| {
                    let path = write_file(td.path(), &format!("c{}", i), b"content")?;
                    Ok(ResourceSpec::new(path, format!("c{}", i)))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut sink = Vec::new();
            let bundle = pack_to_writer(&resources, &mut sink)?;
            assert_eq!(bundle.count(), n);

            let rendered = String::from_utf8(sink).unwrap();
            assert_eq!(
                rendered.matches("{ __bundled_resource_name_").count(),
                n
            );
            assert!(rendered.contains(&format!("__bundled_resources_count = {};", n)));
        }

        Ok(())
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        let td = tempfile::tempdir()?;
        let output = td.path().join("empty.cpp");

        let bundle = pack(&[], &output)?;
        assert_eq!(bundle.count(), 0);

        let rendered = std::fs::read_to_string(&output)?;
        assert!(rendered.contains("__bundled_resources[] = {\n\t};\n"));
        assert!(rendered.contains("__bundled_resources_count = 0;"));

        Ok(())
    }

    #[test]
    fn test_missing_source() -> Result<()> {
        let td = tempfile::tempdir()?;
        let present = write_file(td.path(), "present", b"data")?;
        let resources = vec![
            ResourceSpec::new(&present, "present"),
            ResourceSpec::new(td.path().join("missing"), "missing"),
        ];
        let output = td.path().join("out").join("bundle.cpp");

        let res = pack(&resources, &output);
        assert!(matches!(
            res,
            Err(PackError::SourceUnreadable { ref path, .. }) if path.ends_with("missing")
        ));
        assert!(!output.exists());

        // Only the (now empty) output directory should remain.
        assert_eq!(std::fs::read_dir(td.path().join("out"))?.count(), 0);

        Ok(())
    }

    #[test]
    fn test_failure_keeps_previous_output() -> Result<()> {
        let td = tempfile::tempdir()?;
        let output = td.path().join("bundle.cpp");
        std::fs::write(&output, b"previous")?;

        let resources = vec![ResourceSpec::new(td.path().join("missing"), "missing")];
        assert!(pack(&resources, &output).is_err());
        assert_eq!(std::fs::read(&output)?, b"previous");

        Ok(())
    }

    #[test]
    fn test_earliest_failure_reported() -> Result<()> {
        let td = tempfile::tempdir()?;
        let resources = vec![
            ResourceSpec::new(td.path().join("missing0"), "a"),
            ResourceSpec::new(td.path().join("missing1"), "b"),
        ];

        let mut sink = Vec::new();
        let res = pack_to_writer(&resources, &mut sink);
        assert!(matches!(
            res,
            Err(PackError::SourceUnreadable { ref path, .. }) if path.ends_with("missing0")
        ));
        assert!(sink.is_empty());

        Ok(())
    }

    #[test]
    fn test_duplicate_names_rejected() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "a", b"a")?;
        let b = write_file(td.path(), "b", b"b")?;

        let resources = vec![ResourceSpec::new(&a, "same"), ResourceSpec::new(&b, "same")];
        let mut sink = Vec::new();

        match pack_to_writer(&resources, &mut sink) {
            Err(PackError::DuplicateLogicalName {
                name,
                first,
                second,
            }) => {
                assert_eq!(name, "same");
                assert_eq!(first, a);
                assert_eq!(second, b);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_empty_name_rejected() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "a", b"a")?;

        let mut sink = Vec::new();
        assert!(matches!(
            pack_to_writer(&[ResourceSpec::new(&a, "")], &mut sink),
            Err(PackError::EmptyLogicalName { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_output_parent_is_file() -> Result<()> {
        let td = tempfile::tempdir()?;
        let blocker = write_file(td.path(), "blocker", b"")?;

        let res = pack(&[], &blocker.join("bundle.cpp"));
        assert!(matches!(
            res,
            Err(PackError::OutputTargetUnavailable { .. })
        ));

        Ok(())
    }

    #[test]
    fn test_rust_output() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "a.txt", b"hello hello hello")?;
        let output = td.path().join("bundle.rs");

        let packer = Packer::new(
            PackerSettings::default()
                .output_format(OutputFormat::Rust)
                .namespace("assets"),
        );
        packer.pack(&[ResourceSpec::new(&a, "greeting")], &output)?;

        let rendered = std::fs::read_to_string(&output)?;
        assert!(rendered.contains("pub mod assets {"));
        assert!(rendered.contains("name: \"greeting\","));
        assert!(rendered.contains("pub const BUNDLED_RESOURCES_COUNT: u32 = 1;"));

        Ok(())
    }

    #[test]
    fn test_compression_level_applied() -> Result<()> {
        let td = tempfile::tempdir()?;
        let data = b"abcdefgh".repeat(1000);
        let a = write_file(td.path(), "a", &data)?;
        let resources = [ResourceSpec::new(&a, "a")];

        let stored = Packer::new(PackerSettings::default().compression_level(0))
            .build_bundle(&resources)?;
        let best = Packer::default().build_bundle(&resources)?;

        assert!(stored.entries[0].compressed.len() > data.len());
        assert!(best.entries[0].compressed.len() < stored.entries[0].compressed.len());
        assert_eq!(
            decode_framed_payload(&stored.entries[0].framed_payload())?,
            data
        );

        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_oversized_source_rejected_before_read() -> Result<()> {
        let td = tempfile::tempdir()?;
        let small = write_file(td.path(), "small", b"small")?;
        let huge = td.path().join("huge");

        // Sparse, so this occupies no disk space.
        std::fs::File::create(&huge)?.set_len(u64::from(u32::MAX) + 1)?;

        let resources = vec![
            ResourceSpec::new(&small, "small"),
            ResourceSpec::new(&huge, "huge"),
        ];
        let output = td.path().join("bundle.cpp");

        match pack(&resources, &output) {
            Err(PackError::ResourceTooLarge { path, size }) => {
                assert_eq!(path, huge);
                assert_eq!(size, u64::from(u32::MAX) + 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!output.exists());

        Ok(())
    }

    #[test]
    fn test_invalid_namespace_rejected() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "a", b"a")?;
        let resources = [ResourceSpec::new(&a, "a")];
        let output = td.path().join("gen").join("bundle.cpp");

        let packer = Packer::new(PackerSettings::default().namespace("Acme { }"));
        assert!(matches!(
            packer.pack(&resources, &output),
            Err(PackError::InvalidNamespace { ref namespace, format: "cpp" }) if namespace == "Acme { }"
        ));
        assert!(!td.path().join("gen").exists());

        let mut sink = Vec::new();
        let packer = Packer::new(
            PackerSettings::default()
                .output_format(OutputFormat::Rust)
                .namespace("a::b"),
        );
        assert!(matches!(
            packer.pack_to_writer(&resources, &mut sink),
            Err(PackError::InvalidNamespace { format: "rust", .. })
        ));
        assert!(sink.is_empty());

        Ok(())
    }

    #[test]
    fn test_custom_cpp_namespace_keeps_runtime_record_type() -> Result<()> {
        let td = tempfile::tempdir()?;
        let a = write_file(td.path(), "a", b"a")?;

        let mut sink = Vec::new();
        Packer::new(PackerSettings::default().namespace("acme::assets"))
            .pack_to_writer(&[ResourceSpec::new(&a, "a")], &mut sink)?;

        let rendered = String::from_utf8(sink).unwrap();
        assert!(rendered.contains("namespace acme::assets"));
        assert!(rendered.contains("const OsmAnd::EmbeddedResource __bundled_resources[]"));

        Ok(())
    }

    #[test]
    fn test_out_of_range_level_field() -> Result<()> {
        let td = tempfile::tempdir()?;
        let data = b"abcdefgh".repeat(1000);
        let a = write_file(td.path(), "a", &data)?;
        let resources = [ResourceSpec::new(&a, "a")];

        let mut settings = PackerSettings::default();
        settings.compression_level = 42;

        let bundle = Packer::new(settings).build_bundle(&resources)?;
        let best = Packer::default().build_bundle(&resources)?;

        assert_eq!(bundle, best);
        assert_eq!(decode_framed_payload(&bundle.entries[0].framed_payload())?, data);

        Ok(())
    }
}
