// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Settings controlling how bundles are packed and rendered. */

use {
    crate::{
        emitter::{BundleEmitter, CppEmitter, RustEmitter},
        error::{PackError, Result},
        framing::{DEFAULT_COMPRESSION_LEVEL, MAX_COMPRESSION_LEVEL},
    },
    std::{fmt::Display, str::FromStr},
};

/// Target syntax of the generated bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// C++ source linked against the `EmbeddedResources` runtime.
    Cpp,

    /// A Rust module.
    Rust,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Cpp
    }
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpp => "cpp",
            Self::Rust => "rust",
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cpp" | "c++" => Ok(Self::Cpp),
            "rust" | "rs" => Ok(Self::Rust),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Whether `s` is an ASCII identifier valid in both C++ and Rust.
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Settings for a [crate::packer::Packer].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackerSettings {
    /// zlib compression level, 0-9. Larger values compress at 9.
    pub compression_level: u32,

    /// Whether to read and compress resources on a thread pool.
    pub parallel: bool,

    /// Syntax of generated output.
    pub output_format: OutputFormat,

    /// Namespace (C++) or module (Rust) wrapping generated definitions.
    ///
    /// `None` uses the format's default.
    pub namespace: Option<String>,
}

impl Default for PackerSettings {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            parallel: true,
            output_format: OutputFormat::default(),
            namespace: None,
        }
    }
}

impl PackerSettings {
    /// Set the compression level, clamped to zlib's range.
    #[must_use]
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(MAX_COMPRESSION_LEVEL);
        self
    }

    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn namespace(mut self, namespace: impl ToString) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Ensure the configured namespace is usable by the output format.
    ///
    /// C++ accepts nested namespaces (`a::b`); Rust takes a single module
    /// name. Definitions go in this namespace but C++ table records are
    /// always typed `OsmAnd::EmbeddedResource`, as declared by the runtime
    /// header.
    pub fn validate(&self) -> Result<()> {
        let namespace = match &self.namespace {
            Some(ns) => ns,
            None => return Ok(()),
        };

        let valid = match self.output_format {
            OutputFormat::Cpp => namespace.split("::").all(is_identifier),
            OutputFormat::Rust => is_identifier(namespace),
        };

        if valid {
            Ok(())
        } else {
            Err(PackError::InvalidNamespace {
                namespace: namespace.clone(),
                format: self.output_format.as_str(),
            })
        }
    }

    /// Construct the emitter these settings describe.
    pub fn emitter(&self) -> Box<dyn BundleEmitter + Send + Sync> {
        match (self.output_format, &self.namespace) {
            (OutputFormat::Cpp, Some(ns)) => Box::new(CppEmitter::new(ns)),
            (OutputFormat::Cpp, None) => Box::new(CppEmitter::default()),
            (OutputFormat::Rust, Some(module)) => Box::new(RustEmitter::new(module)),
            (OutputFormat::Rust, None) => Box::new(RustEmitter::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = PackerSettings::default();

        assert_eq!(settings.compression_level, 9);
        assert!(settings.parallel);
        assert_eq!(settings.output_format, OutputFormat::Cpp);
        assert_eq!(settings.namespace, None);
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("cpp".parse::<OutputFormat>(), Ok(OutputFormat::Cpp));
        assert_eq!("c++".parse::<OutputFormat>(), Ok(OutputFormat::Cpp));
        assert_eq!("rust".parse::<OutputFormat>(), Ok(OutputFormat::Rust));
        assert!("java".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Rust.to_string(), "rust");
    }

    #[test]
    fn test_validate_namespace() {
        let cpp = PackerSettings::default();
        assert!(cpp.validate().is_ok());
        assert!(cpp.clone().namespace("Acme").validate().is_ok());
        assert!(cpp.clone().namespace("acme::core_v2").validate().is_ok());

        for bad in ["", "9lives", "has space", "a::", "a-b", "ns { }"] {
            assert!(
                matches!(
                    cpp.clone().namespace(bad).validate(),
                    Err(PackError::InvalidNamespace { format: "cpp", .. })
                ),
                "{:?} should be rejected",
                bad
            );
        }

        let rust = PackerSettings::default().output_format(OutputFormat::Rust);
        assert!(rust.clone().namespace("assets").validate().is_ok());
        assert!(matches!(
            rust.namespace("a::b").validate(),
            Err(PackError::InvalidNamespace { format: "rust", .. })
        ));
    }

    #[test]
    fn test_compression_level_clamped() {
        assert_eq!(
            PackerSettings::default()
                .compression_level(42)
                .compression_level,
            9
        );
    }
}
