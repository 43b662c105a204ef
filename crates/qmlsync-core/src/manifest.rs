//! Parser for the per-directory `qmldir` manifest.
//!
//! The grammar is line oriented: one command per line, tokens separated by
//! whitespace, `#` starts a comment. Lines that cannot be understood are
//! logged and skipped, a manifest never fails to parse as a whole.

use crate::model::Version;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportVersion {
    /// No version given.
    #[default]
    Unversioned,
    /// `auto`: follow the version the importing module was imported with.
    Auto,
    Fixed(Version),
}

impl ImportVersion {
    pub fn version(&self) -> Version {
        match self {
            ImportVersion::Fixed(version) => *version,
            _ => Version::default(),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, ImportVersion::Auto)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestImport {
    pub module: String,
    pub version: ImportVersion,
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestComponent {
    pub type_name: String,
    pub version: Version,
    pub file_name: String,
    pub is_singleton: bool,
    pub is_internal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Manifest {
    pub module_name: Option<String>,
    pub type_infos: Vec<String>,
    pub dependencies: Vec<ManifestImport>,
    pub imports: Vec<ManifestImport>,
    pub components: Vec<ManifestComponent>,
}

impl Manifest {
    pub fn parse(content: &str) -> Self {
        let mut manifest = Manifest::default();

        for (index, line) in content.lines().enumerate() {
            let line = match line.split_once('#') {
                Some((code, _)) => code,
                None => line,
            };
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            if !manifest.parse_line(&tokens) {
                warn!("qmldir line {}: cannot understand {:?}", index + 1, line.trim());
            }
        }

        manifest
    }

    fn parse_line(&mut self, tokens: &[&str]) -> bool {
        match tokens {
            ["module", name] => {
                self.module_name = Some(name.to_string());
                true
            }
            ["typeinfo", file_name] => {
                push_unique(&mut self.type_infos, file_name.to_string());
                true
            }
            ["depends", rest @ ..] => match parse_import(rest, false) {
                Some(import) => {
                    push_unique(&mut self.dependencies, import);
                    true
                }
                None => false,
            },
            ["import", rest @ ..] | ["default", "import", rest @ ..] => {
                self.push_import(parse_import(rest, false))
            }
            ["optional", "import", rest @ ..] => self.push_import(parse_import(rest, true)),
            ["plugin" | "classname" | "designersupported" | "prefer" | "linktarget" | "static" | "system", ..]
            | ["optional", "plugin", ..] => true,
            ["singleton", rest @ ..] => self.push_component(rest, true, false),
            ["internal", rest @ ..] => self.push_component(rest, false, true),
            _ => self.push_component(tokens, false, false),
        }
    }

    fn push_import(&mut self, import: Option<ManifestImport>) -> bool {
        match import {
            Some(import) => {
                push_unique(&mut self.imports, import);
                true
            }
            None => false,
        }
    }

    fn push_component(&mut self, tokens: &[&str], is_singleton: bool, is_internal: bool) -> bool {
        let (type_name, version, file_name) = match tokens {
            [type_name, file_name] => (*type_name, Some(Version::default()), *file_name),
            [type_name, version, file_name] => (*type_name, Version::parse(version), *file_name),
            _ => return false,
        };

        let (Some(version), true) = (version, is_type_name(type_name)) else {
            return false;
        };

        push_unique(
            &mut self.components,
            ManifestComponent {
                type_name: type_name.to_string(),
                version,
                file_name: file_name.to_string(),
                is_singleton,
                is_internal,
            },
        );
        true
    }
}

fn parse_import(tokens: &[&str], is_optional: bool) -> Option<ManifestImport> {
    let (module, version) = match tokens {
        [module] => (*module, ImportVersion::Unversioned),
        [module, "auto"] => (*module, ImportVersion::Auto),
        [module, version] => (*module, ImportVersion::Fixed(Version::parse(version)?)),
        _ => return None,
    };

    Some(ManifestImport {
        module: module.to_string(),
        version,
        is_optional,
    })
}

fn is_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}
