use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;
use vaadinctl_types::{ArtifactDescriptor, InstalledVersion, ResolutionError};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::manifest::{MANIFEST_PATH, Manifest};

/// Runtime library of the framework from 7.0 onwards.
pub const PRIMARY_ARCHIVE: &str = "vaadin-server.jar";
/// Single combined framework jar shipped by 6.x.
pub const LEGACY_ARCHIVE: &str = "vaadin.jar";

const VERSION_ATTRIBUTE: &str = "Bundle-Version";
const NAME_ATTRIBUTE: &str = "Bundle-Name";
const LEGACY_BUNDLE_NAME: &str = "Vaadin";
const BUILD_DESCRIPTOR_PREFIX: &str = "META-INF/maven/";
const BUILD_DESCRIPTOR_SUFFIX: &str = "/pom.xml";

#[derive(Debug, Clone, Copy)]
enum BundleNameRule {
    NonEmpty,
    Equals(&'static str),
}

impl BundleNameRule {
    fn accepts(self, bundle_name: &str) -> bool {
        match self {
            Self::NonEmpty => !bundle_name.is_empty(),
            Self::Equals(expected) => bundle_name == expected,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Extractor {
    Manifest(BundleNameRule),
    BuildDescriptor,
}

struct Strategy {
    archive_name: &'static str,
    extractors: &'static [Extractor],
}

const PRIMARY_EXTRACTORS: &[Extractor] = &[
    Extractor::Manifest(BundleNameRule::NonEmpty),
    Extractor::BuildDescriptor,
];

const STRATEGIES: &[Strategy] = &[
    Strategy {
        archive_name: PRIMARY_ARCHIVE,
        extractors: PRIMARY_EXTRACTORS,
    },
    Strategy {
        archive_name: LEGACY_ARCHIVE,
        extractors: &[Extractor::Manifest(BundleNameRule::Equals(
            LEGACY_BUNDLE_NAME,
        ))],
    },
];

#[derive(Debug, Error)]
enum StepError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Zip {
        context: &'static str,
        #[source]
        source: ZipError,
    },
    #[error("invalid build descriptor {entry}: {source}")]
    Xml {
        entry: String,
        #[source]
        source: roxmltree::Error,
    },
}

impl Extractor {
    fn label(self) -> &'static str {
        match self {
            Self::Manifest(_) => "manifest",
            Self::BuildDescriptor => "build descriptor",
        }
    }

    fn extract(self, archive: &mut ZipArchive<File>) -> Result<Option<String>, StepError> {
        match self {
            Self::Manifest(rule) => manifest_version(archive, rule),
            Self::BuildDescriptor => build_descriptor_version(archive),
        }
    }
}

/// Find the installed framework version among `candidates`.
///
/// The primary runtime jar is tried first (manifest, then embedded
/// `pom.xml`), then the legacy combined jar (manifest only, and only when it
/// names itself `Vaadin`). Failures at any single step are logged and
/// skipped. The returned string is the raw value found in the archive.
///
/// # Errors
/// Returns [`ResolutionError::NotFound`] when no step yields a version.
pub fn resolve_version(candidates: &[PathBuf]) -> Result<String, ResolutionError> {
    STRATEGIES
        .iter()
        .find_map(|strategy| {
            let Some(path) = find_candidate(candidates, strategy.archive_name) else {
                debug!("{} not among candidate archives", strategy.archive_name);
                return None;
            };
            run_extractors(path, strategy.extractors)
        })
        .inspect(|version| info!("Resolved installed framework version {version}"))
        .ok_or(ResolutionError::NotFound)
}

/// Like [`resolve_version`], reporting a failed lookup as
/// [`InstalledVersion::Unknown`].
#[must_use]
pub fn resolve_installed(candidates: &[PathBuf]) -> InstalledVersion {
    let installed = InstalledVersion::from_resolution(resolve_version(candidates));
    if installed == InstalledVersion::Unknown {
        warn!("Installed framework version could not be determined");
    }
    installed
}

/// Inspect any archive with the runtime-jar extractors.
#[must_use]
pub fn describe_artifact(path: &Path) -> ArtifactDescriptor {
    ArtifactDescriptor {
        path: path.to_path_buf(),
        version: run_extractors(path, PRIMARY_EXTRACTORS),
    }
}

/// List the `*.jar` files of a library directory, sorted by path.
///
/// # Errors
/// Returns an error if the directory cannot be read.
pub fn scan_archives(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_jar = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jar"));
        if is_jar && path.is_file() {
            archives.push(path);
        }
    }
    archives.sort();
    Ok(archives)
}

fn find_candidate<'a>(candidates: &'a [PathBuf], archive_name: &str) -> Option<&'a Path> {
    candidates
        .iter()
        .find(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.eq_ignore_ascii_case(archive_name))
        })
        .map(PathBuf::as_path)
}

fn run_extractors(path: &Path, extractors: &[Extractor]) -> Option<String> {
    let mut archive = match open_archive(path) {
        Ok(archive) => archive,
        Err(error) => {
            warn!("{} couldn't be read: {error}", path.display());
            return None;
        }
    };

    extractors
        .iter()
        .find_map(|extractor| match extractor.extract(&mut archive) {
            Ok(Some(version)) => Some(version),
            Ok(None) => {
                debug!(
                    "No version in {} of {}",
                    extractor.label(),
                    path.display()
                );
                None
            }
            Err(error) => {
                debug!(
                    "Reading {} of {} failed: {error}",
                    extractor.label(),
                    path.display()
                );
                None
            }
        })
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>, StepError> {
    let file = File::open(path).map_err(|source| StepError::Io {
        context: "failed to open archive",
        source,
    })?;
    ZipArchive::new(file).map_err(|source| StepError::Zip {
        context: "failed to read archive",
        source,
    })
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<Option<String>, StepError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(source) => {
            return Err(StepError::Zip {
                context: "failed to open archive entry",
                source,
            });
        }
    };

    let mut content = String::new();
    entry
        .read_to_string(&mut content)
        .map_err(|source| StepError::Io {
            context: "failed to read archive entry",
            source,
        })?;
    Ok(Some(content))
}

fn manifest_version(
    archive: &mut ZipArchive<File>,
    rule: BundleNameRule,
) -> Result<Option<String>, StepError> {
    let Some(content) = read_entry(archive, MANIFEST_PATH)? else {
        return Ok(None);
    };
    let manifest = Manifest::parse(&content);

    let bundle_name = manifest.get(NAME_ATTRIBUTE).map(str::trim);
    if !bundle_name.is_some_and(|name| rule.accepts(name)) {
        return Ok(None);
    }

    Ok(manifest
        .get(VERSION_ATTRIBUTE)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string))
}

fn is_build_descriptor(name: &str) -> bool {
    name.starts_with(BUILD_DESCRIPTOR_PREFIX) && name.ends_with(BUILD_DESCRIPTOR_SUFFIX)
}

fn build_descriptor_version(archive: &mut ZipArchive<File>) -> Result<Option<String>, StepError> {
    let Some(entry) = archive
        .file_names()
        .find(|name| is_build_descriptor(name))
        .map(str::to_string)
    else {
        return Ok(None);
    };

    let Some(xml) = read_entry(archive, &entry)? else {
        return Ok(None);
    };
    parse_pom_version(&xml).map_err(|source| StepError::Xml { entry, source })
}

/// First `version` element directly under the document root.
fn parse_pom_version(xml: &str) -> Result<Option<String>, roxmltree::Error> {
    let document = roxmltree::Document::parse(xml)?;
    Ok(document
        .root_element()
        .children()
        .find(|node| node.is_element() && node.tag_name().name() == "version")
        .and_then(|node| node.text())
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .map(str::to_string))
}
