use std::io::Write;
use std::path::Path;

use tempfile::tempdir;
use vaadinctl_core::{LEGACY_ARCHIVE, PRIMARY_ARCHIVE, resolve_installed, scan_archives};
use vaadinctl_types::{FrameworkVersion, InstalledVersion};

fn write_jar(dir: &Path, name: &str, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(dir.join(name)).expect("create jar");
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (entry, content) in entries {
        writer.start_file(*entry, options).expect("start entry");
        writer.write_all(content.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish jar");
}

#[test]
fn portal_lib_dir_resolves_from_server_jar() {
    let lib = tempdir().expect("create temp dir");
    write_jar(
        lib.path(),
        "portal-kernel.jar",
        &[("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\r\n")],
    );
    write_jar(
        lib.path(),
        PRIMARY_ARCHIVE,
        &[(
            "META-INF/maven/com.vaadin/vaadin-server/pom.xml",
            "<project><modelVersion>4.0.0</modelVersion><version>7.1.8</version></project>",
        )],
    );
    std::fs::write(lib.path().join("notes.txt"), "not an archive").expect("write notes");

    let candidates = scan_archives(lib.path()).expect("scan lib dir");
    assert_eq!(candidates.len(), 2);

    let installed = resolve_installed(&candidates);
    assert_eq!(installed, InstalledVersion::Known("7.1.8".to_string()));
    assert_eq!(
        installed.parsed(),
        Some(Ok(FrameworkVersion::new(7, 1, 8)))
    );
}

#[test]
fn legacy_jar_is_used_when_server_jar_is_absent() {
    let lib = tempdir().expect("create temp dir");
    write_jar(
        lib.path(),
        LEGACY_ARCHIVE,
        &[(
            "META-INF/MANIFEST.MF",
            "Manifest-Version: 1.0\r\nBundle-Name: Vaadin\r\nBundle-Version: 6.8.12\r\n",
        )],
    );

    let candidates = scan_archives(lib.path()).expect("scan lib dir");

    assert_eq!(
        resolve_installed(&candidates),
        InstalledVersion::Known("6.8.12".to_string())
    );
}

#[test]
fn lib_dir_without_framework_archives_is_unknown() {
    let lib = tempdir().expect("create temp dir");
    write_jar(
        lib.path(),
        "commons-lang.jar",
        &[("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\r\n")],
    );

    let candidates = scan_archives(lib.path()).expect("scan lib dir");

    assert_eq!(resolve_installed(&candidates), InstalledVersion::Unknown);
    assert_eq!(resolve_installed(&candidates).to_string(), "unknown");
}
