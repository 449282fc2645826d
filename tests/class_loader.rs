use std::fs;
use std::path::Path;

use symbolic_jvm::vm::class_loader::Error;
use symbolic_jvm::vm::{ClassHierarchy, ClassLoader};

const PUBLIC_SUPER: u16 = 0x0021;
const PUBLIC_ABSTRACT_INTERFACE: u16 = 0x0601;

/// An empty class named `name`, extending `super_name`.
fn class_bytes(name: &str, super_name: &str, access_flags: u16, major: u16) -> Vec<u8> {
    fn utf8(bytes: &mut Vec<u8>, s: &str) {
        bytes.push(1);
        bytes.extend_from_slice(&(s.len() as u16).to_be_bytes());
        bytes.extend_from_slice(s.as_bytes());
    }

    let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0];
    bytes.extend_from_slice(&major.to_be_bytes());
    bytes.extend_from_slice(&[0, 5]);
    utf8(&mut bytes, name);            // 1
    bytes.extend_from_slice(&[7, 0, 1]); // 2
    utf8(&mut bytes, super_name);      // 3
    bytes.extend_from_slice(&[7, 0, 3]); // 4
    bytes.extend_from_slice(&access_flags.to_be_bytes());
    bytes.extend_from_slice(&[0, 2, 0, 4]);
    // interfaces, fields, methods, attributes
    bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
    bytes
}

fn write_class(root: &Path, name: &str, bytes: &[u8]) {
    let path = root.join(format!("{}.class", name));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_plain(root: &Path, name: &str, super_name: &str) {
    write_class(root, name, &class_bytes(name, super_name, PUBLIC_SUPER, 52));
}

#[test]
fn loads_a_class_with_its_superclasses() {
    let dir = tempfile::tempdir().unwrap();
    write_plain(dir.path(), "p/A", "java/lang/Object");
    write_plain(dir.path(), "p/B", "p/A");

    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    let class = loader.load_class(&mut hierarchy, "p/B").unwrap();
    assert_eq!(class.name, "p/B");
    assert_eq!(class.super_name.as_deref(), Some("p/A"));
    assert!(hierarchy.contains("p/A"));
    assert!(hierarchy.is_subclass("p/B", "java/lang/Object"));
}

#[test]
fn later_classpath_entries_are_searched_too() {
    let empty = tempfile::tempdir().unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_plain(dir.path(), "p/A", "java/lang/Object");

    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![empty.path().to_owned(), dir.path().to_owned()]);
    assert!(loader.load_class(&mut hierarchy, "p/A").is_ok());
}

#[test]
fn bootstrap_classes_need_no_classpath() {
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::default();
    let object = loader.load_class(&mut hierarchy, "java/lang/Object").unwrap();
    assert_eq!(object.super_name, None);
}

#[test]
fn missing_class_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/Missing"),
                     Err(Error::ClassNotFound { ref name, .. }) if name == "p/Missing"));
}

#[test]
fn missing_superclass_fails_the_subclass() {
    let dir = tempfile::tempdir().unwrap();
    write_plain(dir.path(), "p/B", "p/A");
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/B"),
                     Err(Error::ClassNotFound { ref name, .. }) if name == "p/A"));
    assert!(!hierarchy.contains("p/B"));
}

#[test]
fn newer_class_files_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "p/A", &class_bytes("p/A", "java/lang/Object", PUBLIC_SUPER, 53));
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/A"),
                     Err(Error::UnsupportedVersion { major: 53, minor: 0, .. })));
}

#[test]
fn file_defining_another_class_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "p/A", &class_bytes("p/Other", "java/lang/Object", PUBLIC_SUPER, 52));
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/A"), Err(Error::NoClassDefFound { .. })));
}

#[test]
fn garbage_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "p/A", &[0xCA, 0xFE, 0x00]);
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/A"), Err(Error::ClassFormat { .. })));
}

#[test]
fn interface_cannot_be_a_superclass() {
    let dir = tempfile::tempdir().unwrap();
    write_class(dir.path(), "p/I",
                &class_bytes("p/I", "java/lang/Object", PUBLIC_ABSTRACT_INTERFACE, 52));
    write_plain(dir.path(), "p/C", "p/I");
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/C"),
                     Err(Error::IncompatibleClassChange(_))));
}

#[test]
fn cyclic_superclasses_are_detected() {
    let dir = tempfile::tempdir().unwrap();
    write_plain(dir.path(), "p/X", "p/Y");
    write_plain(dir.path(), "p/Y", "p/X");
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert!(matches!(loader.load_class(&mut hierarchy, "p/X"),
                     Err(Error::ClassCircularity(ref name)) if name == "p/X"));
}

#[test]
fn whole_classpath_skips_broken_classes() {
    let dir = tempfile::tempdir().unwrap();
    write_plain(dir.path(), "p/A", "java/lang/Object");
    write_plain(dir.path(), "p/q/B", "p/A");
    write_class(dir.path(), "p/Broken", &[0xCA, 0xFE]);
    fs::write(dir.path().join("README"), b"not a class").unwrap();

    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut loader = ClassLoader::new(vec![dir.path().to_owned()]);
    assert_eq!(loader.load_classpath(&mut hierarchy), 2);
    assert!(hierarchy.contains("p/q/B"));
    assert!(!hierarchy.contains("p/Broken"));
}
