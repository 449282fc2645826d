use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::model::class_file::builder::JAVA_8_MAJOR_VERSION;
use crate::model::class_file::ClassFile;
use crate::parser::class_file;
use crate::vm::class_hierarchy::ClassHierarchy;

#[derive(Debug, Error)]
pub enum Error {
    /// If no "purported representation" of the class is found. §5.3.1.
    #[error("class {name} not found: {error}")]
    ClassNotFound { name: String, #[source] error: io::Error },
    /// The "purported representation" does not follow the class file format. §5.3.5.
    #[error("class {name} is malformed: {error}")]
    ClassFormat { name: String, #[source] error: class_file::Error },
    /// The "purported representation" is not of a supported version. §5.3.5.
    #[error("class {name} has unsupported version {major}.{minor}")]
    UnsupportedVersion { name: String, major: u16, minor: u16 },
    /// The "purported representation" does not actually represent the requested class. §5.3.5.
    #[error("{path} does not define {name}")]
    NoClassDefFound { name: String, path: PathBuf },
    /// The declared superclass is an interface, or a declared superinterface is a class.
    #[error("incompatible class change: {0}")]
    IncompatibleClassChange(String),
    /// The class is its own superclass or superinterface. §5.3.5.
    #[error("class circularity at {0}")]
    ClassCircularity(String),
}

/// Loads classes from the directories of a classpath into a `ClassHierarchy`. Classes already
/// in the hierarchy, the bootstrap ones included, are never looked up on the classpath.
#[derive(Debug, Default)]
pub struct ClassLoader {
    classpath: Vec<PathBuf>,
    pending: HashSet<String>,
}

impl ClassLoader {
    pub fn new(classpath: Vec<PathBuf>) -> Self {
        ClassLoader { classpath, pending: HashSet::new() }
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    fn find_class_bytes(&self, name: &str) -> Result<(PathBuf, Vec<u8>), Error> {
        let file_name = format!("{}.class", name);
        let mut last_error = io::Error::new(io::ErrorKind::NotFound, "empty classpath");
        for dir in &self.classpath {
            let path = dir.join(&file_name);
            match fs::read(&path) {
                Ok(bytes) => return Ok((path, bytes)),
                Err(e) => last_error = e,
            }
        }
        Err(Error::ClassNotFound { name: name.to_owned(), error: last_error })
    }

    /// Loads `name`, its superclass and its superinterfaces, recursively, and adds them to
    /// `hierarchy`.
    ///
    /// This implementation does not attempt to perform bytecode verification; we assume that any
    /// class files we attempt to load are valid.
    pub fn load_class(&mut self, hierarchy: &mut ClassHierarchy, name: &str)
                      -> Result<Rc<ClassFile>, Error> {
        if let Ok(class_file) = hierarchy.get_class_file(name) {
            // the class is already loaded
            return Ok(class_file);
        } else if self.pending.contains(name) {
            // we're already loading this name
            return Err(Error::ClassCircularity(name.to_owned()));
        }

        self.pending.insert(name.to_owned());
        let result = self.derive_class(hierarchy, name);
        self.pending.remove(name);
        result
    }

    fn derive_class(&mut self, hierarchy: &mut ClassHierarchy, name: &str)
                    -> Result<Rc<ClassFile>, Error> {
        let (path, bytes) = self.find_class_bytes(name)?;
        trace!("loading {} from {}", name, path.display());
        let class_file = class_file::parse_class_file(&bytes)
            .map_err(|error| Error::ClassFormat { name: name.to_owned(), error })?;
        if class_file.major_version > JAVA_8_MAJOR_VERSION {
            return Err(Error::UnsupportedVersion {
                name: name.to_owned(),
                major: class_file.major_version,
                minor: class_file.minor_version,
            });
        }
        if class_file.name != name {
            return Err(Error::NoClassDefFound { name: name.to_owned(), path });
        }

        if let Some(ref super_name) = class_file.super_name {
            let superclass = self.load_class(hierarchy, super_name)?;
            if superclass.is_interface() {
                return Err(Error::IncompatibleClassChange(
                    format!("superclass {} of {} is an interface", super_name, name)));
            }
        }
        for interface_name in &class_file.interfaces {
            let interface = self.load_class(hierarchy, interface_name)?;
            if !interface.is_interface() {
                return Err(Error::IncompatibleClassChange(
                    format!("superinterface {} of {} is a class", interface_name, name)));
            }
        }
        debug!("loaded {}", name);
        Ok(hierarchy.add(class_file))
    }

    /// Loads every class file found under the classpath directories. Classes that fail to
    /// load are logged and skipped.
    pub fn load_classpath(&mut self, hierarchy: &mut ClassHierarchy) -> usize {
        let mut names = vec![];
        for dir in &self.classpath {
            with_warn!("cannot list classpath: {}", collect_class_names(dir, dir, &mut names));
        }
        let mut loaded = 0;
        for name in names {
            with_warn!(self.load_class(hierarchy, &name).map(|_| loaded += 1));
        }
        loaded
    }
}

fn collect_class_names(root: &Path, dir: &Path, names: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_class_names(root, &path, names)?;
        } else if path.extension().map_or(false, |extension| extension == "class") {
            if let Ok(relative) = path.with_extension("").strip_prefix(root) {
                let components: Vec<_> = relative.components()
                    .map(|component| component.as_os_str().to_string_lossy().into_owned())
                    .collect();
                names.push(components.join("/"));
            }
        }
    }
    Ok(())
}
