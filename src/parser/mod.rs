//! Contains a parser for a Java class file.
//!
//! # Examples
//!
//! Basic usage:
//! ```no_run
//! use symbolic_jvm::parser::class_file::parse_class_file;
//!
//! let data = std::fs::read("HelloWorld.class").unwrap();
//! let class = parse_class_file(&data).unwrap();
//! println!("{}", class.name);
//! ```

pub mod class_file;
