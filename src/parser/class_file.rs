use nom::bytes::complete::{tag, take};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{count, length_count};
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, be_u8};
use thiserror::Error;

use crate::model::class_file::constant_pool::tags;
use crate::model::class_file::{
    constant_pool_index, ClassFile, Code, ConstantPool, ConstantPoolInfo, ExceptionTableEntry,
    FieldInfo, MethodInfo,
};
use crate::util::modified_utf8;

pub type Input<'a> = &'a [u8];
pub type ParseResult<'a, O> = nom::IResult<Input<'a>, O, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("not a class file: bad magic number")]
    Magic,
    #[error("unknown constant pool tag {tag}")]
    UnknownConstantPoolTag { tag: u8 },
    #[error("illegal modified UTF-8 at byte {offset}")]
    ModifiedUtf8 { offset: usize },
    #[error("constant pool index {index} is out of bounds or of the wrong type")]
    ConstantPoolIndex { index: constant_pool_index },
    #[error("truncated class file")]
    Incomplete,
    #[error("{count} unexpected bytes after the end of the class file")]
    TrailingBytes { count: usize },
    #[error("malformed class file ({0:?})")]
    Nom(ErrorKind),
}

impl<'a> ParseError<Input<'a>> for Error {
    fn from_error_kind(_: Input<'a>, kind: ErrorKind) -> Self {
        if kind == ErrorKind::Eof {
            Error::Incomplete
        } else {
            Error::Nom(kind)
        }
    }

    fn append(_: Input<'a>, _: ErrorKind, other: Self) -> Self {
        other
    }
}

fn fail<T>(e: Error) -> Result<T, nom::Err<Error>> {
    Err(nom::Err::Failure(e))
}

// Big-endian primitives named after the class file format's own types.
fn u1(input: Input) -> ParseResult<u8> { be_u8(input) }
fn u2(input: Input) -> ParseResult<u16> { be_u16(input) }
fn u4(input: Input) -> ParseResult<u32> { be_u32(input) }

fn bytes(input: Input, length: u32) -> ParseResult<Input> {
    take::<_, _, Error>(length)(input)
}

/// Parses a complete class file. Bytes left over after the class attributes are an error.
pub fn parse_class_file(bytes: &[u8]) -> Result<ClassFile, Error> {
    match class_file(bytes) {
        Ok((rest, class_file)) if rest.is_empty() => Ok(class_file),
        Ok((rest, _)) => Err(Error::TrailingBytes { count: rest.len() }),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(e),
        Err(nom::Err::Incomplete(_)) => Err(Error::Incomplete),
    }
}

fn magic(input: Input) -> ParseResult<()> {
    match tag::<_, _, Error>(&[0xCA, 0xFE, 0xBA, 0xBE][..])(input) {
        Ok((input, _)) => Ok((input, ())),
        Err(_) => fail(Error::Magic),
    }
}

fn cp_info(input: Input) -> ParseResult<ConstantPoolInfo> {
    let (input, tag) = u1(input)?;
    match tag {
        tags::UTF_8 => {
            let (input, bytes) = length_count(u2, u1)(input)?;
            match modified_utf8::decode(&bytes) {
                Ok(value) => Ok((input, ConstantPoolInfo::Utf8 { value })),
                Err(offset) => fail(Error::ModifiedUtf8 { offset }),
            }
        },
        tags::INTEGER => {
            let (input, value) = be_i32::<_, Error>(input)?;
            Ok((input, ConstantPoolInfo::Integer { value }))
        },
        tags::FLOAT => {
            let (input, value) = be_f32::<_, Error>(input)?;
            Ok((input, ConstantPoolInfo::Float { value }))
        },
        tags::LONG => {
            let (input, value) = be_i64::<_, Error>(input)?;
            Ok((input, ConstantPoolInfo::Long { value }))
        },
        tags::DOUBLE => {
            let (input, value) = be_f64::<_, Error>(input)?;
            Ok((input, ConstantPoolInfo::Double { value }))
        },
        tags::CLASS => {
            let (input, name_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::Class { name_index }))
        },
        tags::STRING => {
            let (input, string_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::String { string_index }))
        },
        tags::FIELD_REF | tags::METHOD_REF | tags::INTERFACE_METHOD_REF => {
            let (input, class_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            let info = match tag {
                tags::FIELD_REF =>
                    ConstantPoolInfo::FieldRef { class_index, name_and_type_index },
                tags::METHOD_REF =>
                    ConstantPoolInfo::MethodRef { class_index, name_and_type_index },
                _ => ConstantPoolInfo::InterfaceMethodRef { class_index, name_and_type_index },
            };
            Ok((input, info))
        },
        tags::NAME_AND_TYPE => {
            let (input, name_index) = u2(input)?;
            let (input, descriptor_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::NameAndType { name_index, descriptor_index }))
        },
        tags::METHOD_HANDLE => {
            let (input, reference_kind) = u1(input)?;
            let (input, reference_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::MethodHandle { reference_kind, reference_index }))
        },
        tags::METHOD_TYPE => {
            let (input, descriptor_index) = u2(input)?;
            Ok((input, ConstantPoolInfo::MethodType { descriptor_index }))
        },
        tags::DYNAMIC | tags::INVOKE_DYNAMIC => {
            let (input, bootstrap_method_attr_index) = u2(input)?;
            let (input, name_and_type_index) = u2(input)?;
            let info = if tag == tags::DYNAMIC {
                ConstantPoolInfo::Dynamic { bootstrap_method_attr_index, name_and_type_index }
            } else {
                ConstantPoolInfo::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index }
            };
            Ok((input, info))
        },
        tag => fail(Error::UnknownConstantPoolTag { tag }),
    }
}

fn constant_pool(input: Input) -> ParseResult<ConstantPool> {
    let (mut input, constant_pool_count) = u2(input)?;
    let mut constant_pool = ConstantPool::new();
    // the count is one more than the number of slots, and wide entries take two
    while constant_pool.len() + 1 < constant_pool_count as usize {
        let (rest, info) = cp_info(input)?;
        constant_pool.push(info);
        input = rest;
    }
    Ok((input, constant_pool))
}

/// A raw attribute: its name and undecoded contents.
fn attribute<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, (String, Input<'a>)> {
    let (input, attribute_name_index) = u2(input)?;
    let (input, attribute_length) = u4(input)?;
    let (input, info) = bytes(input, attribute_length)?;
    match constant_pool.utf8(attribute_name_index) {
        Ok(name) => Ok((input, (name.to_owned(), info))),
        Err(_) => fail(Error::ConstantPoolIndex { index: attribute_name_index }),
    }
}

fn attributes<'a>(input: Input<'a>, constant_pool: &ConstantPool)
                  -> ParseResult<'a, Vec<(String, Input<'a>)>> {
    let (input, attributes_count) = u2(input)?;
    count(|i| attribute(i, constant_pool), attributes_count as usize)(input)
}

fn utf8_at(constant_pool: &ConstantPool, index: constant_pool_index) -> Result<String, nom::Err<Error>> {
    constant_pool.utf8(index)
        .map(str::to_owned)
        .map_err(|_| nom::Err::Failure(Error::ConstantPoolIndex { index }))
}

fn class_name_at(constant_pool: &ConstantPool, index: constant_pool_index)
                 -> Result<String, nom::Err<Error>> {
    constant_pool.class_name(index)
        .map(str::to_owned)
        .map_err(|_| nom::Err::Failure(Error::ConstantPoolIndex { index }))
}

fn field_info<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, FieldInfo> {
    let (input, access_flags) = u2(input)?;
    let (input, name_index) = u2(input)?;
    let (input, descriptor_index) = u2(input)?;
    let (input, attributes) = attributes(input, constant_pool)?;
    let mut constant_value = None;
    for (name, info) in attributes {
        if name == "ConstantValue" {
            let (_, index) = u2(info)?;
            constant_value = Some(index);
        }
    }
    Ok((input, FieldInfo {
        access_flags,
        name: utf8_at(constant_pool, name_index)?,
        descriptor: utf8_at(constant_pool, descriptor_index)?,
        constant_value,
    }))
}

fn exception_table_entry(input: Input) -> ParseResult<ExceptionTableEntry> {
    let (input, start_pc) = u2(input)?;
    let (input, end_pc) = u2(input)?;
    let (input, handler_pc) = u2(input)?;
    let (input, catch_type) = u2(input)?;
    Ok((input, ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type }))
}

fn code_attribute<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, Code> {
    let (input, max_stack) = u2(input)?;
    let (input, max_locals) = u2(input)?;
    let (input, code_length) = u4(input)?;
    let (input, code) = bytes(input, code_length)?;
    let (input, exception_table) = length_count(u2, exception_table_entry)(input)?;
    // LineNumberTable, StackMapTable and friends are of no use to the engine
    let (input, _) = attributes(input, constant_pool)?;
    Ok((input, Code { max_stack, max_locals, code: code.to_vec(), exception_table }))
}

fn method_info<'a>(input: Input<'a>, constant_pool: &ConstantPool) -> ParseResult<'a, MethodInfo> {
    let (input, access_flags) = u2(input)?;
    let (input, name_index) = u2(input)?;
    let (input, descriptor_index) = u2(input)?;
    let (input, attributes) = attributes(input, constant_pool)?;
    let mut code = None;
    for (name, info) in attributes {
        if name == "Code" {
            let (_, parsed) = code_attribute(info, constant_pool)?;
            code = Some(parsed);
        }
    }
    Ok((input, MethodInfo {
        access_flags,
        name: utf8_at(constant_pool, name_index)?,
        descriptor: utf8_at(constant_pool, descriptor_index)?,
        code,
    }))
}

fn class_file(input: Input) -> ParseResult<ClassFile> {
    let (input, ()) = magic(input)?;
    let (input, minor_version) = u2(input)?;
    let (input, major_version) = u2(input)?;
    let (input, constant_pool) = constant_pool(input)?;
    let (input, access_flags) = u2(input)?;
    let (input, this_class) = u2(input)?;
    let (input, super_class) = u2(input)?;
    let (input, interface_indices) = length_count(u2, u2)(input)?;
    let (input, fields_count) = u2(input)?;
    let (input, fields) = count(|i| field_info(i, &constant_pool), fields_count as usize)(input)?;
    let (input, methods_count) = u2(input)?;
    let (input, methods) = count(|i| method_info(i, &constant_pool), methods_count as usize)(input)?;
    let (input, _) = attributes(input, &constant_pool)?;

    let name = class_name_at(&constant_pool, this_class)?;
    let super_name = if super_class == 0 {
        None
    } else {
        Some(class_name_at(&constant_pool, super_class)?)
    };
    let interfaces = interface_indices.into_iter()
        .map(|index| class_name_at(&constant_pool, index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((input, ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        name,
        super_name,
        interfaces,
        fields,
        methods,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Assembles class file bytes by hand.
    #[derive(Default)]
    struct Bytes(Vec<u8>);

    impl Bytes {
        fn u1(&mut self, v: u8) -> &mut Self { self.0.push(v); self }
        fn u2(&mut self, v: u16) -> &mut Self { self.0.extend_from_slice(&v.to_be_bytes()); self }
        fn u4(&mut self, v: u32) -> &mut Self { self.0.extend_from_slice(&v.to_be_bytes()); self }
        fn raw(&mut self, v: &[u8]) -> &mut Self { self.0.extend_from_slice(v); self }
        fn utf8(&mut self, s: &str) -> &mut Self {
            self.u1(tags::UTF_8).u2(s.len() as u16).raw(s.as_bytes())
        }
    }

    /// `class Foo extends java/lang/Object` with one static constant field and one static
    /// method `run()V` whose code is a single `return` covered by a catch-all handler.
    fn foo_class() -> Vec<u8> {
        let mut b = Bytes::default();
        b.raw(&[0xCA, 0xFE, 0xBA, 0xBE]).u2(0).u2(52);
        b.u2(12); // constant_pool_count: 11 slots, one of them the tail of a long
        b.utf8("Foo");                           // 1
        b.u1(tags::CLASS).u2(1);                 // 2
        b.utf8("java/lang/Object");              // 3
        b.u1(tags::CLASS).u2(3);                 // 4
        b.utf8("run");                           // 5
        b.utf8("()V");                           // 6
        b.utf8("Code");                          // 7
        b.u1(tags::LONG).u4(0).u4(42);           // 8, 9
        b.utf8("ConstantValue");                 // 10
        b.utf8("J");                             // 11
        b.u2(0x0021).u2(2).u2(4);
        b.u2(0); // interfaces
        b.u2(1); // fields
        b.u2(0x0019).u2(5).u2(11).u2(1).u2(10).u4(2).u2(8);
        b.u2(1); // methods
        b.u2(0x0009).u2(5).u2(6).u2(1);
        b.u2(7).u4(21);
        b.u2(1).u2(0).u4(1).u1(0xb1);
        b.u2(1).u2(0).u2(1).u2(0).u2(0);
        b.u2(0); // code attributes
        b.u2(0); // class attributes
        b.0
    }

    #[test]
    fn parses_a_minimal_class() {
        let class = parse_class_file(&foo_class()).unwrap();
        assert_eq!(class.major_version, 52);
        assert_eq!(class.name, "Foo");
        assert_eq!(class.super_name.as_deref(), Some("java/lang/Object"));
        assert!(class.interfaces.is_empty());

        let field = &class.fields[0];
        assert_eq!(field.name, "run");
        assert_eq!(field.descriptor, "J");
        assert!(field.is_static());
        assert_eq!(field.constant_value, Some(8));
        assert_eq!(class.constant_pool.get(9), Some(&ConstantPoolInfo::Unusable));

        let method = class.get_method("run", "()V").unwrap();
        assert!(method.is_static());
        let code = method.code.as_ref().unwrap();
        assert_eq!(code.code, vec![0xb1]);
        assert_eq!(code.exception_table, vec![ExceptionTableEntry {
            start_pc: 0,
            end_pc: 1,
            handler_pc: 0,
            catch_type: 0,
        }]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = foo_class();
        bytes[0] = 0xCB;
        assert_eq!(parse_class_file(&bytes), Err(Error::Magic));
    }

    #[test]
    fn rejects_truncated_and_trailing_input() {
        let bytes = foo_class();
        assert_eq!(parse_class_file(&bytes[..bytes.len() - 3]), Err(Error::Incomplete));
        let mut longer = bytes.clone();
        longer.push(0);
        assert_eq!(parse_class_file(&longer), Err(Error::TrailingBytes { count: 1 }));
    }

    #[test]
    fn rejects_unknown_tags() {
        let mut bytes = foo_class();
        // the tag of constant pool entry 1 sits right after magic, versions and count
        bytes[10] = 2;
        assert_eq!(parse_class_file(&bytes), Err(Error::UnknownConstantPoolTag { tag: 2 }));
    }
}
