//! Field types, method descriptors and method signatures (§4.3).

use std::fmt;

use nom::branch::alt;
use nom::bytes::complete::is_not;
use nom::character::complete::char;
use nom::combinator::{all_consuming, map};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::IResult;
use thiserror::Error;

use crate::vm::value::Value;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed descriptor {0:?}")]
pub struct DescriptorError(pub String);

/// The type of a field, parameter, local variable, or value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
    /// A class or interface type, by binary name.
    Reference(String),
    Array(Box<Type>),
}

impl Type {
    pub fn parse(descriptor: &str) -> Result<Type, DescriptorError> {
        all_consuming(field_type)(descriptor)
            .map(|(_, ty)| ty)
            .map_err(|_| DescriptorError(descriptor.to_owned()))
    }

    /// The value a field of this type holds before anything is stored in it.
    pub fn default_value(&self) -> Value {
        match *self {
            Type::Byte | Type::Char | Type::Short | Type::Int | Type::Boolean => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Long => Value::Long(0),
            Type::Double => Value::Double(0.0),
            Type::Reference(_) | Type::Array(_) => Value::Null,
        }
    }

    /// `long` and `double` take two local variable slots.
    pub fn is_category_2(&self) -> bool {
        matches!(*self, Type::Long | Type::Double)
    }

    /// The name of the class of values of this type, for reference types.
    pub fn class_name(&self) -> Option<String> {
        match *self {
            Type::Reference(ref name) => Some(name.clone()),
            Type::Array(_) => Some(self.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Type::Byte => write!(f, "B"),
            Type::Char => write!(f, "C"),
            Type::Double => write!(f, "D"),
            Type::Float => write!(f, "F"),
            Type::Int => write!(f, "I"),
            Type::Long => write!(f, "J"),
            Type::Short => write!(f, "S"),
            Type::Boolean => write!(f, "Z"),
            Type::Reference(ref name) => write!(f, "L{};", name),
            Type::Array(ref component) => write!(f, "[{}", component),
        }
    }
}

fn field_type(input: &str) -> IResult<&str, Type> {
    alt((
        map(char('B'), |_| Type::Byte),
        map(char('C'), |_| Type::Char),
        map(char('D'), |_| Type::Double),
        map(char('F'), |_| Type::Float),
        map(char('I'), |_| Type::Int),
        map(char('J'), |_| Type::Long),
        map(char('S'), |_| Type::Short),
        map(char('Z'), |_| Type::Boolean),
        map(delimited(char('L'), is_not(";"), char(';')),
            |name: &str| Type::Reference(name.to_owned())),
        map(preceded(char('['), field_type), |component| Type::Array(Box::new(component))),
    ))(input)
}

fn method_descriptor(input: &str) -> IResult<&str, MethodDescriptor> {
    let (input, params) = delimited(char('('), many0(field_type), char(')'))(input)?;
    let (input, return_ty) = alt((map(char('V'), |_| None), map(field_type, Some)))(input)?;
    Ok((input, MethodDescriptor { params, return_ty }))
}

/// A parsed method descriptor. A `None` return type is `void`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<Type>,
    pub return_ty: Option<Type>,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<MethodDescriptor, DescriptorError> {
        all_consuming(method_descriptor)(descriptor)
            .map(|(_, descriptor)| descriptor)
            .map_err(|_| DescriptorError(descriptor.to_owned()))
    }

    /// The number of local variable slots the parameters occupy, not counting any receiver.
    pub fn param_slots(&self) -> usize {
        self.params.iter().map(|ty| if ty.is_category_2() { 2 } else { 1 }).sum()
    }
}

/// Identifies a method: the class that declares (or is referenced as declaring) it, plus its
/// name and descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

impl Signature {
    pub fn new(class: &str, name: &str, descriptor: &str) -> Self {
        Signature {
            class: class.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        }
    }

    /// The signature of the class initialization method of `class`.
    pub fn clinit(class: &str) -> Self {
        Signature::new(class, "<clinit>", "()V")
    }

    pub fn is_clinit(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn method_descriptor(&self) -> Result<MethodDescriptor, DescriptorError> {
        MethodDescriptor::parse(&self.descriptor)
    }

    /// The same name and descriptor, declared in another class.
    pub fn in_class(&self, class: &str) -> Self {
        Signature::new(class, &self.name, &self.descriptor)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.name, self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_types() {
        assert_eq!(Type::parse("I"), Ok(Type::Int));
        assert_eq!(Type::parse("Ljava/lang/String;"),
                   Ok(Type::Reference(String::from("java/lang/String"))));
        assert_eq!(Type::parse("[[J"),
                   Ok(Type::Array(Box::new(Type::Array(Box::new(Type::Long))))));
        assert!(Type::parse("Ljava/lang/String").is_err());
        assert!(Type::parse("II").is_err());
        assert!(Type::parse("V").is_err());
    }

    #[test]
    fn parses_method_descriptors() {
        let descriptor = MethodDescriptor::parse("(IDLjava/lang/Thread;)Ljava/lang/Object;").unwrap();
        assert_eq!(descriptor.params, vec![
            Type::Int,
            Type::Double,
            Type::Reference(String::from("java/lang/Thread")),
        ]);
        assert_eq!(descriptor.return_ty, Some(Type::Reference(String::from("java/lang/Object"))));
        assert_eq!(descriptor.param_slots(), 4);

        let void = MethodDescriptor::parse("()V").unwrap();
        assert!(void.params.is_empty());
        assert_eq!(void.return_ty, None);

        assert!(MethodDescriptor::parse("(V)V").is_err());
        assert!(MethodDescriptor::parse("()").is_err());
    }

    #[test]
    fn displays_descriptors_back() {
        let ty = Type::parse("[Ljava/lang/Object;").unwrap();
        assert_eq!(ty.to_string(), "[Ljava/lang/Object;");
        assert_eq!(ty.class_name(), Some(String::from("[Ljava/lang/Object;")));
        assert_eq!(Signature::new("p/A", "run", "()V").to_string(), "p/A.run()V");
    }
}
