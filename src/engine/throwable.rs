use std::fmt;

/// The exceptions and errors the engine itself creates and throws. Anything else is thrown by
/// the program under analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Throwable {
    ArithmeticException,
    ArrayIndexOutOfBoundsException,
    ClassCastException,
    IndexOutOfBoundsException,
    NegativeArraySizeException,
    NullPointerException,
    AbstractMethodError,
    IllegalAccessError,
    IncompatibleClassChangeError,
    NoClassDefFoundError,
    NoSuchFieldError,
    NoSuchMethodError,
    VerifyError,
    OutOfMemoryError,
}

impl Throwable {
    pub const ALL: &'static [Throwable] = &[
        Throwable::ArithmeticException,
        Throwable::ArrayIndexOutOfBoundsException,
        Throwable::ClassCastException,
        Throwable::IndexOutOfBoundsException,
        Throwable::NegativeArraySizeException,
        Throwable::NullPointerException,
        Throwable::AbstractMethodError,
        Throwable::IllegalAccessError,
        Throwable::IncompatibleClassChangeError,
        Throwable::NoClassDefFoundError,
        Throwable::NoSuchFieldError,
        Throwable::NoSuchMethodError,
        Throwable::VerifyError,
        Throwable::OutOfMemoryError,
    ];

    pub fn class_name(self) -> &'static str {
        match self {
            Throwable::ArithmeticException => "java/lang/ArithmeticException",
            Throwable::ArrayIndexOutOfBoundsException => "java/lang/ArrayIndexOutOfBoundsException",
            Throwable::ClassCastException => "java/lang/ClassCastException",
            Throwable::IndexOutOfBoundsException => "java/lang/IndexOutOfBoundsException",
            Throwable::NegativeArraySizeException => "java/lang/NegativeArraySizeException",
            Throwable::NullPointerException => "java/lang/NullPointerException",
            Throwable::AbstractMethodError => "java/lang/AbstractMethodError",
            Throwable::IllegalAccessError => "java/lang/IllegalAccessError",
            Throwable::IncompatibleClassChangeError => "java/lang/IncompatibleClassChangeError",
            Throwable::NoClassDefFoundError => "java/lang/NoClassDefFoundError",
            Throwable::NoSuchFieldError => "java/lang/NoSuchFieldError",
            Throwable::NoSuchMethodError => "java/lang/NoSuchMethodError",
            Throwable::VerifyError => "java/lang/VerifyError",
            Throwable::OutOfMemoryError => "java/lang/OutOfMemoryError",
        }
    }

    /// The direct superclass, as in the Java SE class library.
    pub fn superclass(self) -> &'static str {
        match self {
            Throwable::ArithmeticException
                | Throwable::ClassCastException
                | Throwable::IndexOutOfBoundsException
                | Throwable::NegativeArraySizeException
                | Throwable::NullPointerException => "java/lang/RuntimeException",
            Throwable::ArrayIndexOutOfBoundsException => "java/lang/IndexOutOfBoundsException",
            Throwable::AbstractMethodError
                | Throwable::IllegalAccessError
                | Throwable::NoSuchFieldError
                | Throwable::NoSuchMethodError => "java/lang/IncompatibleClassChangeError",
            Throwable::IncompatibleClassChangeError
                | Throwable::NoClassDefFoundError
                | Throwable::VerifyError => "java/lang/LinkageError",
            Throwable::OutOfMemoryError => "java/lang/VirtualMachineError",
        }
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.class_name())
    }
}
