//! Opcodes and instruction lengths.

pub mod opcode {
    pub const NOP: u8 = 0x00;
    pub const ACONST_NULL: u8 = 0x01;
    pub const ICONST_0: u8 = 0x03;
    pub const ICONST_1: u8 = 0x04;
    pub const LCONST_0: u8 = 0x09;
    pub const BIPUSH: u8 = 0x10;
    pub const LDC: u8 = 0x12;
    pub const ALOAD_0: u8 = 0x2a;
    pub const POP: u8 = 0x57;
    pub const DUP: u8 = 0x59;
    pub const IRETURN: u8 = 0xac;
    pub const LRETURN: u8 = 0xad;
    pub const ARETURN: u8 = 0xb0;
    pub const RETURN: u8 = 0xb1;
    pub const GETSTATIC: u8 = 0xb2;
    pub const PUTSTATIC: u8 = 0xb3;
    pub const INVOKEVIRTUAL: u8 = 0xb6;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const INVOKEINTERFACE: u8 = 0xb9;
    pub const INVOKEDYNAMIC: u8 = 0xba;
    pub const NEW: u8 = 0xbb;
    pub const ATHROW: u8 = 0xbf;

    /// Not a real opcode: what an `invokevirtual` of a signature polymorphic method is rewritten
    /// to once resolved, so that later executions go straight to the method handle linker.
    pub const INVOKEHANDLE: u8 = 0xe9;
}

/// The length of `invokevirtual`, `invokespecial` and `invokestatic`: opcode plus a 16-bit
/// constant pool index.
pub const INVOKE_OFFSET: usize = 3;

/// The length of `invokeinterface`, which also carries a count byte and a zero byte.
pub const INVOKEINTERFACE_OFFSET: usize = 5;

/// How far the program counter advances past an invocation instruction.
pub fn offset_invoke(is_interface: bool) -> usize {
    if is_interface {
        INVOKEINTERFACE_OFFSET
    } else {
        INVOKE_OFFSET
    }
}
