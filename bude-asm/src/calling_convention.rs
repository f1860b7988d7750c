/// Calling convention an external function is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CallingConvention {
    /// Native Bude calling convention.
    Bude = 0,
    /// Platform-native convention, resolved by the linker.
    Native = 1,
    /// Microsoft x64 (the only convention the emitter currently lowers to).
    MsX64 = 2,
    /// System V AMD64 (recorded for completeness; not yet emitted).
    SysvAmd64 = 3,
}

impl TryFrom<i32> for CallingConvention {
    type Error = ();

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => CallingConvention::Bude,
            1 => CallingConvention::Native,
            2 => CallingConvention::MsX64,
            3 => CallingConvention::SysvAmd64,
            _ => return Err(()),
        })
    }
}

impl From<CallingConvention> for i32 {
    fn from(cc: CallingConvention) -> Self {
        cc as i32
    }
}
