/// Depth/stencil/alpha state and its hardware translation

/// API compare function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    #[default]
    Always,
}

/// API stencil operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Incr,
    Decr,
    IncrWrap,
    DecrWrap,
    Invert,
}

/// Hardware stencil operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MaliStencilOp {
    Keep = 0,
    Replace = 1,
    Zero = 2,
    Invert = 3,
    IncrWrap = 4,
    DecrWrap = 5,
    IncrSat = 6,
    DecrSat = 7,
}

impl StencilOp {
    pub fn to_mali(self) -> MaliStencilOp {
        match self {
            StencilOp::Keep => MaliStencilOp::Keep,
            StencilOp::Zero => MaliStencilOp::Zero,
            StencilOp::Replace => MaliStencilOp::Replace,
            StencilOp::Incr => MaliStencilOp::IncrSat,
            StencilOp::Decr => MaliStencilOp::DecrSat,
            StencilOp::IncrWrap => MaliStencilOp::IncrWrap,
            StencilOp::DecrWrap => MaliStencilOp::DecrWrap,
            StencilOp::Invert => MaliStencilOp::Invert,
        }
    }
}

impl CompareFunc {
    /// Hardware compare function encoding
    pub fn to_mali(self) -> u8 {
        match self {
            CompareFunc::Never => 0,
            CompareFunc::Less => 1,
            CompareFunc::Equal => 2,
            CompareFunc::LessEqual => 3,
            CompareFunc::Greater => 4,
            CompareFunc::NotEqual => 5,
            CompareFunc::GreaterEqual => 6,
            CompareFunc::Always => 7,
        }
    }
}

/// Stencil state for one face
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StencilState {
    pub enabled: bool,
    pub func: CompareFunc,
    pub fail_op: StencilOp,
    pub zfail_op: StencilOp,
    pub zpass_op: StencilOp,
    pub valuemask: u8,
    pub writemask: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthState {
    pub enabled: bool,
    pub writemask: bool,
    pub func: CompareFunc,
    pub bounds_test: bool,
}

/// API depth/stencil/alpha state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStencilAlphaState {
    pub depth: DepthState,
    /// Front, back
    pub stencil: [StencilState; 2],
    /// Must be off; alpha test is lowered into the fragment shader upstream
    pub alpha_enabled: bool,
}

/// Packed hardware STENCIL word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedStencil {
    pub mask: u8,
    pub compare_function: u8,
    pub stencil_fail: u8,
    pub depth_fail: u8,
    pub depth_pass: u8,
}

impl PackedStencil {
    pub fn new(state: &StencilState) -> Self {
        Self {
            mask: state.valuemask,
            compare_function: state.func.to_mali(),
            stencil_fail: state.fail_op.to_mali() as u8,
            depth_fail: state.zfail_op.to_mali() as u8,
            depth_pass: state.zpass_op.to_mali() as u8,
        }
    }

    /// 32-bit word with the reference value in bits 0..8
    pub fn to_bits(self, reference: u8) -> u32 {
        reference as u32
            | (self.mask as u32) << 8
            | (self.compare_function as u32) << 16
            | (self.stencil_fail as u32) << 19
            | (self.depth_fail as u32) << 22
            | (self.depth_pass as u32) << 25
    }
}

/// Depth/stencil state object with its hardware words prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZsaState {
    pub base: DepthStencilAlphaState,
    pub stencil_front: PackedStencil,
    pub stencil_back: PackedStencil,
    pub stencil_mask_front: u8,
    pub stencil_mask_back: u8,
}

impl ZsaState {
    pub fn new(zsa: &DepthStencilAlphaState) -> Self {
        assert!(!zsa.alpha_enabled, "alpha test must be lowered before reaching the driver");
        assert!(!zsa.depth.bounds_test, "depth bounds test is not supported");

        let stencil_mask_front = zsa.stencil[0].writemask;
        let stencil_mask_back = if zsa.stencil[1].enabled {
            zsa.stencil[1].writemask
        } else {
            stencil_mask_front
        };

        Self {
            base: *zsa,
            stencil_front: PackedStencil::new(&zsa.stencil[0]),
            stencil_back: PackedStencil::new(&zsa.stencil[1]),
            stencil_mask_front,
            stencil_mask_back,
        }
    }
}

#[cfg(test)]
#[path = "depth_stencil_tests.rs"]
mod tests;
