/// Stream output (transform feedback) capture records

/// One captured output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamOutput {
    /// Before compilation: condensed output slot. After: real varying slot.
    pub register_index: u32,
    pub start_component: u32,
    pub num_components: u32,
    pub output_buffer: u32,
    /// Offset inside the captured vertex, in dwords
    pub dst_offset: u32,
    pub stream: u32,
}

/// Capture layout of a program
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamOutputInfo {
    pub outputs: Vec<StreamOutput>,
    /// Vertex stride per buffer, in dwords
    pub stride: [u32; 4],
}

/// Map condensed slots back to real varying slots
///
/// The state tracker numbers written outputs consecutively with the gaps
/// removed. Rewrites every record to the real slot and returns the mask of
/// captured real slots.
pub fn update_so_info(info: &mut StreamOutputInfo, outputs_written: u64) -> u64 {
    let mut reverse_map = [0u8; 64];
    let mut remaining = outputs_written;
    let mut slot = 0;

    while remaining != 0 {
        let bit = remaining.trailing_zeros();
        remaining &= remaining - 1;
        reverse_map[slot] = bit as u8;
        slot += 1;
    }

    let mut so_outputs = 0u64;
    for output in info.outputs.iter_mut() {
        output.register_index = reverse_map[output.register_index as usize] as u32;
        so_outputs |= 1u64 << output.register_index;
    }

    so_outputs
}

#[cfg(test)]
#[path = "stream_output_tests.rs"]
mod tests;
